//! Terminal status reporting for download runs.
//!
//! All user-facing output from the core flows through the [`Reporter`] trait:
//! a pinned live region (status + progress bar + detail aside) plus discrete
//! log events that scroll normally above it. The production implementation is
//! [`ConsoleReporter`], which picks one of two modes at startup:
//!
//! - **Full mode** (stdout is a terminal, `TERM` is not `dumb`): bordered
//!   sections redrawn in place by erasing exactly the previously drawn lines.
//! - **Fallback mode**: a single status line rewritten with carriage return
//!   and padding; log events become plain `[INFO]`/`[WARN]`-prefixed lines.
//!
//! The retry client, discovery, and the engine only ever see `&dyn Reporter`,
//! so tests substitute a recording double and assert on emitted events.

use std::io::{self, IsTerminal, Write};
use std::sync::{Mutex, PoisonError};

/// Severity attached to every reported line or event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Routine progress information.
    Info,
    /// Successful completion of a step.
    Success,
    /// Recoverable degradation (retry scheduled, fallback used).
    Warning,
    /// Fatal condition; the run is about to abort.
    Error,
    /// Low-emphasis asides (remaining-count detail).
    Muted,
}

impl Level {
    /// Short bracketed label used in fallback mode and section headers.
    fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "DONE",
            Self::Warning => "WARN",
            Self::Error => "ERR",
            Self::Muted => "...",
        }
    }

    /// ANSI SGR color code for full mode.
    fn color_code(self) -> &'static str {
        match self {
            Self::Info => "36",
            Self::Success => "32",
            Self::Warning => "33",
            Self::Error => "31",
            Self::Muted => "90",
        }
    }
}

/// Reporting sink consumed by the core pipeline.
///
/// `update_*` methods mutate the live region; `log_event` emits a discrete
/// line above it. [`finalize`](Reporter::finalize) must be called exactly
/// once at the end of any run (success, error, or interruption) and clears
/// the live region so the terminal scrollback is left clean.
pub trait Reporter: Send + Sync {
    /// Replaces the status line.
    fn update_status(&self, message: &str, level: Level);
    /// Replaces or clears the detail line (warnings/errors/info asides).
    fn update_detail(&self, message: Option<&str>, level: Level);
    /// Replaces or clears the progress line.
    fn update_progress(&self, message: Option<&str>);
    /// Prints a one-off event line above the live region.
    fn log_event(&self, message: &str, level: Level);
    /// Clears any in-place display state. Safe to call more than once.
    fn finalize(&self);
}

/// Live-region state. Mirrors the process-wide render state: what is shown,
/// at which level, and how many physical lines the last frame occupied.
#[derive(Debug)]
struct RenderState {
    status_line: Option<String>,
    status_level: Level,
    detail_line: Option<String>,
    detail_level: Level,
    progress_line: Option<String>,
    rendered_lines: usize,
    last_progress_length: usize,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            status_line: None,
            status_level: Level::Info,
            detail_line: None,
            detail_level: Level::Muted,
            progress_line: None,
            rendered_lines: 0,
            last_progress_length: 0,
        }
    }
}

/// Stateful terminal renderer writing to stdout.
pub struct ConsoleReporter {
    supports_ansi: bool,
    state: Mutex<RenderState>,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleReporter {
    /// Creates a reporter, selecting full or fallback mode once based on
    /// whether stdout supports in-place redraw.
    #[must_use]
    pub fn new() -> Self {
        let supports_ansi = io::stdout().is_terminal()
            && std::env::var("TERM").map_or(true, |term| term != "dumb");
        Self::with_ansi(supports_ansi)
    }

    fn with_ansi(supports_ansi: bool) -> Self {
        Self {
            supports_ansi,
            state: Mutex::new(RenderState::default()),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn colorize(&self, text: &str, level: Level) -> String {
        if !self.supports_ansi {
            return text.to_string();
        }
        format!("\x1b[{}m{}\x1b[0m", level.color_code(), text)
    }

    /// Formats a message with its bracketed level label for fallback mode.
    /// Muted messages carry no label, only the optional indent.
    fn format_plain(message: &str, level: Level, indent: bool) -> String {
        let indent_prefix = if indent { "  " } else { "" };
        if level == Level::Muted {
            return format!("{indent_prefix}{message}");
        }
        format!("{indent_prefix}[{}] {message}", level.label())
    }

    /// Erases the fallback single-line display by overwriting it with spaces.
    fn clear_fallback_line(state: &mut RenderState, out: &mut impl Write) {
        if state.last_progress_length == 0 {
            return;
        }
        let _ = write!(out, "\r{}\r", " ".repeat(state.last_progress_length));
        let _ = out.flush();
        state.last_progress_length = 0;
    }

    /// Erases the previously rendered full-mode frame, line by line, moving
    /// the cursor back to where the frame started.
    fn clear_render(&self, state: &mut RenderState, out: &mut impl Write) {
        if !self.supports_ansi || state.rendered_lines == 0 {
            return;
        }
        let _ = write!(out, "\r");
        for index in 0..state.rendered_lines {
            let _ = write!(out, "\x1b[2K");
            if index < state.rendered_lines - 1 {
                let _ = write!(out, "\x1b[1A");
            }
        }
        let _ = write!(out, "\r");
        let _ = out.flush();
        state.rendered_lines = 0;
    }

    /// Redraws the full-mode live region in place.
    fn render(&self, state: &mut RenderState, out: &mut impl Write) {
        if !self.supports_ansi {
            return;
        }
        let lines = self.compose_box_lines(state);
        self.clear_render(state, out);
        if lines.is_empty() {
            return;
        }
        for (idx, line) in lines.iter().enumerate() {
            if idx > 0 {
                let _ = writeln!(out);
            }
            let _ = write!(out, "{line}");
        }
        let _ = out.flush();
        state.rendered_lines = lines.len();
    }

    /// Builds the bordered section lines for the current state: a "Progress"
    /// section (status + progress, when progress is active) or a "Status"
    /// section, followed by an optional "Detail" section.
    fn compose_box_lines(&self, state: &RenderState) -> Vec<String> {
        let mut sections: Vec<(&str, Level, Vec<&str>)> = Vec::new();

        if let Some(progress) = &state.progress_line {
            let mut content: Vec<&str> = Vec::new();
            if let Some(status) = &state.status_line {
                content.extend(status.lines());
            }
            content.extend(progress.lines());
            sections.push(("Progress", Level::Info, content));
        } else if let Some(status) = &state.status_line {
            sections.push(("Status", state.status_level, status.lines().collect()));
        }

        if let Some(detail) = &state.detail_line {
            sections.push(("Detail", state.detail_level, detail.lines().collect()));
        }

        let section_count = sections.len();
        let mut formatted = Vec::new();
        for (idx, (title, level, content_lines)) in sections.into_iter().enumerate() {
            let content: Vec<&str> = if content_lines.is_empty() {
                vec![""]
            } else {
                content_lines
            };
            let header_text = format!("{} :: {}", title.to_uppercase(), level.label());
            let inner_width = content
                .iter()
                .map(|line| line.chars().count())
                .max()
                .unwrap_or(0)
                .max(header_text.chars().count());
            let horizontal = format!("+{}+", "-".repeat(inner_width + 2));

            formatted.push(horizontal.clone());
            let header_padded = center(&header_text, inner_width);
            formatted.push(format!("| {} |", self.colorize(&header_padded, level)));
            formatted.push(horizontal.clone());
            for line in content {
                let padded = pad_right(line, inner_width);
                formatted.push(format!("| {} |", self.colorize(&padded, level)));
            }
            formatted.push(horizontal);
            if idx != section_count - 1 {
                formatted.push(String::new());
            }
        }
        formatted
    }

    /// Rewrites the fallback single-line display, padding with spaces so a
    /// shorter replacement fully overwrites the previous, longer text.
    fn render_fallback(state: &mut RenderState, out: &mut impl Write) {
        let mut components: Vec<String> = Vec::new();
        if let Some(progress) = &state.progress_line {
            if let Some(status) = &state.status_line {
                components.push(Self::format_plain(status, state.status_level, false));
            }
            components.push(progress.clone());
        } else if let Some(status) = &state.status_line {
            components.push(Self::format_plain(status, state.status_level, false));
        }
        if let Some(detail) = &state.detail_line {
            components.push(Self::format_plain(detail, state.detail_level, true));
        }

        if components.is_empty() {
            Self::clear_fallback_line(state, out);
            return;
        }
        let combined = components.join(" | ");
        let combined_len = combined.chars().count();
        let padding = state.last_progress_length.saturating_sub(combined_len);
        let _ = write!(out, "\r{}{}", combined, " ".repeat(padding));
        let _ = out.flush();
        state.last_progress_length = combined_len;
    }
}

impl Reporter for ConsoleReporter {
    fn update_status(&self, message: &str, level: Level) {
        let mut state = self.lock_state();
        let mut out = io::stdout().lock();
        if !self.supports_ansi {
            state.status_line = Some(message.to_string());
            state.status_level = level;
            Self::render_fallback(&mut state, &mut out);
            return;
        }
        state.status_line = Some(message.to_string());
        state.status_level = level;
        self.render(&mut state, &mut out);
    }

    fn update_detail(&self, message: Option<&str>, level: Level) {
        let mut state = self.lock_state();
        let mut out = io::stdout().lock();
        state.detail_line = message.map(ToString::to_string);
        if message.is_some() {
            state.detail_level = level;
        }
        if self.supports_ansi {
            self.render(&mut state, &mut out);
        } else {
            Self::render_fallback(&mut state, &mut out);
        }
    }

    fn update_progress(&self, message: Option<&str>) {
        let mut state = self.lock_state();
        let mut out = io::stdout().lock();
        if !self.supports_ansi {
            // Fallback progress bypasses the combined line: write the raw
            // progress text padded over whatever was shown before.
            match message {
                Some(text) => {
                    let text_len = text.chars().count();
                    let padding = state.last_progress_length.saturating_sub(text_len);
                    let _ = write!(out, "\r{}{}", text, " ".repeat(padding));
                    let _ = out.flush();
                    state.last_progress_length = text_len;
                }
                None => Self::clear_fallback_line(&mut state, &mut out),
            }
            return;
        }
        state.progress_line = message.map(ToString::to_string);
        self.render(&mut state, &mut out);
    }

    fn log_event(&self, message: &str, level: Level) {
        let mut state = self.lock_state();
        let mut out = io::stdout().lock();
        if !self.supports_ansi {
            let _ = writeln!(out, "{}", Self::format_plain(message, level, false));
            let _ = out.flush();
            return;
        }
        // Print the event where the live region was, then redraw the live
        // region beneath it so log history scrolls while the frame stays
        // pinned.
        self.clear_render(&mut state, &mut out);
        let _ = writeln!(out, "{}", self.colorize(message, level));
        self.render(&mut state, &mut out);
    }

    fn finalize(&self) {
        let mut state = self.lock_state();
        let mut out = io::stdout().lock();
        if !self.supports_ansi {
            Self::clear_fallback_line(&mut state, &mut out);
            return;
        }
        self.clear_render(&mut state, &mut out);
    }
}

/// Centers `text` within `width` display cells (space padding).
fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    let total = width - len;
    let left = total / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(total - left))
}

/// Left-justifies `text` within `width` display cells.
fn pad_right(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }
    format!("{}{}", text, " ".repeat(width - len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_mode() -> ConsoleReporter {
        ConsoleReporter::with_ansi(true)
    }

    #[test]
    fn test_format_plain_labels() {
        assert_eq!(
            ConsoleReporter::format_plain("hello", Level::Info, false),
            "[INFO] hello"
        );
        assert_eq!(
            ConsoleReporter::format_plain("done", Level::Success, false),
            "[DONE] done"
        );
        assert_eq!(
            ConsoleReporter::format_plain("careful", Level::Warning, true),
            "  [WARN] careful"
        );
    }

    #[test]
    fn test_format_plain_muted_has_no_label() {
        assert_eq!(
            ConsoleReporter::format_plain("aside", Level::Muted, false),
            "aside"
        );
        assert_eq!(
            ConsoleReporter::format_plain("aside", Level::Muted, true),
            "  aside"
        );
    }

    #[test]
    fn test_compose_status_only_renders_one_section() {
        let reporter = full_mode();
        let state = RenderState {
            status_line: Some("Working".to_string()),
            ..RenderState::default()
        };
        let lines = reporter.compose_box_lines(&state);
        // border, header, border, one content line, border
        assert_eq!(lines.len(), 5);
        assert!(lines[1].contains("STATUS :: INFO"));
        assert!(lines[3].contains("Working"));
    }

    #[test]
    fn test_compose_progress_section_absorbs_status() {
        let reporter = full_mode();
        let state = RenderState {
            status_line: Some("Downloading chapter 3/10".to_string()),
            progress_line: Some("[###---] 30%".to_string()),
            ..RenderState::default()
        };
        let lines = reporter.compose_box_lines(&state);
        assert!(lines[1].contains("PROGRESS :: INFO"));
        let joined = lines.join("\n");
        assert!(joined.contains("Downloading chapter 3/10"));
        assert!(joined.contains("[###---] 30%"));
        // No separate Status section when progress is active.
        assert!(!joined.contains("STATUS ::"));
    }

    #[test]
    fn test_compose_detail_section_is_separated_by_blank_line() {
        let reporter = full_mode();
        let state = RenderState {
            status_line: Some("Working".to_string()),
            detail_line: Some("attempt 1/3 failed".to_string()),
            detail_level: Level::Warning,
            ..RenderState::default()
        };
        let lines = reporter.compose_box_lines(&state);
        assert!(lines.iter().any(String::is_empty), "sections separated");
        let joined = lines.join("\n");
        assert!(joined.contains("DETAIL :: WARN"));
        assert!(joined.contains("attempt 1/3 failed"));
    }

    #[test]
    fn test_compose_empty_state_renders_nothing() {
        let reporter = full_mode();
        let lines = reporter.compose_box_lines(&RenderState::default());
        assert!(lines.is_empty());
    }

    #[test]
    fn test_box_lines_have_uniform_width() {
        let reporter = ConsoleReporter::with_ansi(false);
        let state = RenderState {
            status_line: Some("short".to_string()),
            progress_line: Some("a much longer progress line".to_string()),
            ..RenderState::default()
        };
        // Colorization disabled, so widths are directly comparable.
        let lines = reporter.compose_box_lines(&state);
        let width = lines[0].chars().count();
        for line in &lines {
            assert_eq!(line.chars().count(), width, "ragged box line: {line:?}");
        }
    }

    #[test]
    fn test_center_and_pad_right() {
        assert_eq!(center("ab", 6), "  ab  ");
        assert_eq!(center("abc", 6), " abc  ");
        assert_eq!(pad_right("ab", 5), "ab   ");
        assert_eq!(pad_right("abcdef", 3), "abcdef");
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let reporter = full_mode();
        reporter.update_status("working", Level::Info);
        reporter.finalize();
        reporter.finalize();
        assert_eq!(reporter.lock_state().rendered_lines, 0);
    }
}
