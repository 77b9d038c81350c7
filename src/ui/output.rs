//! Status lines printed by commands
//!
//! Status goes to stderr. Stdout carries only command results (paths,
//! tables, JSON), so it stays safe to pipe.

use super::context::UiContext;
use console::style;

#[derive(Debug, Clone, Copy)]
enum Marker {
    Ok,
    Info,
    Warn,
}

impl Marker {
    fn render(self, fancy: bool) -> String {
        let (symbol, bracketed) = match self {
            Self::Ok => ("✓", "[OK]"),
            Self::Info => ("●", "[INFO]"),
            Self::Warn => ("!", "[WARN]"),
        };
        let text = if fancy { symbol } else { bracketed };
        match self {
            Self::Ok => style(text).green().to_string(),
            Self::Info => style(text).cyan().to_string(),
            Self::Warn => style(text).yellow().to_string(),
        }
    }
}

/// One status line; `note` is dimmed on a terminal
fn status_line(fancy: bool, marker: Marker, message: &str, note: Option<&str>) -> String {
    let marker = marker.render(fancy);
    match note {
        Some(note) if fancy => format!("  {} {} ({})", marker, message, style(note).dim()),
        Some(note) => format!("  {} {} ({})", marker, message, note),
        None => format!("  {} {}", marker, message),
    }
}

fn emit(ctx: &UiContext, marker: Marker, message: &str, note: Option<&str>) {
    eprintln!("{}", status_line(ctx.use_fancy_output(), marker, message, note));
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    emit(ctx, Marker::Ok, message, None);
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    emit(ctx, Marker::Ok, message, Some(detail));
}

/// Warning plus what to do about it
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    emit(ctx, Marker::Warn, message, Some(hint));
}

pub fn step_info(ctx: &UiContext, message: &str) {
    emit(ctx, Marker::Info, message, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use console::strip_ansi_codes;

    #[test]
    fn plain_markers_are_bracketed() {
        let line = status_line(false, Marker::Warn, "Config exists", Some("Use --force"));
        assert_eq!(strip_ansi_codes(&line), "  [WARN] Config exists (Use --force)");

        let line = status_line(false, Marker::Info, "Starting buyer", None);
        assert_eq!(strip_ansi_codes(&line), "  [INFO] Starting buyer");
    }

    #[test]
    fn fancy_markers_use_symbols() {
        let line = status_line(true, Marker::Ok, "All nodes stopped", None);
        assert_eq!(strip_ansi_codes(&line), "  ✓ All nodes stopped");
    }
}
