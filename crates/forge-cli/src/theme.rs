//! CLI color theme.

use colored::Colorize;

/// Namespaced formatting helpers, kept separate from the commands that use
/// them so the palette can change in one place.
pub(crate) struct Theme;

impl Theme {
    /// Format a section header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Format a success message.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Format an error message.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Format a warning message.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Format an informational message.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// Format an id, dimmed, for table-style output.
    pub(crate) fn id(text: &str) -> String {
        text.dimmed().to_string()
    }

    /// Format a separator line.
    pub(crate) fn separator() -> String {
        "─".repeat(50).dimmed().to_string()
    }
}
