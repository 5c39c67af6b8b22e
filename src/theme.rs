//! Console colors

use colored::*;

pub struct Theme;

impl Theme {
    pub fn header(text: &str) -> ColoredString {
        text.bold().cyan()
    }

    pub fn divider(width: usize) -> ColoredString {
        "-".repeat(width).dimmed()
    }

    pub fn divider_bold(width: usize) -> ColoredString {
        "=".repeat(width).cyan()
    }

    pub fn primary(text: &str) -> ColoredString {
        text.bold()
    }

    pub fn muted(text: &str) -> ColoredString {
        text.dimmed()
    }

    pub fn success(text: &str) -> ColoredString {
        text.green().bold()
    }

    pub fn warning(text: &str) -> ColoredString {
        text.yellow().bold()
    }

    pub fn error(text: &str) -> ColoredString {
        text.red().bold()
    }

    pub fn added(text: &str) -> ColoredString {
        text.green()
    }

    pub fn deleted(text: &str) -> ColoredString {
        text.red()
    }

    pub fn modified(text: &str) -> ColoredString {
        text.yellow()
    }
}
