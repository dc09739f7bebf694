//! Terminal styling for help text and command output.

use std::fmt;

use anstyle::{AnsiColor, Style};
use clap::builder::StyledStr;

pub(crate) const LABEL: Style = AnsiColor::Green.on_default();
pub(crate) const ERROR: Style = AnsiColor::Red.on_default().bold();

const HEADING: Style = Style::new().bold().underline();
const COMMENT: Style = Style::new().dimmed();
const COMMAND: Style = Style::new().bold();

/// Text in a style, reset afterwards.
pub(crate) struct Painted<T>(pub Style, pub T);

impl<T: fmt::Display> fmt::Display for Painted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self(style, text) = self;
        write!(f, "{style}{text}{style:#}")
    }
}

/// Render an examples section for `after_long_help`. Lines starting with `#`
/// are comments, other non-blank lines are shell commands.
pub(crate) fn examples(text: &'static str) -> StyledStr {
    let mut out = Painted(HEADING, "Examples:").to_string();
    for line in text.trim_matches('\n').lines() {
        let body = line.trim_start();
        let indent = &line[..line.len() - body.len()];

        out.push('\n');
        match body.chars().next() {
            None => (),
            Some('#') => out.push_str(&format!("{indent}{}", Painted(COMMENT, body))),
            Some(_) => out.push_str(&format!("{indent}$ {}", Painted(COMMAND, body))),
        }
    }

    StyledStr::from(out)
}
