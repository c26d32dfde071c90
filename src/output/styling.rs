use console::{style, StyledObject};
use std::fmt::Display;

// Terminal roles. Everything rendered to a console goes through one of these
// so that colours stay consistent between the collect and compare reports.

pub fn heading(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn label(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn value(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn figure(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

/// Faster, clean, or finished.
pub fn good(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

/// Slower or failed.
pub fn bad(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn brand(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Headline for a comparison: red when anything regressed.
pub fn regression_count(count: usize) -> StyledObject<String> {
    if count == 0 {
        good("No significant regressions")
    } else {
        bad(format!("{count} significant regression(s)"))
    }
}
