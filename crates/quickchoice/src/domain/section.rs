//! Heading-aware section boundaries over a flat list of lines.
//!
//! A section starts at a heading (`#`, `##`, ...) and runs until the next
//! heading that closes it. Lines are 0-indexed and the resolver never
//! inspects anything beyond the slice it is handed.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::errors::ChoiceError;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#+)\s+\S").expect("valid regex"));

/// Level of a heading line (length of the leading `#` run), or `None` for body lines.
pub fn heading_level(line: &str) -> Option<usize> {
    HEADING_RE
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|marker| marker.as_str().len())
}

/// Index of the last line belonging to the section that starts at or contains `target_line`.
///
/// When the target is a heading of level `L`, the section closes at the next heading of level
/// `<= L` if `consider_subsections` is set, or at the next heading of any level otherwise. Body
/// lines always close at the next heading of any level; in a document without a single heading
/// they close at the end of their paragraph instead.
///
/// Blank lines just before a closing heading are not part of the section, but a section that
/// runs off the end of the document keeps whatever trailing blank lines the document has.
///
/// # Panics
///
/// Panics when `target_line` is not a valid index into `lines`.
pub fn resolve_section_end<S: AsRef<str>>(
    lines: &[S],
    target_line: usize,
    consider_subsections: bool,
) -> usize {
    assert!(
        target_line < lines.len(),
        "target line {target_line} out of bounds for document of {} lines",
        lines.len()
    );

    let last = lines.len() - 1;
    let closing = match level_of(&lines[target_line]) {
        Some(level) => next_heading(lines, target_line, |next| {
            !consider_subsections || next <= level
        }),
        None if !lines.iter().any(|line| level_of(line).is_some()) => {
            return paragraph_end(lines, target_line);
        }
        None => next_heading(lines, target_line, |_| true),
    };

    match closing {
        Some(heading) => skip_blank_tail(lines, target_line, heading - 1),
        None => last,
    }
}

/// Bounds-checked variant of [`resolve_section_end`] for indices that come from user input.
pub fn try_resolve_section_end<S: AsRef<str>>(
    lines: &[S],
    target_line: usize,
    consider_subsections: bool,
) -> Result<usize, ChoiceError> {
    if target_line >= lines.len() {
        return Err(ChoiceError::invalid(format!(
            "target line {target_line} out of bounds for document of {} lines",
            lines.len()
        )));
    }
    Ok(resolve_section_end(lines, target_line, consider_subsections))
}

fn level_of<S: AsRef<str>>(line: &S) -> Option<usize> {
    heading_level(line.as_ref())
}

fn is_blank<S: AsRef<str>>(line: &S) -> bool {
    line.as_ref().trim().is_empty()
}

fn next_heading<S: AsRef<str>>(
    lines: &[S],
    after: usize,
    closes: impl Fn(usize) -> bool,
) -> Option<usize> {
    lines
        .iter()
        .enumerate()
        .skip(after + 1)
        .find(|(_, line)| level_of(*line).is_some_and(&closes))
        .map(|(index, _)| index)
}

fn skip_blank_tail<S: AsRef<str>>(lines: &[S], floor: usize, mut end: usize) -> usize {
    while end > floor && is_blank(&lines[end]) {
        end -= 1;
    }
    end
}

fn paragraph_end<S: AsRef<str>>(lines: &[S], target_line: usize) -> usize {
    lines
        .iter()
        .enumerate()
        .skip(target_line + 1)
        .find(|(_, line)| is_blank(*line))
        .map(|(blank, _)| blank - 1)
        .unwrap_or(lines.len() - 1)
}
