//! Placement of captured text inside an existing document.

use crate::domain::errors::ChoiceError;
use crate::domain::model::InsertAfter;
use crate::domain::section::resolve_section_end;

/// Where captured text goes in the target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement<'a> {
    Top,
    Bottom,
    /// Below a heading; `heading` is the already formatted heading line.
    AfterHeading {
        heading: &'a str,
        options: &'a InsertAfter,
    },
}

/// Return `document` with `captured` inserted at `placement`.
pub fn insert_capture(
    document: &str,
    captured: &str,
    placement: Placement<'_>,
) -> Result<String, ChoiceError> {
    match placement {
        Placement::Top => Ok(format!("{captured}{document}")),
        Placement::Bottom => Ok(append(document, captured)),
        Placement::AfterHeading { heading, options } => {
            insert_after_heading(document, captured, heading, options)
        }
    }
}

fn append(document: &str, captured: &str) -> String {
    if document.is_empty() || document.ends_with('\n') {
        format!("{document}{captured}")
    } else {
        format!("{document}\n{captured}")
    }
}

fn insert_after_heading(
    document: &str,
    captured: &str,
    heading: &str,
    options: &InsertAfter,
) -> Result<String, ChoiceError> {
    let (body, trailing_newline) = match document.strip_suffix('\n') {
        Some(body) => (body, true),
        None => (document, false),
    };
    let mut lines: Vec<&str> = if body.is_empty() && !trailing_newline {
        Vec::new()
    } else {
        body.split('\n').collect()
    };

    let wanted = heading.trim();
    let Some(heading_line) = lines.iter().position(|line| line.trim() == wanted) else {
        if !options.create_if_not_found {
            return Err(ChoiceError::not_found("heading", wanted));
        }
        return Ok(append(document, &format!("{wanted}\n{captured}")));
    };

    let anchor = if options.insert_at_end_of_section {
        resolve_section_end(&lines, heading_line, options.consider_subsections)
    } else {
        heading_line
    };

    let inserted = captured.strip_suffix('\n').unwrap_or(captured);
    lines.splice(anchor + 1..anchor + 1, inserted.split('\n'));

    let mut output = lines.join("\n");
    if trailing_newline {
        output.push('\n');
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn after(heading: &str, end_of_section: bool, subsections: bool) -> InsertAfter {
        InsertAfter {
            heading: heading.into(),
            insert_at_end_of_section: end_of_section,
            consider_subsections: subsections,
            create_if_not_found: false,
        }
    }

    const JOURNAL: &str = "# Journal\n\n## Tasks\n- [ ] one\n\n### Someday\n- maybe\n\n## Notes\nnothing\n";

    #[test]
    fn top_and_bottom_placements() {
        assert_eq!(insert_capture("b\n", "a\n", Placement::Top).unwrap(), "a\nb\n");
        assert_eq!(insert_capture("a", "b\n", Placement::Bottom).unwrap(), "a\nb\n");
        assert_eq!(insert_capture("", "b\n", Placement::Bottom).unwrap(), "b\n");
    }

    #[test]
    fn inserts_directly_below_heading() {
        let options = after("## Tasks", false, false);
        let placement = Placement::AfterHeading {
            heading: "## Tasks",
            options: &options,
        };
        let output = insert_capture(JOURNAL, "- [ ] two\n", placement).unwrap();
        assert!(output.starts_with("# Journal\n\n## Tasks\n- [ ] two\n- [ ] one\n"));
        assert!(output.ends_with("nothing\n"));
    }

    #[test]
    fn inserts_at_end_of_section_before_subsection() {
        let options = after("## Tasks", true, false);
        let placement = Placement::AfterHeading {
            heading: "## Tasks",
            options: &options,
        };
        let output = insert_capture(JOURNAL, "- [ ] two\n", placement).unwrap();
        assert_eq!(
            output,
            "# Journal\n\n## Tasks\n- [ ] one\n- [ ] two\n\n### Someday\n- maybe\n\n## Notes\nnothing\n"
        );
    }

    #[test]
    fn inserts_at_end_of_section_including_subsections() {
        let options = after("## Tasks", true, true);
        let placement = Placement::AfterHeading {
            heading: "## Tasks",
            options: &options,
        };
        let output = insert_capture(JOURNAL, "- [ ] two\n", placement).unwrap();
        assert_eq!(
            output,
            "# Journal\n\n## Tasks\n- [ ] one\n\n### Someday\n- maybe\n- [ ] two\n\n## Notes\nnothing\n"
        );
    }

    #[test]
    fn last_section_appends_at_document_end() {
        let options = after("## Notes", true, true);
        let placement = Placement::AfterHeading {
            heading: "## Notes",
            options: &options,
        };
        let output = insert_capture(JOURNAL, "more\n", placement).unwrap();
        assert!(output.ends_with("## Notes\nnothing\nmore\n"));
    }

    #[test]
    fn missing_heading_is_not_found_unless_created() {
        let mut options = after("## Ideas", true, false);
        let placement = Placement::AfterHeading {
            heading: "## Ideas",
            options: &options,
        };
        let err = insert_capture(JOURNAL, "idea\n", placement).unwrap_err();
        assert_eq!(err, ChoiceError::not_found("heading", "## Ideas"));

        options.create_if_not_found = true;
        let placement = Placement::AfterHeading {
            heading: "## Ideas",
            options: &options,
        };
        let output = insert_capture(JOURNAL, "idea\n", placement).unwrap();
        assert!(output.ends_with("nothing\n## Ideas\nidea\n"));
    }
}
