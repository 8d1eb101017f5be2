//! crates/reading_companion_core/src/extract.rs
//!
//! Turns raw uploaded text into an ordered list of highlight strings.
//!
//! Two upload layouts are supported: a freeform layout where highlights are
//! paragraphs separated by blank lines, and the structured note-export
//! layout produced by e-reader annotation tools, which delimits entries
//! with explicit markers. The format is classified once per upload from a
//! bounded prefix scan and then one of two pure parsers runs over the whole
//! input.

use thiserror::Error;

/// Marker that opens a new record in the structured note-export layout.
const ENTRY_MARKER: &str = "время：";
/// Marker that opens the highlight text of a record.
const CONTENT_START_MARKER: &str = "【Контент】";
/// Marker that closes the highlight text of a record.
const CONTENT_END_MARKER: &str = "【Заметки】";
/// A separator rule of repeated dashes also closes the highlight text.
const SEPARATOR_RULE: &str = "-------------------";

/// How many leading lines the classifier inspects.
const FORMAT_SNIFF_LINES: usize = 10;

/// The upload layout detected for a given input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightFormat {
    /// Paragraphs separated by one-or-more blank lines.
    Freeform,
    /// Note-export entries delimited by explicit section markers.
    Structured,
}

/// Validation failures over the extracted highlight batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("minimum 3 highlights required, got {got}")]
    TooFewHighlights { got: usize },
    #[error("highlight {index} is empty")]
    EmptyHighlight { index: usize },
}

/// Classifies the upload layout from its first few lines.
///
/// The classification is one-shot: the whole input is parsed with the
/// selected parser, with no per-line re-classification.
pub fn detect_format(raw_text: &str) -> HighlightFormat {
    let structured = raw_text
        .lines()
        .take(FORMAT_SNIFF_LINES)
        .any(|line| line.contains(ENTRY_MARKER));

    if structured {
        HighlightFormat::Structured
    } else {
        HighlightFormat::Freeform
    }
}

/// Extracts highlights from raw uploaded text, in source order.
///
/// Empty input yields an empty vec rather than an error, and repeated calls
/// over the same input produce identical output.
pub fn extract(raw_text: &str) -> Vec<String> {
    match detect_format(raw_text) {
        HighlightFormat::Freeform => parse_freeform(raw_text),
        HighlightFormat::Structured => parse_structured(raw_text),
    }
}

/// Parses the freeform layout: runs of non-blank lines separated by blank
/// lines, each run space-joined into a single highlight.
fn parse_freeform(raw_text: &str) -> Vec<String> {
    let mut highlights = Vec::new();
    let mut current = String::new();

    for line in raw_text.lines() {
        let line = line.trim();

        if line.is_empty() {
            if !current.is_empty() {
                highlights.push(std::mem::take(&mut current));
            }
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(line);
    }

    // A trailing run without a terminating blank line is still a highlight.
    if !current.is_empty() {
        highlights.push(current);
    }

    highlights
}

/// Parses the structured note-export layout.
///
/// Each entry opens with the entry marker, carries its highlight text
/// between the content markers, and lines outside any recognized section
/// are ignored.
fn parse_structured(raw_text: &str) -> Vec<String> {
    let mut highlights = Vec::new();
    let mut buffer = String::new();
    let mut in_content_section = false;

    for line in raw_text.lines() {
        // A new entry flushes whatever the previous one buffered.
        if line.contains(ENTRY_MARKER) {
            flush(&mut buffer, &mut highlights);
            in_content_section = false;
            continue;
        }

        if let Some(marker_at) = line.find(CONTENT_START_MARKER) {
            in_content_section = true;
            // The highlight text may begin on the marker line itself.
            let rest = line[marker_at + CONTENT_START_MARKER.len()..].trim();
            if !rest.is_empty() {
                buffer.push_str(rest);
                buffer.push(' ');
            }
            continue;
        }

        if line.contains(CONTENT_END_MARKER) || line.starts_with(SEPARATOR_RULE) {
            flush(&mut buffer, &mut highlights);
            in_content_section = false;
            continue;
        }

        if in_content_section {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                buffer.push_str(trimmed);
                buffer.push(' ');
            }
        }
    }

    // End of input flushes a dangling content section.
    flush(&mut buffer, &mut highlights);

    highlights
}

fn flush(buffer: &mut String, highlights: &mut Vec<String>) {
    let content = buffer.trim();
    if !content.is_empty() {
        highlights.push(content.to_string());
    }
    buffer.clear();
}

/// Validates the full extracted batch before anything is persisted.
pub fn validate_highlights(highlights: &[String]) -> Result<(), ValidationError> {
    if highlights.len() < 3 {
        return Err(ValidationError::TooFewHighlights {
            got: highlights.len(),
        });
    }

    for (index, highlight) in highlights.iter().enumerate() {
        if highlight.trim().is_empty() {
            return Err(ValidationError::EmptyHighlight { index });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeform_paragraphs_become_highlights_in_order() {
        let input = "First highlight\n\nSecond highlight\n\nThird highlight";
        let highlights = extract(input);

        assert_eq!(
            highlights,
            vec!["First highlight", "Second highlight", "Third highlight"]
        );
    }

    #[test]
    fn freeform_joins_wrapped_lines_with_a_single_space() {
        let input = "A paragraph\nthat wraps over\nthree lines\n\nAnother one";
        let highlights = extract(input);

        assert_eq!(
            highlights,
            vec!["A paragraph that wraps over three lines", "Another one"]
        );
    }

    #[test]
    fn freeform_ignores_leading_trailing_and_repeated_blank_lines() {
        let input = "\n\nFirst highlight\n\n\n\nSecond highlight\n\n\n";
        let highlights = extract(input);

        assert_eq!(highlights, vec!["First highlight", "Second highlight"]);
    }

    #[test]
    fn freeform_emits_a_trailing_unterminated_paragraph() {
        let highlights = extract("Alpha\n\nOmega");
        assert_eq!(highlights, vec!["Alpha", "Omega"]);
    }

    #[test]
    fn empty_input_yields_no_highlights() {
        assert!(extract("").is_empty());
        assert!(extract("\n\n\n").is_empty());
    }

    #[test]
    fn extraction_is_deterministic_across_calls() {
        let input = "время：2025-07-07 20:03\n【Контент】Первый фрагмент\n【Заметки】1\n\nx";
        assert_eq!(extract(input), extract(input));

        let freeform = "one\n\ntwo\n\nthree";
        assert_eq!(extract(freeform), extract(freeform));
    }

    #[test]
    fn classifier_only_inspects_the_first_ten_lines() {
        let early = "header\nвремя：2025-01-01 10:00\n【Контент】text";
        assert_eq!(detect_format(early), HighlightFormat::Structured);

        // The marker appears too late to trigger structured parsing.
        let late = format!("{}время：2025-01-01 10:00\n", "filler line\n".repeat(11));
        assert_eq!(detect_format(&late), HighlightFormat::Freeform);
    }

    #[test]
    fn structured_entry_with_inline_content_and_dash_terminator() {
        let input = "время：2025-07-07 20:03\n【Контент】Inline content here\n-------------------\n";
        let highlights = extract(input);

        assert_eq!(highlights, vec!["Inline content here"]);
    }

    #[test]
    fn structured_multi_entry_export_yields_one_highlight_per_entry() {
        let input = "Заметка BOOX | <<Какая-то книга>>\nKon_Tiki2\n\n\
время：2025-07-07 20:03\n\
【Контент】По сути, нам нужна предикатная\nблокировка\n\
【Заметки】1\n\
-------------------\n\n\
время：2025-07-07 20:04\n\
【Контент】идея заключается в применимости\n\
【Заметки】2\n\
-------------------\n\n\
время：2025-07-07 20:06\n\
【Контент】третий фрагмент\n\
【Заметки】\n\
-------------------";
        let highlights = extract(input);

        assert_eq!(highlights.len(), 3);
        assert_eq!(highlights[0], "По сути, нам нужна предикатная блокировка");
        assert_eq!(highlights[1], "идея заключается в применимости");
        assert_eq!(highlights[2], "третий фрагмент");
    }

    #[test]
    fn structured_ignores_lines_outside_recognized_sections() {
        let input = "время：2025-07-07 20:03\nstray metadata line\n【Контент】kept\n【Заметки】note text dropped\n";
        let highlights = extract(input);

        assert_eq!(highlights, vec!["kept"]);
    }

    #[test]
    fn structured_flushes_a_dangling_content_section_at_end_of_input() {
        let input = "время：2025-07-07 20:03\n【Контент】no terminator after this";
        let highlights = extract(input);

        assert_eq!(highlights, vec!["no terminator after this"]);
    }

    #[test]
    fn validate_accepts_three_or_more_non_empty_highlights() {
        let highlights = vec![
            "Highlight 1".to_string(),
            "Highlight 2".to_string(),
            "Highlight 3".to_string(),
            "Highlight 4".to_string(),
        ];
        assert!(validate_highlights(&highlights).is_ok());
    }

    #[test]
    fn validate_rejects_fewer_than_three_highlights() {
        let two = vec!["Highlight 1".to_string(), "Highlight 2".to_string()];
        assert_eq!(
            validate_highlights(&two),
            Err(ValidationError::TooFewHighlights { got: 2 })
        );

        assert_eq!(
            validate_highlights(&[]),
            Err(ValidationError::TooFewHighlights { got: 0 })
        );
    }

    #[test]
    fn validate_reports_the_position_of_a_blank_highlight() {
        let highlights = vec![
            "Highlight 1".to_string(),
            "   ".to_string(),
            "Highlight 3".to_string(),
        ];
        assert_eq!(
            validate_highlights(&highlights),
            Err(ValidationError::EmptyHighlight { index: 1 })
        );
    }
}
