//! crates/reading_companion_core/src/export.rs
//!
//! Renders a completed session into a markdown document.

use std::collections::HashMap;
use std::fmt::Write;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Highlight, Interaction, Session};

/// Generates a markdown document from session data.
///
/// Highlights are emitted in position order as block quotes, each followed
/// by its question and answer when an interaction exists. The export date in
/// the header is the wall clock at render time; everything else is a pure
/// function of the inputs.
pub fn render_markdown(
    session: &Session,
    highlights: &[Highlight],
    interactions: &HashMap<Uuid, Interaction>,
) -> String {
    let mut doc = String::new();

    let _ = writeln!(doc, "# {}", session.name);
    let _ = writeln!(
        doc,
        "**Review date:** {}\n",
        Utc::now().format("%d.%m.%Y")
    );
    doc.push_str("---\n\n");

    for highlight in highlights {
        let _ = writeln!(doc, "> {}\n", highlight.text);

        if let Some(interaction) = interactions.get(&highlight.id) {
            let _ = writeln!(doc, "**_Assistant question: {}_**\n", interaction.question);

            if let Some(answer) = &interaction.answer {
                let _ = writeln!(doc, "{}\n", answer);
            }
        }

        doc.push_str("---\n\n");
    }

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionStatus;
    use chrono::Utc;

    fn session(name: &str) -> Session {
        Session {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: SessionStatus::Completed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn highlight(session_id: Uuid, text: &str, position: usize) -> Highlight {
        Highlight {
            id: Uuid::new_v4(),
            session_id,
            text: text.to_string(),
            position,
            created_at: Utc::now(),
        }
    }

    fn interaction(highlight_id: Uuid, question: &str, answer: Option<&str>) -> Interaction {
        Interaction {
            id: Uuid::new_v4(),
            highlight_id,
            question: question.to_string(),
            answer: answer.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn renders_quote_question_and_answer_per_highlight() {
        let session = session("My Session");
        let h = highlight(session.id, "Some text", 0);
        let mut interactions = HashMap::new();
        interactions.insert(
            h.id,
            interaction(h.id, "Why does this matter?", Some("Because it does.")),
        );

        let doc = render_markdown(&session, &[h], &interactions);

        assert!(doc.starts_with("# My Session\n"));
        assert!(doc.contains("> Some text\n"));
        assert!(doc.contains("**_Assistant question: Why does this matter?_**\n"));
        assert!(doc.contains("Because it does.\n"));
    }

    #[test]
    fn highlight_without_interaction_emits_only_the_quote() {
        let session = session("Sparse");
        let h = highlight(session.id, "Lonely highlight", 0);

        let doc = render_markdown(&session, &[h], &HashMap::new());

        assert!(doc.contains("> Lonely highlight\n"));
        assert!(!doc.contains("Assistant question"));
    }

    #[test]
    fn unanswered_interaction_omits_the_answer_block() {
        let session = session("Unanswered");
        let h = highlight(session.id, "Text", 0);
        let mut interactions = HashMap::new();
        interactions.insert(h.id, interaction(h.id, "Pending question?", None));

        let doc = render_markdown(&session, &[h], &interactions);

        assert!(doc.contains("**_Assistant question: Pending question?_**\n"));
        // Only the header, quote, question and separators should be present.
        assert_eq!(doc.matches("---").count(), 2);
    }

    #[test]
    fn session_with_no_highlights_still_renders_a_header() {
        let session = session("Empty");
        let doc = render_markdown(&session, &[], &HashMap::new());

        assert!(doc.starts_with("# Empty\n"));
        assert!(doc.contains("**Review date:**"));
    }
}
