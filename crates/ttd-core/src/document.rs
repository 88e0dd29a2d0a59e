//! Protocol document assembly.

use crate::protocol::{ItemId, ItemSet};
use crate::session::Session;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;

const FOOTER: &str = "*This protocol was developed using the TARGET Trial Design Assistant, following the TARGET (Transparent Reporting of Observational Studies Emulating a Target Trial) reporting guideline.*";

/// An assembled protocol ready for a `DocumentSink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub file_name: String,
    pub content: String,
}

/// Download file name for a document created at `unix_ms`.
pub fn file_name(unix_ms: i64) -> String {
    format!("target-trial-protocol-{}.md", unix_ms)
}

/// Renders the full protocol document.
///
/// Item sections carry the static meaning of each item; the researcher's
/// actual decisions live in the conversation log that follows them.
pub fn assemble<Tz>(session: &Session, generated_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut doc = String::new();

    doc.push_str("# TARGET TRIAL PROTOCOL\n\n");
    doc.push_str(&format!(
        "**Generated:** {}\n\n---\n\n",
        generated_at.format("%-m/%-d/%Y, %-I:%M:%S %p")
    ));

    doc.push_str("## RESEARCH QUESTION\n\n");
    doc.push_str(session.protocol.research_question());
    doc.push_str("\n\n---\n\n");

    doc.push_str("## TARGET TRIAL SPECIFICATION (Items 6a-h)\n\n");
    doc.push_str(
        "This section defines the pragmatic randomized clinical trial that could actually be conducted.\n\n",
    );
    doc.push_str("### Summary of Protocol Elements\n\n");
    push_item_summaries(&mut doc, ItemSet::Specification);
    doc.push_str("---\n\n");

    doc.push_str("## TARGET TRIAL EMULATION (Items 7a-h)\n\n");
    doc.push_str(
        "This section describes how the target trial specification is mapped to observational data.\n\n",
    );
    doc.push_str("### Summary of Emulation Elements\n\n");
    push_item_summaries(&mut doc, ItemSet::Emulation);
    doc.push_str("---\n\n");

    doc.push_str("## COMPLETE CONVERSATION LOG\n\n");
    doc.push_str(
        "The following is the complete conversation between researcher and methodologist that developed this protocol.\n\n",
    );
    for message in session.messages() {
        doc.push_str(&format!(
            "### {}\n\n{}\n\n",
            message.role.document_label(),
            message.content
        ));
    }

    doc.push_str("\n---\n\n");
    doc.push_str(FOOTER);
    doc.push('\n');
    doc
}

fn push_item_summaries(doc: &mut String, set: ItemSet) {
    for item in set.items() {
        doc.push_str(&item_heading(*item));
        doc.push_str(item.summary());
        doc.push_str("\n\n");
    }
}

fn item_heading(item: ItemId) -> String {
    format!("**Item {}: {}**\n", item.code(), item.title())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_session() -> Session {
        let mut session = Session::seeded();
        session.record_researcher_message("statins and MI risk").unwrap();
        session.apply_assistant_response("Let's define eligibility. [ITEM_COMPLETE:6a]");
        session
    }

    #[test]
    fn test_document_sections_in_order() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let doc = assemble(&sample_session(), &at);

        assert!(doc.starts_with("# TARGET TRIAL PROTOCOL\n\n**Generated:** 3/5/2024, 2:07:09 PM\n"));
        let order = [
            "## RESEARCH QUESTION\n\nstatins and MI risk",
            "## TARGET TRIAL SPECIFICATION (Items 6a-h)",
            "**Item 6a: Eligibility Criteria**\nDefines the target population",
            "**Item 6h: Analysis Plan**",
            "## TARGET TRIAL EMULATION (Items 7a-h)",
            "**Item 7a: Operationalizing Eligibility**",
            "**Item 7h: Operationalizing Analysis**",
            "## COMPLETE CONVERSATION LOG",
            "### METHODOLOGIST\n\nWelcome!",
            "### RESEARCHER\n\nstatins and MI risk\n\n",
            "### METHODOLOGIST\n\nLet's define eligibility.\n\n",
            FOOTER,
        ];
        let mut cursor = 0;
        for needle in order {
            let found = doc[cursor..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing or out of order: {needle}"));
            cursor += found + needle.len();
        }
        assert!(doc.ends_with(".*\n"));
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let session = sample_session();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(assemble(&session, &at), assemble(&session.clone(), &at));
    }

    #[test]
    fn test_item_values_are_not_rendered_in_summaries() {
        let session = sample_session();
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let doc = assemble(&session, &at);
        // The recorded 6a value only appears once: in the conversation log.
        assert_eq!(doc.matches("Let's define eligibility.").count(), 1);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name(1700000000000), "target-trial-protocol-1700000000000.md");
    }
}
