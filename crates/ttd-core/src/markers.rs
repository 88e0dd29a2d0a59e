//! Completion markers embedded in assistant responses.
//!
//! The assistant signals progress with `[PHASE_COMPLETE:<name>]` and
//! `[ITEM_COMPLETE:<code>]`. This module is the only place that knows the
//! marker syntax: it extracts the signals and strips every marker from the
//! text that is shown to the researcher and stored in the conversation.

use once_cell::sync::Lazy;
use regex::Regex;

static PHASE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[PHASE_COMPLETE:(\w+)\]").expect("valid phase marker regex"));

static ITEM_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[ITEM_COMPLETE:(\w+)\]").expect("valid item marker regex"));

/// An assistant response split into displayable text and progress signals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedResponse {
    /// Response with all markers removed, trimmed.
    pub clean_text: String,
    /// Payloads of `[PHASE_COMPLETE:...]` markers, in order of appearance.
    pub phase_signals: Vec<String>,
    /// Payloads of `[ITEM_COMPLETE:...]` markers, in order of appearance.
    pub item_signals: Vec<String>,
}

impl ParsedResponse {
    pub fn has_phase_signal(&self, name: &str) -> bool {
        self.phase_signals.iter().any(|signal| signal == name)
    }
}

pub fn parse_response(raw: &str) -> ParsedResponse {
    let phase_signals = PHASE_MARKER
        .captures_iter(raw)
        .map(|caps| caps[1].to_string())
        .collect();
    let item_signals = ITEM_MARKER
        .captures_iter(raw)
        .map(|caps| caps[1].to_string())
        .collect();

    let without_items = ITEM_MARKER.replace_all(raw, "");
    let clean_text = PHASE_MARKER
        .replace_all(&without_items, "")
        .trim()
        .to_string();

    ParsedResponse {
        clean_text,
        phase_signals,
        item_signals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through_trimmed() {
        let parsed = parse_response("  Tell me about eligibility.\n");
        assert_eq!(parsed.clean_text, "Tell me about eligibility.");
        assert!(parsed.phase_signals.is_empty());
        assert!(parsed.item_signals.is_empty());
    }

    #[test]
    fn test_phase_marker_is_extracted_and_stripped() {
        let parsed = parse_response("...all set. [PHASE_COMPLETE:specification]");
        assert_eq!(parsed.clean_text, "...all set.");
        assert!(parsed.has_phase_signal("specification"));
        assert!(!parsed.has_phase_signal("emulation"));
    }

    #[test]
    fn test_item_and_unknown_markers_are_stripped() {
        let raw = "Summary of 6a. [ITEM_COMPLETE:6a]\nNext, 6b. [PHASE_COMPLETE:bogus]";
        let parsed = parse_response(raw);
        assert_eq!(parsed.clean_text, "Summary of 6a. \nNext, 6b.");
        assert_eq!(parsed.item_signals, vec!["6a".to_string()]);
        assert_eq!(parsed.phase_signals, vec!["bogus".to_string()]);
        assert!(!parsed.clean_text.contains("_COMPLETE:"));
    }

    #[test]
    fn test_malformed_marker_is_left_in_place() {
        let parsed = parse_response("[PHASE_COMPLETE: spaced] text");
        assert!(parsed.phase_signals.is_empty());
        assert_eq!(parsed.clean_text, "[PHASE_COMPLETE: spaced] text");
    }

    #[test]
    fn test_only_word_payloads_are_stripped() {
        let parsed =
            parse_response("[ITEM_COMPLETE:] kept [ITEM_COMPLETE:6b] [PHASE_COMPLETE:emu-lation]");
        assert_eq!(parsed.item_signals, vec!["6b".to_string()]);
        assert!(parsed.phase_signals.is_empty());
        assert_eq!(
            parsed.clean_text,
            "[ITEM_COMPLETE:] kept  [PHASE_COMPLETE:emu-lation]"
        );
    }
}
