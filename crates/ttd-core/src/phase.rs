//! Conversation phases and the rules that move between them.

use crate::markers::ParsedResponse;
use crate::protocol::{ItemId, ItemSet, ProtocolStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stage of the protocol conversation.
///
/// Variants are declared in progression order; a session's phase only ever
/// moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Introduction,
    Specification,
    Emulation,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Introduction => "introduction",
            Phase::Specification => "specification",
            Phase::Emulation => "emulation",
            Phase::Complete => "complete",
        }
    }

    /// Human-readable label for the phase indicator.
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Introduction => "Getting Started",
            Phase::Specification => "Phase 1: Target Trial Specification",
            Phase::Emulation => "Phase 2: Target Trial Emulation",
            Phase::Complete => "Protocol Complete",
        }
    }

    /// Item set worked on during this phase, if any.
    pub fn item_set(&self) -> Option<ItemSet> {
        match self {
            Phase::Specification => Some(ItemSet::Specification),
            Phase::Emulation => Some(ItemSet::Emulation),
            Phase::Introduction | Phase::Complete => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Phase::Complete)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "introduction" => Ok(Phase::Introduction),
            "specification" => Ok(Phase::Specification),
            "emulation" => Ok(Phase::Emulation),
            "complete" => Ok(Phase::Complete),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

/// Pure transition rules of the protocol state machine.
///
/// None of these functions mutate anything; `Session` applies their results.
pub struct PhaseEngine;

impl PhaseEngine {
    /// Transition triggered by a researcher submission.
    ///
    /// The first message submitted during the introduction, while no research
    /// question is recorded, moves the session into specification.
    pub fn on_submission(phase: Phase, protocol: &ProtocolStore) -> Option<Phase> {
        if phase == Phase::Introduction && protocol.research_question().is_empty() {
            Some(Phase::Specification)
        } else {
            None
        }
    }

    /// Transition triggered by an assistant response.
    ///
    /// A phase marker only completes the phase it names and only while the
    /// session is in that phase, so a single response advances at most one step.
    pub fn on_response(phase: Phase, parsed: &ParsedResponse) -> Option<Phase> {
        match phase {
            Phase::Specification if parsed.has_phase_signal("specification") => {
                Some(Phase::Emulation)
            }
            Phase::Emulation if parsed.has_phase_signal("emulation") => Some(Phase::Complete),
            _ => None,
        }
    }

    /// Items named by `[ITEM_COMPLETE:...]` markers that may be recorded now.
    ///
    /// Markers for items outside the active phase's set, or that name no known
    /// item, are dropped.
    pub fn recordable_items(phase: Phase, parsed: &ParsedResponse) -> Vec<ItemId> {
        let Some(set) = phase.item_set() else {
            return Vec::new();
        };

        let mut items = Vec::new();
        for signal in &parsed.item_signals {
            match ItemId::from_marker_code(signal) {
                Some(item) if item.set() == set => {
                    if !items.contains(&item) {
                        items.push(item);
                    }
                }
                Some(item) => {
                    tracing::debug!(
                        "[PhaseEngine] Ignoring item marker {} outside the {} phase",
                        item.code(),
                        phase
                    );
                }
                None => {
                    tracing::debug!("[PhaseEngine] Ignoring unknown item marker '{}'", signal);
                }
            }
        }
        items
    }

    /// Item the conversation should be working on in `phase`.
    pub fn current_item(phase: Phase, protocol: &ProtocolStore) -> Option<ItemId> {
        phase
            .item_set()
            .and_then(|set| protocol.first_pending(set))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::parse_response;

    #[test]
    fn test_phase_ordering_is_progression_order() {
        assert!(Phase::Introduction < Phase::Specification);
        assert!(Phase::Specification < Phase::Emulation);
        assert!(Phase::Emulation < Phase::Complete);
        assert_eq!(Phase::default(), Phase::Introduction);
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Introduction.label(), "Getting Started");
        assert_eq!(Phase::Specification.label(), "Phase 1: Target Trial Specification");
        assert_eq!(Phase::Emulation.label(), "Phase 2: Target Trial Emulation");
        assert_eq!(Phase::Complete.label(), "Protocol Complete");
    }

    #[test]
    fn test_phase_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Emulation).unwrap(), "\"emulation\"");
        assert_eq!("complete".parse::<Phase>().unwrap(), Phase::Complete);
        assert!("Complete".parse::<Phase>().is_err());
    }

    #[test]
    fn test_submission_starts_specification_once() {
        let mut protocol = ProtocolStore::new();
        assert_eq!(
            PhaseEngine::on_submission(Phase::Introduction, &protocol),
            Some(Phase::Specification)
        );

        protocol.set_field("research_question", "statins").unwrap();
        assert_eq!(PhaseEngine::on_submission(Phase::Introduction, &protocol), None);
        assert_eq!(PhaseEngine::on_submission(Phase::Specification, &protocol), None);
    }

    #[test]
    fn test_markers_only_advance_the_named_phase() {
        let spec_done = parse_response("done [PHASE_COMPLETE:specification]");
        let emu_done = parse_response("done [PHASE_COMPLETE:emulation]");

        assert_eq!(
            PhaseEngine::on_response(Phase::Specification, &spec_done),
            Some(Phase::Emulation)
        );
        assert_eq!(PhaseEngine::on_response(Phase::Specification, &emu_done), None);
        assert_eq!(
            PhaseEngine::on_response(Phase::Emulation, &emu_done),
            Some(Phase::Complete)
        );
        assert_eq!(PhaseEngine::on_response(Phase::Introduction, &spec_done), None);
    }

    #[test]
    fn test_both_markers_advance_a_single_step() {
        let both = parse_response("[PHASE_COMPLETE:specification] [PHASE_COMPLETE:emulation]");
        assert_eq!(
            PhaseEngine::on_response(Phase::Specification, &both),
            Some(Phase::Emulation)
        );
    }

    #[test]
    fn test_complete_is_terminal() {
        for raw in [
            "[PHASE_COMPLETE:specification]",
            "[PHASE_COMPLETE:emulation]",
            "[PHASE_COMPLETE:introduction]",
        ] {
            assert_eq!(PhaseEngine::on_response(Phase::Complete, &parse_response(raw)), None);
        }
    }

    #[test]
    fn test_recordable_items_respect_active_set() {
        let parsed = parse_response("[ITEM_COMPLETE:6a] [ITEM_COMPLETE:7a] [ITEM_COMPLETE:6A] [ITEM_COMPLETE:zz]");
        assert_eq!(
            PhaseEngine::recordable_items(Phase::Specification, &parsed),
            vec![ItemId::Eligibility]
        );
        assert_eq!(
            PhaseEngine::recordable_items(Phase::Emulation, &parsed),
            vec![ItemId::EligibilityOps]
        );
        assert!(PhaseEngine::recordable_items(Phase::Introduction, &parsed).is_empty());
    }

    #[test]
    fn test_current_item_is_first_pending_of_phase() {
        let mut protocol = ProtocolStore::new();
        assert_eq!(PhaseEngine::current_item(Phase::Introduction, &protocol), None);
        assert_eq!(
            PhaseEngine::current_item(Phase::Specification, &protocol),
            Some(ItemId::Eligibility)
        );
        protocol.set_item(ItemId::EligibilityOps, "ICD codes").unwrap();
        assert_eq!(
            PhaseEngine::current_item(Phase::Emulation, &protocol),
            Some(ItemId::TreatmentsOps)
        );
        assert_eq!(PhaseEngine::current_item(Phase::Complete, &protocol), None);
    }
}
