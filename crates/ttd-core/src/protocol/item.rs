//! Protocol item identifiers.
//!
//! Items 6a–6h describe the target trial specification, items 7a–7h describe
//! its emulation in observational data. Each item has a stable storage key
//! (e.g. `6a_eligibility`) and a short code (e.g. `6a`) used in markers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two ordered item sets of a TARGET protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSet {
    /// Target trial specification (items 6a–6h).
    Specification,
    /// Target trial emulation (items 7a–7h).
    Emulation,
}

impl ItemSet {
    /// Items of this set in their fixed processing order.
    pub fn items(self) -> &'static [ItemId; 8] {
        match self {
            ItemSet::Specification => &ItemId::SPECIFICATION,
            ItemSet::Emulation => &ItemId::EMULATION,
        }
    }
}

/// Identifier of a single protocol item.
///
/// Declaration order is processing order, so `Ord` follows 6a → 6h → 7a → 7h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemId {
    #[serde(rename = "6a_eligibility")]
    Eligibility,
    #[serde(rename = "6b_treatments")]
    Treatments,
    #[serde(rename = "6c_randomization")]
    Randomization,
    #[serde(rename = "6d_followup")]
    FollowUp,
    #[serde(rename = "6e_outcomes")]
    Outcomes,
    #[serde(rename = "6f_contrasts")]
    Contrasts,
    #[serde(rename = "6g_assumptions")]
    Assumptions,
    #[serde(rename = "6h_analysis")]
    Analysis,
    #[serde(rename = "7a_eligibility_ops")]
    EligibilityOps,
    #[serde(rename = "7b_treatments_ops")]
    TreatmentsOps,
    #[serde(rename = "7c_assignment_ops")]
    AssignmentOps,
    #[serde(rename = "7d_followup_ops")]
    FollowUpOps,
    #[serde(rename = "7e_outcomes_ops")]
    OutcomesOps,
    #[serde(rename = "7f_contrasts_ops")]
    ContrastsOps,
    #[serde(rename = "7g_assumptions_ops")]
    AssumptionsOps,
    #[serde(rename = "7h_analysis_ops")]
    AnalysisOps,
}

impl ItemId {
    pub const SPECIFICATION: [ItemId; 8] = [
        ItemId::Eligibility,
        ItemId::Treatments,
        ItemId::Randomization,
        ItemId::FollowUp,
        ItemId::Outcomes,
        ItemId::Contrasts,
        ItemId::Assumptions,
        ItemId::Analysis,
    ];

    pub const EMULATION: [ItemId; 8] = [
        ItemId::EligibilityOps,
        ItemId::TreatmentsOps,
        ItemId::AssignmentOps,
        ItemId::FollowUpOps,
        ItemId::OutcomesOps,
        ItemId::ContrastsOps,
        ItemId::AssumptionsOps,
        ItemId::AnalysisOps,
    ];

    /// All 16 items in processing order.
    pub fn all() -> impl Iterator<Item = ItemId> {
        Self::SPECIFICATION
            .into_iter()
            .chain(Self::EMULATION)
    }

    /// Storage key, e.g. `6a_eligibility`.
    pub fn key(self) -> &'static str {
        match self {
            ItemId::Eligibility => "6a_eligibility",
            ItemId::Treatments => "6b_treatments",
            ItemId::Randomization => "6c_randomization",
            ItemId::FollowUp => "6d_followup",
            ItemId::Outcomes => "6e_outcomes",
            ItemId::Contrasts => "6f_contrasts",
            ItemId::Assumptions => "6g_assumptions",
            ItemId::Analysis => "6h_analysis",
            ItemId::EligibilityOps => "7a_eligibility_ops",
            ItemId::TreatmentsOps => "7b_treatments_ops",
            ItemId::AssignmentOps => "7c_assignment_ops",
            ItemId::FollowUpOps => "7d_followup_ops",
            ItemId::OutcomesOps => "7e_outcomes_ops",
            ItemId::ContrastsOps => "7f_contrasts_ops",
            ItemId::AssumptionsOps => "7g_assumptions_ops",
            ItemId::AnalysisOps => "7h_analysis_ops",
        }
    }

    /// Short code, e.g. `6a`.
    pub fn code(self) -> &'static str {
        &self.key()[..2]
    }

    pub fn set(self) -> ItemSet {
        if Self::SPECIFICATION.contains(&self) {
            ItemSet::Specification
        } else {
            ItemSet::Emulation
        }
    }

    /// Resolves a storage key.
    pub fn from_key(key: &str) -> Option<ItemId> {
        Self::all().find(|item| item.key() == key)
    }

    /// Resolves the payload of an `[ITEM_COMPLETE:...]` marker.
    ///
    /// Accepts the short code (`6a`, case-insensitive) or the full storage key.
    pub fn from_marker_code(code: &str) -> Option<ItemId> {
        let code = code.trim().to_ascii_lowercase();
        Self::all().find(|item| item.code() == code || item.key() == code)
    }

    /// Description used in the instruction context for the current item.
    pub fn guidance(self) -> &'static str {
        match self {
            ItemId::Eligibility => {
                "Eligibility Criteria - the specific population and inclusion/exclusion criteria"
            }
            ItemId::Treatments => {
                "Treatment Strategies - detailed description of interventions including dosage, timing, duration, initiation/discontinuation rules"
            }
            ItemId::Randomization => {
                "Random Assignment - confirm randomization and awareness of allocation"
            }
            ItemId::FollowUp => "Follow-up - when follow-up starts (time zero) and when it ends",
            ItemId::Outcomes => {
                "Outcomes - how and when outcomes are measured, primary outcome specification"
            }
            ItemId::Contrasts => {
                "Causal Contrasts - intention-to-treat vs per-protocol effects, competing events, effect measures"
            }
            ItemId::Assumptions => {
                "Assumptions - what assumptions are needed to identify causal estimands"
            }
            ItemId::Analysis => {
                "Analysis Plan - data analysis procedures, missing data handling, sensitivity analyses"
            }
            ItemId::EligibilityOps => {
                "Operationalize Eligibility - how eligibility will be identified in observational data"
            }
            ItemId::TreatmentsOps => {
                "Operationalize Treatments - how treatment strategies will be ascertained from data"
            }
            ItemId::AssignmentOps => {
                "Operationalize Assignment - how individuals will be classified into treatment strategies"
            }
            ItemId::FollowUpOps => {
                "Operationalize Follow-up - how time zero and end of follow-up will be determined"
            }
            ItemId::OutcomesOps => {
                "Operationalize Outcomes - how outcomes will be ascertained from data"
            }
            ItemId::ContrastsOps => {
                "Operationalize Contrasts - how causal contrasts will be estimated from data"
            }
            ItemId::AssumptionsOps => {
                "Operationalize Assumptions - baseline confounders and how variables are measured"
            }
            ItemId::AnalysisOps => {
                "Operationalize Analysis - actual analysis methods, software, and sensitivity analyses"
            }
        }
    }

    /// Heading used in the exported document.
    pub fn title(self) -> &'static str {
        match self {
            ItemId::Eligibility => "Eligibility Criteria",
            ItemId::Treatments => "Treatment Strategies",
            ItemId::Randomization => "Random Assignment",
            ItemId::FollowUp => "Follow-up Period",
            ItemId::Outcomes => "Outcomes",
            ItemId::Contrasts => "Causal Contrasts",
            ItemId::Assumptions => "Assumptions",
            ItemId::Analysis => "Analysis Plan",
            ItemId::EligibilityOps => "Operationalizing Eligibility",
            ItemId::TreatmentsOps => "Operationalizing Treatment Strategies",
            ItemId::AssignmentOps => "Operationalizing Assignment",
            ItemId::FollowUpOps => "Operationalizing Follow-up",
            ItemId::OutcomesOps => "Operationalizing Outcomes",
            ItemId::ContrastsOps => "Operationalizing Causal Contrasts",
            ItemId::AssumptionsOps => "Operationalizing Assumptions",
            ItemId::AnalysisOps => "Operationalizing Analysis",
        }
    }

    /// Static meaning of the item, rendered in the exported document.
    pub fn summary(self) -> &'static str {
        match self {
            ItemId::Eligibility => "Defines the target population and inclusion/exclusion criteria.",
            ItemId::Treatments => {
                "Specifies the interventions compared, including dosage, timing, duration, and decision rules."
            }
            ItemId::Randomization => {
                "Eligible individuals would be randomly assigned to treatment strategies and aware of their allocation."
            }
            ItemId::FollowUp => {
                "Follow-up starts at time zero (assignment) and specifies when it ends."
            }
            ItemId::Outcomes => "Describes how and when outcomes are measured.",
            ItemId::Contrasts => {
                "Specifies intention-to-treat and/or per-protocol effects, effect measures, and handling of competing events."
            }
            ItemId::Assumptions => "Identifies assumptions needed to identify each causal estimand.",
            ItemId::Analysis => {
                "Describes data analysis procedures, including handling of missing data and sensitivity analyses."
            }
            ItemId::EligibilityOps => {
                "How eligibility criteria are identified in the data (codes, algorithms, etc.)."
            }
            ItemId::TreatmentsOps => "How treatment strategies are ascertained from the data.",
            ItemId::AssignmentOps => {
                "How individuals are classified into treatment strategies at time zero."
            }
            ItemId::FollowUpOps => "How time zero and end of follow-up are determined in the data.",
            ItemId::OutcomesOps => "How outcomes are ascertained from the data.",
            ItemId::ContrastsOps => {
                "How intention-to-treat and per-protocol effects are estimated."
            }
            ItemId::AssumptionsOps => {
                "Baseline confounders and variables for handling missing data and competing events."
            }
            ItemId::AnalysisOps => {
                "Actual analysis methods, software, models, and sensitivity analyses."
            }
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sets_are_disjoint_and_ordered() {
        assert_eq!(ItemId::all().count(), 16);
        for item in ItemId::SPECIFICATION {
            assert_eq!(item.set(), ItemSet::Specification);
            assert!(item.code().starts_with('6'));
        }
        for item in ItemId::EMULATION {
            assert_eq!(item.set(), ItemSet::Emulation);
            assert!(item.code().starts_with('7'));
        }
        let codes: Vec<&str> = ItemSet::Specification.items().iter().map(|i| i.code()).collect();
        assert_eq!(codes, ["6a", "6b", "6c", "6d", "6e", "6f", "6g", "6h"]);
    }

    #[test]
    fn test_marker_code_resolution() {
        assert_eq!(ItemId::from_marker_code("6a"), Some(ItemId::Eligibility));
        assert_eq!(ItemId::from_marker_code("7C"), Some(ItemId::AssignmentOps));
        assert_eq!(
            ItemId::from_marker_code("7h_analysis_ops"),
            Some(ItemId::AnalysisOps)
        );
        assert_eq!(ItemId::from_marker_code("8a"), None);
        assert_eq!(ItemId::from_marker_code("specification"), None);
    }

    #[test]
    fn test_serde_uses_storage_key() {
        let json = serde_json::to_string(&ItemId::FollowUpOps).unwrap();
        assert_eq!(json, "\"7d_followup_ops\"");
        let back: ItemId = serde_json::from_str("\"6d_followup\"").unwrap();
        assert_eq!(back, ItemId::FollowUp);
    }
}
