use super::item::{ItemId, ItemSet};
use crate::error::{Result, TtdError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Key of the research question field.
pub const RESEARCH_QUESTION_KEY: &str = "research_question";

/// One of the 17 recognized protocol field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    ResearchQuestion,
    Item(ItemId),
}

impl FromStr for FieldKey {
    type Err = TtdError;

    fn from_str(key: &str) -> Result<Self> {
        if key == RESEARCH_QUESTION_KEY {
            return Ok(FieldKey::ResearchQuestion);
        }
        ItemId::from_key(key)
            .map(FieldKey::Item)
            .ok_or_else(|| TtdError::invalid_field(key))
    }
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::ResearchQuestion => RESEARCH_QUESTION_KEY,
            FieldKey::Item(item) => item.key(),
        }
    }
}

/// Typed record of everything the researcher has specified so far.
///
/// Both item mappings always hold all eight of their keys; an empty string
/// means the item is still pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolStore {
    research_question: String,
    specification: BTreeMap<ItemId, String>,
    emulation: BTreeMap<ItemId, String>,
}

impl Default for ProtocolStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolStore {
    pub fn new() -> Self {
        Self {
            research_question: String::new(),
            specification: ItemId::SPECIFICATION
                .into_iter()
                .map(|item| (item, String::new()))
                .collect(),
            emulation: ItemId::EMULATION
                .into_iter()
                .map(|item| (item, String::new()))
                .collect(),
        }
    }

    pub fn research_question(&self) -> &str {
        &self.research_question
    }

    /// Value of an item; empty while pending.
    pub fn item(&self, item: ItemId) -> &str {
        self.set_map(item.set())
            .get(&item)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Reads a field by its string key.
    pub fn get(&self, key: &str) -> Result<&str> {
        match key.parse::<FieldKey>()? {
            FieldKey::ResearchQuestion => Ok(self.research_question()),
            FieldKey::Item(item) => Ok(self.item(item)),
        }
    }

    /// Sets a field by its string key.
    ///
    /// # Errors
    ///
    /// - `InvalidField` if `key` is not one of the 17 recognized names.
    /// - `FieldLocked` if `value` is blank and the field already holds a value.
    pub fn set_field(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let field = key.parse::<FieldKey>()?;
        self.set(field, value.into())
    }

    /// Sets an item without regard to the session phase; `Session::record_item`
    /// is the phase-checked entry point.
    pub fn set_item(&mut self, item: ItemId, value: impl Into<String>) -> Result<()> {
        self.set(FieldKey::Item(item), value.into())
    }

    fn set(&mut self, field: FieldKey, value: String) -> Result<()> {
        let slot = match field {
            FieldKey::ResearchQuestion => &mut self.research_question,
            FieldKey::Item(item) => {
                let map = match item.set() {
                    ItemSet::Specification => &mut self.specification,
                    ItemSet::Emulation => &mut self.emulation,
                };
                map.entry(item).or_default()
            }
        };

        if value.trim().is_empty() && !slot.is_empty() {
            return Err(TtdError::FieldLocked {
                key: field.as_str().to_string(),
            });
        }

        *slot = value;
        Ok(())
    }

    pub fn is_complete(&self, item: ItemId) -> bool {
        !self.item(item).is_empty()
    }

    /// First item of `set` (in processing order) that is still pending.
    pub fn first_pending(&self, set: ItemSet) -> Option<ItemId> {
        set.items()
            .iter()
            .copied()
            .find(|item| !self.is_complete(*item))
    }

    pub fn completed_count(&self, set: ItemSet) -> usize {
        set.items()
            .iter()
            .filter(|item| self.is_complete(**item))
            .count()
    }

    /// All items of `set` with their values, in processing order.
    pub fn entries(&self, set: ItemSet) -> impl Iterator<Item = (ItemId, &str)> {
        set.items().iter().map(move |item| (*item, self.item(*item)))
    }

    /// Empties every field. Only a full session reset may do this.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    fn set_map(&self, set: ItemSet) -> &BTreeMap<ItemId, String> {
        match set {
            ItemSet::Specification => &self.specification,
            ItemSet::Emulation => &self.emulation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        let store = ProtocolStore::new();
        assert_eq!(store.research_question(), "");
        for item in ItemId::all() {
            assert_eq!(store.item(item), "");
        }
        assert_eq!(store.first_pending(ItemSet::Specification), Some(ItemId::Eligibility));
        assert_eq!(store.first_pending(ItemSet::Emulation), Some(ItemId::EligibilityOps));
    }

    #[test]
    fn test_set_field_by_key() {
        let mut store = ProtocolStore::new();
        store.set_field("research_question", "statins and MI risk").unwrap();
        store.set_field("6b_treatments", "statin vs no statin").unwrap();

        assert_eq!(store.get("research_question").unwrap(), "statins and MI risk");
        assert_eq!(store.item(ItemId::Treatments), "statin vs no statin");
        assert!(store.is_complete(ItemId::Treatments));
        assert_eq!(store.completed_count(ItemSet::Specification), 1);
    }

    #[test]
    fn test_unknown_key_is_invalid_field() {
        let mut store = ProtocolStore::new();
        let err = store.set_field("6z_unknown", "x").unwrap_err();
        assert_eq!(err, TtdError::invalid_field("6z_unknown"));
        assert!(store.get("researchQuestion").unwrap_err().is_invalid_field());
    }

    #[test]
    fn test_non_empty_field_cannot_be_cleared() {
        let mut store = ProtocolStore::new();
        store.set_item(ItemId::Outcomes, "all-cause mortality").unwrap();

        let err = store.set_item(ItemId::Outcomes, "   ").unwrap_err();
        assert_eq!(
            err,
            TtdError::FieldLocked {
                key: "6e_outcomes".to_string()
            }
        );
        assert_eq!(store.item(ItemId::Outcomes), "all-cause mortality");

        // Refinement with another value is allowed.
        store.set_item(ItemId::Outcomes, "MI within 5 years").unwrap();
        assert_eq!(store.item(ItemId::Outcomes), "MI within 5 years");
    }

    #[test]
    fn test_first_pending_skips_completed() {
        let mut store = ProtocolStore::new();
        store.set_item(ItemId::Eligibility, "adults 40-75").unwrap();
        store.set_item(ItemId::Randomization, "yes").unwrap();
        assert_eq!(store.first_pending(ItemSet::Specification), Some(ItemId::Treatments));

        for item in ItemId::SPECIFICATION {
            store.set_item(item, "done").unwrap();
        }
        assert_eq!(store.first_pending(ItemSet::Specification), None);
    }

    #[test]
    fn test_clear_resets_all_fields() {
        let mut store = ProtocolStore::new();
        store.set_field(RESEARCH_QUESTION_KEY, "q").unwrap();
        for item in ItemId::all() {
            store.set_item(item, "value").unwrap();
        }
        store.clear();
        assert_eq!(store, ProtocolStore::new());
    }

    #[test]
    fn test_entries_follow_processing_order() {
        let store = ProtocolStore::new();
        let keys: Vec<&str> = store
            .entries(ItemSet::Emulation)
            .map(|(item, _)| item.key())
            .collect();
        assert_eq!(keys.first(), Some(&"7a_eligibility_ops"));
        assert_eq!(keys.last(), Some(&"7h_analysis_ops"));
        assert_eq!(keys.len(), 8);
    }
}
