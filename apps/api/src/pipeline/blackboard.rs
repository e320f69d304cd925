//! Blackboard: the per-run key/value scratch space every stage reads from and writes to.
//!
//! Slots are write-once: the first `set` for a key wins and every later `set` for the
//! same key is rejected with `AlreadySet`. The map is sharded (`DashMap`), so concurrent
//! fan-out members writing unrelated keys never contend on a single lock.

use std::collections::BTreeMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlackboardError {
    #[error("key '{0}' has not been produced")]
    NotFound(String),

    #[error("key '{0}' is already set")]
    AlreadySet(String),
}

#[derive(Debug, Default)]
pub struct Blackboard {
    slots: DashMap<String, Value>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored under `key`.
    /// `NotFound` means "not yet produced", which is distinct from an empty value.
    pub fn get(&self, key: &str) -> Result<Value, BlackboardError> {
        self.slots
            .get(key)
            .map(|slot| slot.value().clone())
            .ok_or_else(|| BlackboardError::NotFound(key.to_string()))
    }

    /// Writes `value` under `key` if and only if the key is still vacant.
    pub fn set(&self, key: &str, value: Value) -> Result<(), BlackboardError> {
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(_) => Err(BlackboardError::AlreadySet(key.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    /// Values of the listed keys that are present. Absent keys are skipped.
    pub fn capture(&self, keys: &[String]) -> BTreeMap<String, Value> {
        keys.iter()
            .filter_map(|key| self.get(key).ok().map(|value| (key.clone(), value)))
            .collect()
    }

    /// Every slot currently written, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.slots
            .iter()
            .map(|slot| (slot.key().clone(), slot.value().clone()))
            .collect()
    }
}

#[cfg(test)]
impl Blackboard {
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_get_absent_key_is_not_found() {
        let bb = Blackboard::new();
        assert_eq!(
            bb.get("rating"),
            Err(BlackboardError::NotFound("rating".to_string()))
        );
    }

    #[test]
    fn test_empty_value_is_distinct_from_not_found() {
        let bb = Blackboard::new();
        bb.set("red_flags", json!("")).unwrap();
        assert_eq!(bb.get("red_flags").unwrap(), json!(""));
    }

    #[test]
    fn test_second_set_is_rejected_and_keeps_first_value() {
        let bb = Blackboard::new();
        bb.set("rating", json!("excellent")).unwrap();

        let second = bb.set("rating", json!("fake"));
        assert_eq!(
            second,
            Err(BlackboardError::AlreadySet("rating".to_string()))
        );
        assert_eq!(bb.get("rating").unwrap(), json!("excellent"));
        assert_eq!(bb.len(), 1);
    }

    #[test]
    fn test_capture_skips_missing_keys() {
        let bb = Blackboard::new();
        bb.set("rating", json!("normal")).unwrap();
        bb.set("reason", json!("Some relevant experience")).unwrap();

        let keys = vec![
            "rating".to_string(),
            "reason".to_string(),
            "seniority".to_string(),
        ];
        let captured = bb.capture(&keys);
        assert_eq!(captured.len(), 2);
        assert_eq!(captured["rating"], json!("normal"));
        assert!(!captured.contains_key("seniority"));
    }

    #[test]
    fn test_snapshot_is_ordered_by_key() {
        let bb = Blackboard::new();
        bb.set("seniority", json!("Senior")).unwrap();
        bb.set("culture_fit", json!("Remote-first")).unwrap();
        let keys: Vec<_> = bb.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["culture_fit", "seniority"]);
    }

    #[tokio::test]
    async fn test_concurrent_writers_on_one_key_have_exactly_one_winner() {
        let bb = Arc::new(Blackboard::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let bb = bb.clone();
            handles.push(tokio::spawn(async move {
                bb.set("rating", json!(format!("writer-{i}"))).is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(bb.len(), 1);
    }
}
