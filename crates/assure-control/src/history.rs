//! Fulfillment History (Tamper-Evident)

use assure_common::ControlId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::control::Fulfillment;

const GENESIS: &str = "genesis";

/// Hash-chained trail of fulfillment transitions
pub struct FulfillmentHistory {
    entries: Arc<RwLock<Vec<FulfillmentChange>>>,
}

impl FulfillmentHistory {
    /// Empty history
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Record a transition
    pub fn record(
        &self,
        control_id: &ControlId,
        previous: Fulfillment,
        current: Fulfillment,
        cause: ChangeCause,
    ) {
        // Single write lock so prev_hash and push cannot interleave
        let mut entries = self.entries.write();
        let prev_hash = entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS.into());

        let change = FulfillmentChange::new(control_id, previous, current, cause, &prev_hash);
        tracing::info!(
            control = %control_id,
            %previous,
            %current,
            ?cause,
            "Fulfillment changed"
        );
        entries.push(change);
    }

    /// Entries, optionally restricted to one control
    pub fn entries(&self, control_id: Option<&ControlId>) -> Vec<FulfillmentChange> {
        let entries = self.entries.read();
        match control_id {
            Some(id) => entries.iter().filter(|e| &e.control_id == id).cloned().collect(),
            None => entries.clone(),
        }
    }

    /// Number of recorded changes
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Verify chain integrity
    pub fn verify_integrity(&self) -> IntegrityResult {
        let entries = self.entries.read();
        let mut prev_hash = GENESIS.to_string();
        let mut valid_count = 0;

        for entry in entries.iter() {
            if entry.prev_hash != prev_hash {
                return IntegrityResult {
                    valid: false,
                    checked_count: valid_count,
                    error: Some(format!("Hash chain broken at entry {}", entry.id)),
                };
            }

            if entry.compute_hash(&prev_hash) != entry.hash {
                return IntegrityResult {
                    valid: false,
                    checked_count: valid_count,
                    error: Some(format!("Entry {} hash mismatch", entry.id)),
                };
            }

            prev_hash = entry.hash.clone();
            valid_count += 1;
        }

        IntegrityResult {
            valid: true,
            checked_count: valid_count,
            error: None,
        }
    }

    /// Export as pretty JSON
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&*self.entries.read())
    }
}

impl Default for FulfillmentHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// What caused a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCause {
    /// Produced by an evaluation
    Evaluation,
    /// Set by an administrative override
    Override,
}

/// One recorded transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentChange {
    /// Change id
    pub id: String,
    /// When the change was recorded
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Control that changed
    pub control_id: ControlId,
    /// Fulfillment before the change
    pub previous: Fulfillment,
    /// Fulfillment after the change
    pub current: Fulfillment,
    /// What caused the change
    pub cause: ChangeCause,
    /// Hash of the previous entry
    pub prev_hash: String,
    /// Hash of this entry
    pub hash: String,
}

impl FulfillmentChange {
    fn new(
        control_id: &ControlId,
        previous: Fulfillment,
        current: Fulfillment,
        cause: ChangeCause,
        prev_hash: &str,
    ) -> Self {
        let mut change = Self {
            id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            control_id: control_id.clone(),
            previous,
            current,
            cause,
            prev_hash: prev_hash.to_string(),
            hash: String::new(),
        };

        change.hash = change.compute_hash(prev_hash);
        change
    }

    fn compute_hash(&self, prev_hash: &str) -> String {
        let data = format!(
            "{}|{}|{}|{}|{}|{:?}|{}",
            self.id,
            self.timestamp.to_rfc3339(),
            self.control_id,
            self.previous,
            self.current,
            self.cause,
            prev_hash
        );
        hex::encode(Sha256::digest(data.as_bytes()))
    }
}

/// Integrity check result
#[derive(Debug, Clone)]
pub struct IntegrityResult {
    /// True if the chain is intact
    pub valid: bool,
    /// Entries checked
    pub checked_count: usize,
    /// First problem found
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ControlId {
        ControlId::new(s).unwrap()
    }

    #[test]
    fn test_chain_verifies() {
        let history = FulfillmentHistory::new();
        history.record(&id("IVS-01"), Fulfillment::NotEvaluated, Fulfillment::Good, ChangeCause::Evaluation);
        history.record(&id("IVS-01"), Fulfillment::Good, Fulfillment::Warning, ChangeCause::Evaluation);
        history.record(&id("IAM-02"), Fulfillment::NotEvaluated, Fulfillment::Good, ChangeCause::Override);

        let result = history.verify_integrity();
        assert!(result.valid);
        assert_eq!(result.checked_count, 3);

        let entries = history.entries(None);
        assert_eq!(entries[0].prev_hash, GENESIS);
        assert_eq!(entries[1].prev_hash, entries[0].hash);
    }

    #[test]
    fn test_tampering_detected() {
        let history = FulfillmentHistory::new();
        history.record(&id("IVS-01"), Fulfillment::NotEvaluated, Fulfillment::Warning, ChangeCause::Evaluation);
        history.record(&id("IVS-01"), Fulfillment::Warning, Fulfillment::Good, ChangeCause::Evaluation);

        history.entries.write()[0].current = Fulfillment::Good;

        let result = history.verify_integrity();
        assert!(!result.valid);
        assert_eq!(result.checked_count, 0);
        assert!(result.error.unwrap().contains("hash mismatch"));
    }

    #[test]
    fn test_filter_by_control() {
        let history = FulfillmentHistory::new();
        history.record(&id("IVS-01"), Fulfillment::NotEvaluated, Fulfillment::Good, ChangeCause::Evaluation);
        history.record(&id("IAM-02"), Fulfillment::NotEvaluated, Fulfillment::Warning, ChangeCause::Evaluation);

        let only = history.entries(Some(&id("IAM-02")));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].current, Fulfillment::Warning);
    }

    #[test]
    fn test_export_json() {
        let history = FulfillmentHistory::new();
        history.record(&id("IVS-01"), Fulfillment::NotEvaluated, Fulfillment::Good, ChangeCause::Override);

        let json = history.export_json().unwrap();
        let parsed: Vec<FulfillmentChange> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].cause, ChangeCause::Override);
    }
}
