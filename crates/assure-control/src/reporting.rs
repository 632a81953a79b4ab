//! Fulfillment Reporting

use std::collections::BTreeMap;

use assure_common::ControlId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::control::{Control, Fulfillment};

/// Fulfillment counts over a set of controls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentScore {
    /// All controls
    pub total_controls: usize,
    /// Controls in scope
    pub active_controls: usize,
    /// Active controls that are good
    pub good: usize,
    /// Controls with a warning
    pub warning: usize,
    /// Controls not evaluated yet
    pub not_evaluated: usize,
    /// Good controls as a share of active controls
    pub score_percent: f64,
}

impl FulfillmentScore {
    fn add(&mut self, control: &Control) {
        self.total_controls += 1;
        if !control.is_active() {
            return;
        }
        self.active_controls += 1;
        match control.fulfilled() {
            Fulfillment::Good => self.good += 1,
            Fulfillment::Warning => self.warning += 1,
            Fulfillment::NotEvaluated => self.not_evaluated += 1,
        }
    }

    fn finish(&mut self) {
        self.score_percent = if self.active_controls > 0 {
            (self.good as f64 / self.active_controls as f64) * 100.0
        } else {
            0.0
        };
    }

    /// Controls out of scope
    pub fn inactive_controls(&self) -> usize {
        self.total_controls - self.active_controls
    }
}

/// Overall and per-domain fulfillment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentSummary {
    /// Score over all controls
    pub overall: FulfillmentScore,
    /// Score per domain name
    pub domains: BTreeMap<String, FulfillmentScore>,
    /// When the summary was built
    pub generated_at: DateTime<Utc>,
}

impl FulfillmentSummary {
    /// Summarize controls; only active controls count towards states
    pub fn from_controls<'a>(controls: impl IntoIterator<Item = &'a Control>) -> Self {
        let mut overall = FulfillmentScore::default();
        let mut domains: BTreeMap<String, FulfillmentScore> = BTreeMap::new();

        for control in controls {
            overall.add(control);
            domains
                .entry(control.domain().name.clone())
                .or_default()
                .add(control);
        }

        overall.finish();
        domains.values_mut().for_each(FulfillmentScore::finish);

        Self {
            overall,
            domains,
            generated_at: Utc::now(),
        }
    }
}

/// Outcome of one pass over all monitored controls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    /// Cycle start
    pub started_at: DateTime<Utc>,
    /// Cycle end
    pub finished_at: DateTime<Utc>,
    /// Controls evaluated without error
    pub evaluated: usize,
    /// Evaluated controls that came out good
    pub good: usize,
    /// Evaluated controls with a warning
    pub warning: usize,
    /// Evaluated controls without results
    pub not_evaluated: usize,
    /// Controls that failed to evaluate
    pub failures: Vec<CycleFailure>,
}

/// A control whose evaluation failed during a cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleFailure {
    /// Control that failed
    pub control_id: ControlId,
    /// Error message
    pub error: String,
}

impl CycleReport {
    pub(crate) fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            evaluated: 0,
            good: 0,
            warning: 0,
            not_evaluated: 0,
            failures: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, control_id: ControlId, outcome: Result<Fulfillment, String>) {
        match outcome {
            Ok(fulfilled) => {
                self.evaluated += 1;
                match fulfilled {
                    Fulfillment::Good => self.good += 1,
                    Fulfillment::Warning => self.warning += 1,
                    Fulfillment::NotEvaluated => self.not_evaluated += 1,
                }
            }
            Err(error) => self.failures.push(CycleFailure { control_id, error }),
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Every control evaluated without a registry failure
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
