//! Assure Control - Control fulfillment evaluation
//!
//! Computes whether compliance controls are fulfilled from the rule results
//! already attached to discovered assets.
//!
//! # Evaluation
//!
//! ```text
//!  Control ──rules──► Rule { asset_type }
//!                          │
//!                          ▼  assets_with_type()
//!                    AssetRegistry ──► [Asset] ──► results of this rule
//!                                                        │
//!                    ┌───────────────────────────────────┘
//!                    ▼
//!     no results ─► NOT_EVALUATED   any failed ─► WARNING   else ─► GOOD
//! ```
//!
//! The [`ControlMonitor`] keeps many controls alive across monitoring cycles.
//! A control is only ever evaluated by one caller at a time, while different
//! controls evaluate independently against the shared read-only registry.

#![warn(missing_docs)]

pub mod catalog;
pub mod control;
pub mod history;
pub mod reporting;

use std::sync::Arc;

use assure_common::{AssetRegistry, AssureError, AssureResult, ControlId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

pub use catalog::{ControlCatalog, ControlDefinition};
pub use control::{Control, Domain, EvaluationState, Fulfillment};
pub use history::{ChangeCause, FulfillmentChange, FulfillmentHistory};
pub use reporting::{CycleReport, FulfillmentScore, FulfillmentSummary};

/// A control behind its own lock; emptied when the control is unregistered
type Slot = Arc<Mutex<Option<Control>>>;

/// Long-lived holder of monitored controls
pub struct ControlMonitor {
    /// Controls keyed by id, each behind its own lock
    controls: DashMap<ControlId, Slot>,
    /// Asset registry queried during evaluation
    registry: Arc<dyn AssetRegistry>,
    /// Fulfillment transitions
    history: Arc<FulfillmentHistory>,
}

impl ControlMonitor {
    /// Create monitor over a registry
    pub fn new(registry: Arc<dyn AssetRegistry>) -> Self {
        Self {
            controls: DashMap::new(),
            registry,
            history: Arc::new(FulfillmentHistory::new()),
        }
    }

    /// Create monitor and register controls
    pub fn with_controls(
        registry: Arc<dyn AssetRegistry>,
        controls: impl IntoIterator<Item = Control>,
    ) -> Self {
        let monitor = Self::new(registry);
        for control in controls {
            monitor.register(control);
        }
        tracing::info!("Monitoring {} controls", monitor.len());
        monitor
    }

    /// Register a control
    ///
    /// If an equal control is already registered under the same id, its
    /// evaluation state is kept, the `active` and `automated` flags are taken
    /// from the new control and `false` is returned. A differing definition
    /// replaces the old one. Replacement happens in place under the control's
    /// lock, so it waits for an in-flight evaluation and later evaluations
    /// see the new definition.
    pub fn register(&self, control: Control) -> bool {
        match self.controls.entry(control.control_id().clone()) {
            Entry::Occupied(entry) => {
                let mut current = entry.get().lock();
                match current.as_mut() {
                    Some(existing) if *existing == control => {
                        existing.set_active(control.is_active());
                        existing.set_automated(control.is_automated());
                        false
                    }
                    _ => {
                        tracing::debug!(control = %control.control_id(), "Replacing control definition");
                        *current = Some(control);
                        true
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(Some(control))));
                true
            }
        }
    }

    /// Remove a control
    ///
    /// Evaluations that already looked up the control find it gone once they
    /// take its lock.
    pub fn unregister(&self, control_id: &ControlId) -> Option<Control> {
        self.controls
            .remove(control_id)
            .and_then(|(_, slot)| slot.lock().take())
    }

    /// Evaluate one control
    ///
    /// Holds the control's lock for the whole pass, so evaluations of the same
    /// control never overlap.
    pub fn evaluate(&self, control_id: &ControlId) -> AssureResult<Fulfillment> {
        let slot = self.slot(control_id)?;
        let mut guard = slot.lock();
        let control = guard
            .as_mut()
            .ok_or_else(|| AssureError::ControlNotFound(control_id.to_string()))?;

        let previous = control.fulfilled();
        let current = control.evaluate(&*self.registry)?;
        if previous != current {
            self.history
                .record(control_id, previous, current, ChangeCause::Evaluation);
        }
        Ok(current)
    }

    /// Evaluate every control in id order
    ///
    /// A failing control is reported and skipped; the rest of the cycle runs.
    pub fn evaluate_all(&self) -> CycleReport {
        let mut report = CycleReport::start();
        for control_id in self.ids() {
            let outcome = self.evaluate(&control_id).map_err(|e| {
                tracing::warn!(control = %control_id, error = %e, "Control evaluation failed");
                e.to_string()
            });
            report.record(control_id, outcome);
        }
        let report = report.finish();
        log_cycle(&report);
        report
    }

    /// Evaluate every control concurrently on the blocking pool
    pub async fn run_cycle(self: &Arc<Self>) -> CycleReport {
        let mut report = CycleReport::start();

        let handles: Vec<_> = self
            .ids()
            .into_iter()
            .map(|control_id| {
                let monitor = Arc::clone(self);
                let id = control_id.clone();
                (control_id, tokio::task::spawn_blocking(move || monitor.evaluate(&id)))
            })
            .collect();

        for (control_id, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(fulfilled)) => Ok(fulfilled),
                Ok(Err(e)) => {
                    tracing::warn!(control = %control_id, error = %e, "Control evaluation failed");
                    Err(e.to_string())
                }
                Err(e) => {
                    tracing::error!(control = %control_id, error = %e, "Evaluation task aborted");
                    Err(e.to_string())
                }
            };
            report.record(control_id, outcome);
        }

        let report = report.finish();
        log_cycle(&report);
        report
    }

    /// Administrative override of a control's fulfillment
    pub fn set_fulfilled(&self, control_id: &ControlId, fulfilled: Fulfillment) -> AssureResult<()> {
        let slot = self.slot(control_id)?;
        let mut guard = slot.lock();
        let control = guard
            .as_mut()
            .ok_or_else(|| AssureError::ControlNotFound(control_id.to_string()))?;

        let previous = control.fulfilled();
        control.set_fulfilled(fulfilled);
        if previous != fulfilled {
            self.history
                .record(control_id, previous, fulfilled, ChangeCause::Override);
        }
        Ok(())
    }

    /// Snapshot of one control
    pub fn control(&self, control_id: &ControlId) -> Option<Control> {
        self.controls
            .get(control_id)
            .and_then(|slot| slot.value().lock().clone())
    }

    /// Snapshot of all controls in id order
    pub fn controls(&self) -> Vec<Control> {
        self.ids()
            .iter()
            .filter_map(|id| self.control(id))
            .collect()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<ControlId> {
        let mut ids: Vec<_> = self.controls.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of registered controls
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Current fulfillment summary
    pub fn summary(&self) -> FulfillmentSummary {
        FulfillmentSummary::from_controls(&self.controls())
    }

    /// Fulfillment transition history
    pub fn history(&self) -> &Arc<FulfillmentHistory> {
        &self.history
    }

    // Clone the slot out so the map shard is not locked during evaluation.
    fn slot(&self, control_id: &ControlId) -> AssureResult<Slot> {
        self.controls
            .get(control_id)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or_else(|| AssureError::ControlNotFound(control_id.to_string()))
    }
}

fn log_cycle(report: &CycleReport) {
    tracing::info!(
        evaluated = report.evaluated,
        good = report.good,
        warning = report.warning,
        not_evaluated = report.not_evaluated,
        failed = report.failures.len(),
        "Evaluation cycle finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use assure_common::{
        Asset, AssetId, AssetType, EvaluationResult, InMemoryAssetRegistry, RegistryError,
        RegistryResult, Rule, RuleId,
    };

    fn rule(id: &str, ty: &str) -> Rule {
        Rule::new(RuleId::new(id).unwrap(), AssetType::new(ty).unwrap())
    }

    fn bucket(id: &str, rule_id: &str, failing: bool) -> Asset {
        let asset_id = AssetId::new(id).unwrap();
        let rule_id = RuleId::new(rule_id).unwrap();
        let result = if failing {
            EvaluationResult::failed(rule_id, asset_id.clone(), vec!["public == false".into()])
        } else {
            EvaluationResult::passed(rule_id, asset_id.clone())
        };
        Asset::new(asset_id, AssetType::new("Bucket").unwrap()).with_result(result)
    }

    fn control(id: &str, rules: Vec<Rule>) -> Control {
        Control::new(ControlId::new(id).unwrap(), id, Domain::new("IVS"))
            .with_rules(rules)
            .with_active(true)
    }

    fn id(s: &str) -> ControlId {
        ControlId::new(s).unwrap()
    }

    /// Fails lookups for one asset type only
    struct PartiallyFailingRegistry {
        inner: InMemoryAssetRegistry,
        broken: AssetType,
    }

    impl AssetRegistry for PartiallyFailingRegistry {
        fn assets_with_type(&self, asset_type: &AssetType) -> RegistryResult<Vec<Arc<Asset>>> {
            if asset_type == &self.broken {
                return Err(RegistryError::Unavailable("timeout".into()));
            }
            self.inner.assets_with_type(asset_type)
        }
    }

    fn monitor() -> (Arc<InMemoryAssetRegistry>, ControlMonitor) {
        let registry = Arc::new(InMemoryAssetRegistry::with_assets(vec![
            bucket("b1", "encryption", false),
            bucket("b2", "public-access", true),
        ]));
        let monitor = ControlMonitor::with_controls(
            registry.clone(),
            vec![
                control("IVS-01", vec![rule("encryption", "Bucket")]),
                control("IVS-02", vec![rule("public-access", "Bucket")]),
                control("IVS-03", vec![]),
            ],
        );
        (registry, monitor)
    }

    #[test]
    fn test_evaluate_all() {
        let (_, monitor) = monitor();
        let report = monitor.evaluate_all();

        assert_eq!(report.evaluated, 3);
        assert_eq!(report.good, 1);
        assert_eq!(report.warning, 1);
        assert_eq!(report.not_evaluated, 1);
        assert!(report.is_complete());

        assert!(monitor.control(&id("IVS-01")).unwrap().is_good());
        assert!(monitor.control(&id("IVS-02")).unwrap().has_warning());
    }

    #[test]
    fn test_unknown_control() {
        let (_, monitor) = monitor();
        let err = monitor.evaluate(&id("NOPE-1")).unwrap_err();
        assert!(matches!(err, AssureError::ControlNotFound(_)));
        assert!(monitor.set_fulfilled(&id("NOPE-1"), Fulfillment::Good).is_err());
    }

    #[test]
    fn test_history_only_on_transitions() {
        let (registry, monitor) = monitor();
        monitor.evaluate_all();
        // IVS-03 stays NOT_EVALUATED and is not recorded
        assert_eq!(monitor.history().len(), 2);

        monitor.evaluate_all();
        assert_eq!(monitor.history().len(), 2);

        registry.replace(vec![
            bucket("b1", "encryption", false),
            bucket("b2", "public-access", false),
        ]);
        monitor.evaluate_all();

        let changes = monitor.history().entries(Some(&id("IVS-02")));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].previous, Fulfillment::Warning);
        assert_eq!(changes[1].current, Fulfillment::Good);
        assert!(monitor.history().verify_integrity().valid);
    }

    #[test]
    fn test_override_recorded() {
        let (_, monitor) = monitor();
        monitor.set_fulfilled(&id("IVS-03"), Fulfillment::Good).unwrap();

        let changes = monitor.history().entries(None);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].cause, ChangeCause::Override);
        assert_eq!(monitor.control(&id("IVS-03")).unwrap().fulfilled(), Fulfillment::Good);
    }

    #[test]
    fn test_register_keeps_equal_control_state() {
        let (_, monitor) = monitor();
        monitor.evaluate_all();

        // Same definition, different flags: state preserved, flags updated
        let again = control("IVS-01", vec![rule("encryption", "Bucket")])
            .with_active(false)
            .with_automated(true);
        assert!(!monitor.register(again));
        let kept = monitor.control(&id("IVS-01")).unwrap();
        assert_eq!(kept.fulfilled(), Fulfillment::Good);
        assert!(!kept.is_active());
        assert!(kept.is_automated());
        assert!(!kept.is_good());
        assert_eq!(monitor.summary().overall.active_controls, 2);

        // Different rules: replaced, state reset
        let changed = control("IVS-01", vec![rule("versioning", "Bucket")]);
        assert!(monitor.register(changed));
        assert_eq!(
            monitor.control(&id("IVS-01")).unwrap().fulfilled(),
            Fulfillment::NotEvaluated
        );
        assert_eq!(monitor.len(), 3);
    }

    #[test]
    fn test_replace_updates_slot_held_by_evaluator() {
        let (_, monitor) = monitor();
        monitor.evaluate_all();
        let held = monitor.slot(&id("IVS-02")).unwrap();

        let changed = control("IVS-02", vec![rule("encryption", "Bucket")]);
        assert!(monitor.register(changed));

        // An evaluation that looked the control up earlier works on the live definition
        assert!(Arc::ptr_eq(&held, &monitor.slot(&id("IVS-02")).unwrap()));
        let live = held.lock().clone().unwrap();
        assert_eq!(live.rules()[0].id.as_str(), "encryption");
        assert_eq!(live.fulfilled(), Fulfillment::NotEvaluated);

        assert_eq!(monitor.evaluate(&id("IVS-02")).unwrap(), Fulfillment::Good);
        let changes = monitor.history().entries(Some(&id("IVS-02")));
        assert_eq!(changes.last().unwrap().previous, Fulfillment::NotEvaluated);
        assert_eq!(changes.last().unwrap().current, Fulfillment::Good);
    }

    #[test]
    fn test_unregister_empties_held_slot() {
        let (_, monitor) = monitor();
        let held = monitor.slot(&id("IVS-01")).unwrap();

        assert!(monitor.unregister(&id("IVS-01")).is_some());
        assert!(held.lock().is_none());
        assert!(matches!(
            monitor.evaluate(&id("IVS-01")),
            Err(AssureError::ControlNotFound(_))
        ));
        assert!(monitor.history().is_empty());
    }

    #[test]
    fn test_failure_does_not_stop_cycle() {
        let registry = Arc::new(PartiallyFailingRegistry {
            inner: InMemoryAssetRegistry::with_assets(vec![bucket("b1", "encryption", false)]),
            broken: AssetType::new("Database").unwrap(),
        });
        let monitor = ControlMonitor::with_controls(
            registry,
            vec![
                control("DSP-01", vec![rule("db-encryption", "Database")]),
                control("IVS-01", vec![rule("encryption", "Bucket")]),
            ],
        );

        let report = monitor.evaluate_all();
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].control_id, id("DSP-01"));
        assert_eq!(
            monitor.control(&id("DSP-01")).unwrap().fulfilled(),
            Fulfillment::NotEvaluated
        );
    }

    #[test]
    fn test_summary() {
        let (_, monitor) = monitor();
        monitor.evaluate_all();
        let summary = monitor.summary();
        assert_eq!(summary.overall.total_controls, 3);
        assert_eq!(summary.domains["IVS"].good, 1);
    }

    #[test]
    fn test_unregister() {
        let (_, monitor) = monitor();
        assert!(monitor.unregister(&id("IVS-03")).is_some());
        assert!(monitor.unregister(&id("IVS-03")).is_none());
        assert_eq!(monitor.ids(), vec![id("IVS-01"), id("IVS-02")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_cycle_concurrent() {
        let registry = Arc::new(InMemoryAssetRegistry::with_assets(
            (0..50).map(|i| bucket(&format!("b{i}"), &format!("rule-{}", i % 10), i % 7 == 0)),
        ));
        let controls =
            (0..10).map(|i| control(&format!("CTL-{i:02}"), vec![rule(&format!("rule-{i}"), "Bucket")]));
        let monitor = Arc::new(ControlMonitor::with_controls(registry, controls));

        let report = monitor.run_cycle().await;
        assert_eq!(report.evaluated, 10);
        assert!(report.is_complete());

        let sequential = monitor.evaluate_all();
        assert_eq!(sequential.good, report.good);
        assert_eq!(sequential.warning, report.warning);
    }

    #[test]
    fn test_demo_catalog_end_to_end() {
        let controls = ControlCatalog::from_json_str(include_str!("../../../demos/catalog.json"))
            .unwrap()
            .into_controls()
            .unwrap();
        let registry =
            InMemoryAssetRegistry::from_json_str(include_str!("../../../demos/assets.json")).unwrap();
        let monitor = ControlMonitor::with_controls(Arc::new(registry), controls);

        let report = monitor.evaluate_all();
        assert!(report.is_complete());
        assert_eq!(report.evaluated, 4);

        let ivs = monitor.control(&id("IVS-04")).unwrap();
        assert_eq!(ivs.results().len(), 4);
        assert!(ivs.has_warning());
        assert!(monitor.control(&id("EKM-03")).unwrap().is_good());
        assert_eq!(
            monitor.control(&id("IAM-09")).unwrap().fulfilled(),
            Fulfillment::NotEvaluated
        );
        // No Database assets: not evaluated, and inactive anyway
        let iam12 = monitor.control(&id("IAM-12")).unwrap();
        assert_eq!(iam12.fulfilled(), Fulfillment::NotEvaluated);
        assert!(!iam12.is_good());

        let summary = monitor.summary();
        assert_eq!(summary.overall.active_controls, 3);
        assert_eq!(summary.overall.good, 1);
    }
}
