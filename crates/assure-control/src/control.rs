//! Controls and fulfillment evaluation

use std::fmt;
use std::hash::{Hash, Hasher};

use assure_common::{AssetRegistry, AssureResult, ControlId, EvaluationResult, Rule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fulfillment state of a control
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Fulfillment {
    /// No result has been seen yet
    #[default]
    NotEvaluated,
    /// At least one result has failed conditions
    Warning,
    /// Results exist and none failed
    Good,
}

impl Fulfillment {
    /// Derive fulfillment from one pass worth of results
    ///
    /// No results means nothing could be evaluated; a single failed result
    /// anywhere downgrades the whole control.
    pub fn from_results(results: &[EvaluationResult]) -> Self {
        if results.is_empty() {
            Self::NotEvaluated
        } else if results.iter().any(EvaluationResult::has_failed_conditions) {
            Self::Warning
        } else {
            Self::Good
        }
    }
}

impl fmt::Display for Fulfillment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEvaluated => write!(f, "NOT_EVALUATED"),
            Self::Warning => write!(f, "WARNING"),
            Self::Good => write!(f, "GOOD"),
        }
    }
}

/// Categorical grouping of controls
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain {
    /// Domain name, e.g. `IVS`
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

impl Domain {
    /// Domain with an empty description
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }
}

/// Outcome of the last evaluation pass
///
/// Always replaced as a whole, never patched field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationState {
    /// Results collected by the last evaluation
    pub results: Vec<EvaluationResult>,
    /// Aggregated fulfillment
    pub fulfilled: Fulfillment,
    /// Violation counter, always 0 after an evaluation
    pub violations: u32,
    /// When the last evaluation committed
    pub evaluated_at: Option<DateTime<Utc>>,
}

/// A compliance requirement and its last computed fulfillment
///
/// # Invariants
/// - `fulfilled` only changes through [`Control::evaluate`] or the explicit
///   [`Control::set_fulfilled`] override
/// - `results` hold the last pass only
/// - No rules means `NotEvaluated`
#[derive(Debug, Clone, Serialize)]
pub struct Control {
    control_id: ControlId,
    name: String,
    description: String,
    domain: Domain,
    automated: bool,
    active: bool,
    rules: Vec<Rule>,
    #[serde(flatten)]
    state: EvaluationState,
}

impl Control {
    /// Create an inactive, manual control without rules
    pub fn new(control_id: ControlId, name: impl Into<String>, domain: Domain) -> Self {
        Self {
            control_id,
            name: name.into(),
            description: String::new(),
            domain,
            automated: false,
            active: false,
            rules: Vec::new(),
            state: EvaluationState::default(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the rules
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    /// Mark as automated
    pub fn with_automated(mut self, automated: bool) -> Self {
        self.automated = automated;
        self
    }

    /// Mark as active
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Recompute results and fulfillment from the registry
    ///
    /// Results are staged locally and committed together with the new
    /// fulfillment. If the registry fails, the error is returned and the
    /// previously committed state is left untouched.
    pub fn evaluate<R>(&mut self, registry: &R) -> AssureResult<Fulfillment>
    where
        R: AssetRegistry + ?Sized,
    {
        if self.rules.is_empty() {
            self.commit(Vec::new(), Fulfillment::NotEvaluated);
            return Ok(Fulfillment::NotEvaluated);
        }

        let mut results = Vec::new();
        for rule in &self.rules {
            let assets = registry.assets_with_type(rule.asset_type())?;
            for asset in &assets {
                results.extend(asset.results_for_rule(rule.id()).cloned());
            }
        }

        let fulfilled = Fulfillment::from_results(&results);
        tracing::debug!(
            control = %self.control_id,
            rules = self.rules.len(),
            results = results.len(),
            %fulfilled,
            "Evaluated control"
        );
        self.commit(results, fulfilled);
        Ok(fulfilled)
    }

    fn commit(&mut self, results: Vec<EvaluationResult>, fulfilled: Fulfillment) {
        // TODO: derive violations from failed results once the counting rule is agreed on
        self.state = EvaluationState {
            results,
            fulfilled,
            violations: 0,
            evaluated_at: Some(Utc::now()),
        };
    }

    /// Active and fulfilled
    pub fn is_good(&self) -> bool {
        self.active && self.state.fulfilled == Fulfillment::Good
    }

    /// Active with at least one failing result
    pub fn has_warning(&self) -> bool {
        self.active && self.state.fulfilled == Fulfillment::Warning
    }

    /// Administrative override of the computed fulfillment
    pub fn set_fulfilled(&mut self, fulfilled: Fulfillment) {
        self.state.fulfilled = fulfilled;
    }

    /// Business key
    pub fn control_id(&self) -> &ControlId {
        &self.control_id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Owning domain
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Whether evidence is collected automatically
    pub fn is_automated(&self) -> bool {
        self.automated
    }

    /// Whether the control is in scope
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Set the active flag
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Set the automated flag
    pub fn set_automated(&mut self, automated: bool) {
        self.automated = automated;
    }

    /// Rules, in evaluation order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Replace the rules; the evaluation state is kept until the next evaluation
    pub fn set_rules(&mut self, rules: Vec<Rule>) {
        self.rules = rules;
    }

    /// Fulfillment of the last evaluation or override
    pub fn fulfilled(&self) -> Fulfillment {
        self.state.fulfilled
    }

    /// Results of the last evaluation
    pub fn results(&self) -> &[EvaluationResult] {
        &self.state.results
    }

    /// Violation counter
    pub fn violations(&self) -> u32 {
        self.state.violations
    }

    /// Full evaluation state
    pub fn state(&self) -> &EvaluationState {
        &self.state
    }
}

// Identity is the definition: rules, id, description, domain and name.
impl PartialEq for Control {
    fn eq(&self, other: &Self) -> bool {
        self.rules == other.rules
            && self.control_id == other.control_id
            && self.description == other.description
            && self.domain == other.domain
            && self.name == other.name
    }
}

impl Eq for Control {}

impl Hash for Control {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rules.hash(state);
        self.control_id.hash(state);
        self.description.hash(state);
        self.domain.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<&str> = self.rules.iter().map(|r| r.id.as_str()).collect();
        write!(
            f,
            "{} ({}) [{}] rules=[{}]",
            self.control_id,
            self.name,
            self.state.fulfilled,
            rules.join(", ")
        )
    }
}
