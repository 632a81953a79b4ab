//! Rules, assets and evaluation results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AssetId, AssetType, RuleId};

/// A checkable condition bound to an asset type
///
/// Conditions are opaque expressions here; matching them against assets is
/// done by the rule engine before results reach a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Rule identifier
    pub id: RuleId,
    /// Type of asset the rule applies to
    pub asset_type: AssetType,
    /// Human readable name
    #[serde(default)]
    pub name: String,
    /// What the rule checks
    #[serde(default)]
    pub description: String,
    /// Conditions an asset must satisfy
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl Rule {
    /// Create rule with no name or conditions
    pub fn new(id: RuleId, asset_type: AssetType) -> Self {
        Self {
            id,
            asset_type,
            name: String::new(),
            description: String::new(),
            conditions: Vec::new(),
        }
    }

    /// Set display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a condition expression
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Rule identifier
    pub fn id(&self) -> &RuleId {
        &self.id
    }

    /// Asset type the rule applies to
    pub fn asset_type(&self) -> &AssetType {
        &self.asset_type
    }
}

/// Outcome of applying one rule to one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Rule that produced the result
    pub rule_id: RuleId,
    /// Asset the result belongs to
    pub asset_id: AssetId,
    /// Conditions of the rule the asset did not satisfy
    #[serde(default)]
    pub failed_conditions: Vec<String>,
    /// When the rule ran against the asset
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Passing result stamped now
    pub fn passed(rule_id: RuleId, asset_id: AssetId) -> Self {
        Self {
            rule_id,
            asset_id,
            failed_conditions: Vec::new(),
            evaluated_at: Utc::now(),
        }
    }

    /// Failing result stamped now
    pub fn failed(rule_id: RuleId, asset_id: AssetId, failed_conditions: Vec<String>) -> Self {
        Self {
            rule_id,
            asset_id,
            failed_conditions,
            evaluated_at: Utc::now(),
        }
    }

    /// Identifier of the rule that produced this result
    pub fn rule_id(&self) -> &RuleId {
        &self.rule_id
    }

    /// At least one condition of the rule failed
    #[inline]
    pub fn has_failed_conditions(&self) -> bool {
        !self.failed_conditions.is_empty()
    }
}

/// A discovered resource and its evaluation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier
    pub id: AssetId,
    /// Asset type, used for registry lookups
    pub asset_type: AssetType,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Results of rules already run against this asset
    #[serde(default)]
    pub evaluation_results: Vec<EvaluationResult>,
}

impl Asset {
    /// Create asset without any results
    pub fn new(id: AssetId, asset_type: AssetType) -> Self {
        Self {
            id,
            asset_type,
            name: String::new(),
            evaluation_results: Vec::new(),
        }
    }

    /// Attach an evaluation result
    pub fn with_result(mut self, result: EvaluationResult) -> Self {
        self.evaluation_results.push(result);
        self
    }

    /// Asset type
    pub fn asset_type(&self) -> &AssetType {
        &self.asset_type
    }

    /// Recorded results, oldest first
    pub fn evaluation_results(&self) -> &[EvaluationResult] {
        &self.evaluation_results
    }

    /// Results produced by one rule, in recorded order
    pub fn results_for_rule<'a>(
        &'a self,
        rule_id: &'a RuleId,
    ) -> impl Iterator<Item = &'a EvaluationResult> + 'a {
        self.evaluation_results
            .iter()
            .filter(move |r| r.rule_id() == rule_id)
    }
}
