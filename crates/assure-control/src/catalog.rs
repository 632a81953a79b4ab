//! Control Catalog
//!
//! Static control definitions as loaded from configuration. The catalog is
//! plain JSON:
//!
//! ```json
//! {
//!   "domains": [{ "name": "IVS", "description": "Infrastructure & Virtualization Security" }],
//!   "controls": [{
//!     "control_id": "IVS-01",
//!     "name": "Storage encryption",
//!     "domain": "IVS",
//!     "automated": true,
//!     "active": true,
//!     "rules": [{ "id": "s3-encryption", "asset_type": "S3Bucket" }]
//!   }]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use assure_common::{AssureError, AssureResult, ControlId, Rule};
use serde::{Deserialize, Serialize};

use crate::control::{Control, Domain};

/// Control definition as stored in a catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlDefinition {
    /// Control identifier
    pub control_id: ControlId,
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Domain name, resolved against the catalog's domains
    pub domain: String,
    /// Whether evidence is collected automatically
    #[serde(default)]
    pub automated: bool,
    /// Whether the control is in scope
    #[serde(default)]
    pub active: bool,
    /// Rules the control aggregates
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Domains and control definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlCatalog {
    /// Domains referenced by the controls
    #[serde(default)]
    pub domains: Vec<Domain>,
    /// Control definitions
    #[serde(default)]
    pub controls: Vec<ControlDefinition>,
}

impl ControlCatalog {
    /// Parse from JSON
    pub fn from_json_str(json: &str) -> AssureResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from file
    pub fn load(path: impl AsRef<Path>) -> AssureResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&content)?;
        tracing::info!(
            "Loaded {} controls in {} domains from {}",
            catalog.controls.len(),
            catalog.domains.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Save to file
    pub fn save(&self, path: impl AsRef<Path>) -> AssureResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build controls, resolving domains
    ///
    /// Fails on a reference to an undeclared domain or a repeated control id.
    pub fn into_controls(self) -> AssureResult<Vec<Control>> {
        let domains: HashMap<String, Domain> = self
            .domains
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();

        let mut seen = HashSet::new();
        let mut controls = Vec::with_capacity(self.controls.len());

        for def in self.controls {
            if !seen.insert(def.control_id.clone()) {
                return Err(AssureError::ConfigError(format!(
                    "duplicate control id {}",
                    def.control_id
                )));
            }

            let domain = domains.get(&def.domain).cloned().ok_or_else(|| {
                AssureError::ConfigError(format!(
                    "control {} references unknown domain {}",
                    def.control_id, def.domain
                ))
            })?;

            if def.active && def.rules.is_empty() {
                tracing::warn!(control = %def.control_id, "Active control has no rules and will never be evaluated");
            }

            controls.push(
                Control::new(def.control_id, def.name, domain)
                    .with_description(def.description)
                    .with_automated(def.automated)
                    .with_active(def.active)
                    .with_rules(def.rules),
            );
        }

        Ok(controls)
    }
}
