//! Value Objects - Validated identifiers
//!
//! Identifiers are:
//! - Immutable
//! - Comparable by value
//! - Self-validating, including when deserialized

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum identifier length, in bytes
pub const MAX_ID_LEN: usize = 128;

/// Domain validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Control id failed validation
    #[error("invalid control id: {0}")]
    InvalidControlId(String),

    /// Rule id failed validation
    #[error("invalid rule id: {0}")]
    InvalidRuleId(String),

    /// Asset id failed validation
    #[error("invalid asset id: {0}")]
    InvalidAssetId(String),

    /// Asset type failed validation
    #[error("invalid asset type: {0}")]
    InvalidAssetType(String),
}

fn check(id: &str) -> Result<(), &'static str> {
    if id.trim().is_empty() {
        return Err("cannot be empty");
    }
    if id.len() > MAX_ID_LEN {
        return Err("max 128 bytes");
    }
    if id.chars().any(char::is_control) {
        return Err("control characters not allowed");
    }
    Ok(())
}

/// Control identifier (Value Object)
///
/// The business key of a control, e.g. a CCM control id such as `IVS-01`.
///
/// # Invariants
/// - Non-blank
/// - Max 128 bytes
/// - No control characters
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ControlId(String);

impl ControlId {
    /// Create new control ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        check(&id).map_err(|e| DomainError::InvalidControlId(e.into()))?;
        Ok(Self(id))
    }

    /// Get inner value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ControlId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ControlId> for String {
    fn from(id: ControlId) -> Self {
        id.0
    }
}

/// Rule identifier (Value Object)
///
/// # Invariants
/// - Non-blank
/// - Max 128 bytes
/// - No control characters
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleId(String);

impl RuleId {
    /// Create new rule ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        check(&id).map_err(|e| DomainError::InvalidRuleId(e.into()))?;
        Ok(Self(id))
    }

    /// Get inner value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RuleId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RuleId> for String {
    fn from(id: RuleId) -> Self {
        id.0
    }
}

/// Asset identifier (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Create new asset ID
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        check(&id).map_err(|e| DomainError::InvalidAssetId(e.into()))?;
        Ok(Self(id))
    }

    /// Get inner value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AssetId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

/// Asset type (Value Object)
///
/// The kind of asset a rule applies to, e.g. `S3Bucket` or `VirtualMachine`.
/// Compared exactly; no case folding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetType(String);

impl AssetType {
    /// Create new asset type
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        check(&value).map_err(|e| DomainError::InvalidAssetType(e.into()))?;
        Ok(Self(value))
    }

    /// Get inner value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AssetType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AssetType> for String {
    fn from(value: AssetType) -> Self {
        value.0
    }
}
