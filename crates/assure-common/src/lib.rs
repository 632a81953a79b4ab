//! Assure Common - Shared types for control assurance
//!
//! This crate provides the vocabulary every other assurance crate speaks:
//! - Value objects for control, rule and asset identifiers
//! - The rule / asset / evaluation-result data model
//! - The `AssetRegistry` query interface and an in-memory snapshot registry
//! - Error handling
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     ASSET REGISTRY                           │
//! │   assets_with_type(T) ──► [Asset { evaluation_results }]     │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 │ read-only
//!                     ┌───────────▼───────────┐
//!                     │   Control evaluation  │
//!                     │    (assure-control)   │
//!                     └───────────────────────┘
//! ```
//!
//! Rule conditions are evaluated elsewhere; by the time an asset shows up in a
//! registry it already carries the outcome of every rule applied to it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod ids;
pub mod model;
pub mod registry;

pub use error::*;
pub use ids::*;
pub use model::*;
pub use registry::{AssetRegistry, InMemoryAssetRegistry, RegistryError, RegistryResult};
