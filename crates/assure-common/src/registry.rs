//! Asset registry - query interface over discovered assets
//!
//! Discovery itself happens elsewhere. Evaluators only need to ask "which
//! assets of type T exist right now", and must never mutate the registry.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::ids::AssetType;
use crate::model::Asset;

/// Registry result type
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// Backing registry could not be reached
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// Snapshot could not be read or parsed
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

/// Read-only asset lookup
///
/// Implementations must return an empty vector for an unknown type, and must
/// return assets in a stable order for an unchanged registry.
pub trait AssetRegistry: Send + Sync {
    /// All currently known assets of the given type
    fn assets_with_type(&self, asset_type: &AssetType) -> RegistryResult<Vec<Arc<Asset>>>;
}

impl<T: AssetRegistry + ?Sized> AssetRegistry for Arc<T> {
    fn assets_with_type(&self, asset_type: &AssetType) -> RegistryResult<Vec<Arc<Asset>>> {
        (**self).assets_with_type(asset_type)
    }
}

type Snapshot = HashMap<AssetType, Vec<Arc<Asset>>>;

/// In-memory registry with atomically swappable snapshots
///
/// Reads are lock-free; `replace` publishes a whole new snapshot so a reader
/// never sees a half-updated asset population.
pub struct InMemoryAssetRegistry {
    snapshot: ArcSwap<Snapshot>,
}

impl InMemoryAssetRegistry {
    /// Create empty registry
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Create with initial assets
    pub fn with_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(index(assets)),
        }
    }

    /// Atomically replace the asset population
    pub fn replace(&self, assets: impl IntoIterator<Item = Asset>) {
        let snapshot = index(assets);
        tracing::debug!("Publishing asset snapshot with {} types", snapshot.len());
        self.snapshot.store(Arc::new(snapshot));
    }

    /// Total number of assets
    pub fn len(&self) -> usize {
        self.snapshot.load().values().map(Vec::len).sum()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse a JSON array of assets
    pub fn from_json_str(json: &str) -> RegistryResult<Self> {
        let assets: Vec<Asset> =
            serde_json::from_str(json).map_err(|e| RegistryError::Snapshot(e.to_string()))?;
        Ok(Self::with_assets(assets))
    }

    /// Load a JSON array of assets from file
    pub fn load(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::Snapshot(format!("{}: {}", path.display(), e)))?;
        let registry = Self::from_json_str(&content)?;
        tracing::info!("Loaded {} assets from {}", registry.len(), path.display());
        Ok(registry)
    }
}

impl Default for InMemoryAssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetRegistry for InMemoryAssetRegistry {
    fn assets_with_type(&self, asset_type: &AssetType) -> RegistryResult<Vec<Arc<Asset>>> {
        Ok(self
            .snapshot
            .load()
            .get(asset_type)
            .cloned()
            .unwrap_or_default())
    }
}

fn index(assets: impl IntoIterator<Item = Asset>) -> Snapshot {
    let mut snapshot: Snapshot = HashMap::new();
    for asset in assets {
        snapshot
            .entry(asset.asset_type.clone())
            .or_default()
            .push(Arc::new(asset));
    }
    snapshot
}
