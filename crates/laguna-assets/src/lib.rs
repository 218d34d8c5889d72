//! Asset and record resolution for the Laguna renderer.
//!
//! Two caches with different semantics live here:
//!
//! - [`ModelCache`] resolves `(entity type, variant)` pairs to loaded
//!   [`Model`]s by probing an ordered list of candidate paths. The first
//!   success is cached; when every candidate fails a deterministic
//!   placeholder is synthesized and cached as well, so a permanently
//!   missing asset costs one probe sequence per TTL window.
//! - [`RecordCache`] is a per-entity TTL cache for externally fetched
//!   detail records. A hit short-circuits the fetch entirely.
//!
//! [`AssetResolutionCache`] bundles both behind one owner.

mod error;
mod model;
mod model_cache;
mod record_cache;

pub use error::AssetError;
pub use model::{Model, ModelFile, ModelLoader, RonModelLoader};
pub use model_cache::{
    ModelCache, ModelCacheConfig, Resolution, ResolvedAsset, candidate_paths, placeholder_color,
};
pub use record_cache::{RecordCache, RecordStats};

use std::time::Duration;

/// Settings for both caches.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetCacheConfig {
    pub model: ModelCacheConfig,
    pub record_ttl: Duration,
}

impl Default for AssetCacheConfig {
    fn default() -> Self {
        Self {
            model: ModelCacheConfig::default(),
            record_ttl: Duration::from_secs(300),
        }
    }
}

/// Model cache plus record cache, owned together by the entity loader.
pub struct AssetResolutionCache<V> {
    models: ModelCache,
    records: RecordCache<V>,
}

impl<V: Clone> AssetResolutionCache<V> {
    pub fn new(loader: Box<dyn ModelLoader>, config: AssetCacheConfig) -> Self {
        Self {
            models: ModelCache::new(loader, config.model),
            records: RecordCache::new(config.record_ttl),
        }
    }

    pub fn models(&self) -> &ModelCache {
        &self.models
    }

    pub fn models_mut(&mut self) -> &mut ModelCache {
        &mut self.models
    }

    pub fn records(&self) -> &RecordCache<V> {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut RecordCache<V> {
        &mut self.records
    }

    /// Drop expired entries from both caches. Returns how many were removed.
    pub fn purge_expired(&mut self, now: std::time::Instant) -> usize {
        self.models.purge_expired(now) + self.records.purge_expired(now)
    }
}
