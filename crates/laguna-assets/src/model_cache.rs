//! Per-`(type, variant)` model resolution with fallback synthesis.

use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;
use laguna_scene::{Color, Geometry, Material};
use rustc_hash::{FxHashMap, FxHasher};

use crate::error::AssetError;
use crate::model::{Model, ModelLoader};

/// Variant used when the caller has none.
const DEFAULT_VARIANT: &str = "default";

/// Settings for [`ModelCache`].
#[derive(Clone, Debug, PartialEq)]
pub struct ModelCacheConfig {
    /// Lifetime of a cached resolution, fallbacks included.
    pub ttl: Duration,
    /// Models above this vertex count are simplified on load.
    pub max_vertices: usize,
    /// Weld distance used by the first simplification step.
    pub merge_tolerance: f32,
}

impl Default for ModelCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_vertices: 5000,
            merge_tolerance: 0.01,
        }
    }
}

/// Where a cached model came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAsset {
    /// Candidate path that succeeded, `None` for synthesized placeholders.
    pub path: Option<PathBuf>,
    pub is_fallback: bool,
}

/// Result of [`ModelCache::resolve`].
#[derive(Clone, Debug)]
pub struct Resolution {
    pub asset: ResolvedAsset,
    pub model: Arc<Model>,
}

struct CachedModel {
    resolution: Resolution,
    expires_at: Instant,
}

/// Ordered candidate paths for a `(type, variant)` pair: type and variant
/// specific, type default, legacy flat path, generic fallback.
pub fn candidate_paths(entity_type: &str, variant: Option<&str>) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(4);
    if let Some(variant) = variant.filter(|v| *v != DEFAULT_VARIANT) {
        paths.push(PathBuf::from(entity_type).join(format!("{variant}.ron")));
    }
    paths.push(PathBuf::from(entity_type).join("default.ron"));
    paths.push(PathBuf::from(format!("{entity_type}.ron")));
    paths.push(PathBuf::from("default.ron"));
    paths
}

/// Stable placeholder color derived from the type name.
pub fn placeholder_color(entity_type: &str) -> Color {
    let mut hasher = FxHasher::default();
    entity_type.hash(&mut hasher);
    let hue = (hasher.finish() % 360) as f32 / 360.0;
    Color::from_hsl(hue, 0.6, 0.5)
}

/// Cache of resolved models keyed by `(entity type, variant)`.
pub struct ModelCache {
    loader: Box<dyn ModelLoader>,
    config: ModelCacheConfig,
    entries: FxHashMap<(String, String), CachedModel>,
    probes: usize,
}

impl ModelCache {
    pub fn new(loader: Box<dyn ModelLoader>, config: ModelCacheConfig) -> Self {
        Self {
            loader,
            config,
            entries: FxHashMap::default(),
            probes: 0,
        }
    }

    /// Resolve a model, probing candidates on a miss and synthesizing a
    /// placeholder if none loads. Never fails.
    pub fn resolve(&mut self, entity_type: &str, variant: Option<&str>, now: Instant) -> Resolution {
        let key = (
            entity_type.to_string(),
            variant.unwrap_or(DEFAULT_VARIANT).to_string(),
        );
        if let Some(cached) = self.entries.get(&key)
            && cached.expires_at > now
        {
            return cached.resolution.clone();
        }

        let resolution = match self.probe(entity_type, variant) {
            Ok((path, model)) => Resolution {
                asset: ResolvedAsset {
                    path: Some(path),
                    is_fallback: false,
                },
                model: Arc::new(model),
            },
            Err(error) => {
                tracing::warn!(kind = entity_type, error = %error, "Using placeholder model");
                Resolution {
                    asset: ResolvedAsset {
                        path: None,
                        is_fallback: true,
                    },
                    model: Arc::new(placeholder_model(entity_type)),
                }
            }
        };

        self.entries.insert(
            key,
            CachedModel {
                resolution: resolution.clone(),
                expires_at: now + self.config.ttl,
            },
        );
        resolution
    }

    /// Try every candidate path in order, uncached. Each candidate counts as
    /// one probe.
    pub fn probe(
        &mut self,
        entity_type: &str,
        variant: Option<&str>,
    ) -> Result<(PathBuf, Model), AssetError> {
        let candidates = candidate_paths(entity_type, variant);
        let attempts = candidates.len();
        for path in candidates {
            self.probes += 1;
            match self.loader.load(&path) {
                Ok(model) => {
                    if let Err(source) = model.geometry.validate() {
                        let error = AssetError::InvalidModel { path, source };
                        tracing::debug!(kind = entity_type, error = %error, "Candidate rejected");
                        continue;
                    }
                    tracing::debug!(kind = entity_type, path = %path.display(), "Resolved model");
                    return Ok((path, self.prepare(model)));
                }
                Err(AssetError::NotFound(_)) => {}
                Err(error) => {
                    tracing::debug!(kind = entity_type, error = %error, "Candidate rejected");
                }
            }
        }
        Err(AssetError::NoCandidate {
            entity_type: entity_type.to_string(),
            variant: variant.unwrap_or(DEFAULT_VARIANT).to_string(),
            attempts,
        })
    }

    /// Simplify dense models and flatten their materials.
    fn prepare(&self, mut model: Model) -> Model {
        let before = model.geometry.vertex_count();
        if before > self.config.max_vertices {
            model.geometry = model.geometry.merge_vertices(self.config.merge_tolerance);
            if model.geometry.vertex_count() > self.config.max_vertices
                && let Some(bbox) = model.geometry.bounding_box()
            {
                model.geometry = bbox;
            }
            tracing::debug!(
                before,
                after = model.geometry.vertex_count(),
                "Simplified dense model"
            );
        }
        model.material = model.material.flattened();
        model
    }

    /// Forget one `(type, variant)` resolution.
    pub fn invalidate(&mut self, entity_type: &str, variant: Option<&str>) -> bool {
        let key = (
            entity_type.to_string(),
            variant.unwrap_or(DEFAULT_VARIANT).to_string(),
        );
        self.entries.remove(&key).is_some()
    }

    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, cached| cached.expires_at > now);
        before - self.entries.len()
    }

    /// Total candidate loads attempted since construction.
    pub fn probe_count(&self) -> usize {
        self.probes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn placeholder_model(entity_type: &str) -> Model {
    Model {
        geometry: Geometry::cuboid(Vec3::ONE).unwrap_or_default(),
        material: Material::solid(placeholder_color(entity_type)),
        is_fallback_model: true,
        source: None,
    }
}
