//! Model data and the loaders that produce it.

use std::path::{Path, PathBuf};

use glam::Vec3;
use laguna_scene::{Color, Geometry, Material};
use serde::{Deserialize, Serialize};

use crate::error::AssetError;

/// A loaded (or synthesized) model ready to be instanced into the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub geometry: Geometry,
    pub material: Material,
    /// Synthesized because no real asset could be loaded.
    pub is_fallback_model: bool,
    /// File the model came from, relative to the loader root.
    pub source: Option<PathBuf>,
}

/// On-disk model document.
///
/// ```ron
/// (
///     positions: [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)],
///     indices: [0, 1, 2],
///     color: Some((r: 0.8, g: 0.4, b: 0.2)),
///     texture: None,
/// )
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ModelFile {
    pub positions: Vec<(f32, f32, f32)>,
    pub indices: Vec<u32>,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default)]
    pub texture: Option<String>,
}

impl ModelFile {
    fn into_model(self, source: PathBuf) -> Result<Model, AssetError> {
        let geometry = Geometry::new(
            self.positions
                .into_iter()
                .map(|(x, y, z)| Vec3::new(x, y, z))
                .collect(),
            self.indices,
        );
        geometry
            .validate()
            .map_err(|source_err| AssetError::InvalidModel {
                path: source.clone(),
                source: source_err,
            })?;

        let mut material = Material::solid(self.color.unwrap_or(Color::GRAY));
        material.texture = self.texture;

        Ok(Model {
            geometry,
            material,
            is_fallback_model: false,
            source: Some(source),
        })
    }
}

/// Source of model data addressed by relative path.
pub trait ModelLoader {
    /// Load the model at `path`, relative to the loader's root.
    fn load(&self, path: &Path) -> Result<Model, AssetError>;
}

/// Reads [`ModelFile`] RON documents from a root directory.
pub struct RonModelLoader {
    root: PathBuf,
}

impl RonModelLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ModelLoader for RonModelLoader {
    fn load(&self, path: &Path) -> Result<Model, AssetError> {
        let full = self.root.join(path);
        if !full.is_file() {
            return Err(AssetError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(&full).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ModelFile = ron::from_str(&contents).map_err(|source| AssetError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        file.into_model(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = r#"(
        positions: [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0)],
        indices: [0, 1, 2],
        color: Some((r: 0.8, g: 0.4, b: 0.2)),
        texture: Some("brick.png"),
    )"#;

    #[test]
    fn test_loads_ron_model() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("house")).unwrap();
        std::fs::write(dir.path().join("house/small.ron"), TRIANGLE).unwrap();

        let loader = RonModelLoader::new(dir.path());
        let model = loader.load(Path::new("house/small.ron")).unwrap();
        assert_eq!(model.geometry.vertex_count(), 3);
        assert_eq!(model.material.color, Color::rgb(0.8, 0.4, 0.2));
        assert_eq!(model.material.texture.as_deref(), Some("brick.png"));
        assert!(!model.is_fallback_model);
        assert_eq!(model.source.as_deref(), Some(Path::new("house/small.ron")));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = RonModelLoader::new(dir.path());
        assert!(matches!(
            loader.load(Path::new("nope.ron")),
            Err(AssetError::NotFound(_))
        ));
    }

    #[test]
    fn test_bad_ron_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.ron"), "(positions: [").unwrap();
        let loader = RonModelLoader::new(dir.path());
        assert!(matches!(
            loader.load(Path::new("broken.ron")),
            Err(AssetError::Parse { .. })
        ));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bad.ron"),
            "(positions: [(0.0, 0.0, 0.0)], indices: [0, 1, 2])",
        )
        .unwrap();
        let loader = RonModelLoader::new(dir.path());
        assert!(matches!(
            loader.load(Path::new("bad.ron")),
            Err(AssetError::InvalidModel { .. })
        ));
    }
}
