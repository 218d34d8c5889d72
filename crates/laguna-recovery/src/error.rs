use laguna_assets::AssetError;
use laguna_coords::TransformError;
use laguna_scene::{GeometryError, SceneError};
use thiserror::Error;

/// Everything that can go wrong while rendering a single entity.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Bad or insufficient vertex data.
    #[error("geometry: {0}")]
    Geometry(#[from] GeometryError),

    /// No candidate asset path succeeded.
    #[error("asset resolution: {0}")]
    AssetResolution(#[from] AssetError),

    /// A scene-graph operation failed.
    #[error("scene: {0}")]
    SceneManipulation(#[from] SceneError),

    /// Invalid or out-of-range coordinates.
    #[error("transform: {0}")]
    Transform(#[from] TransformError),
}

impl RenderError {
    /// Short category name used in log fields.
    pub fn category(&self) -> &'static str {
        match self {
            RenderError::Geometry(_) => "geometry",
            RenderError::AssetResolution(_) => "asset",
            RenderError::SceneManipulation(_) => "scene",
            RenderError::Transform(_) => "transform",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions_pick_category() {
        let e: RenderError = GeometryError::TooFewVertices(2).into();
        assert_eq!(e.category(), "geometry");

        let e: RenderError = SceneError::CapacityExceeded { limit: 4 }.into();
        assert_eq!(e.category(), "scene");
        assert!(e.to_string().contains("4 meshes"));

        let e: RenderError = TransformError::InvalidBounds("scale").into();
        assert_eq!(e.category(), "transform");
    }
}
