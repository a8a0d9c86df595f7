use std::path::Path;

use rig2colmap_3d::transforms::DEFAULT_ROTATION_TOLERANCE;
use rig2colmap_io::dataset::FrameNaming;
use rig2colmap_io::source::SourceKind;
use serde::Deserialize;

use crate::error::ConvertError;
use crate::pipeline::PipelineConfig;

/// Default upper bound of frame offsets, the capture length of the reference rig.
pub const DEFAULT_MAX_FRAME: u32 = 300;

/// Configuration of the converter.
///
/// Every field has a default, so a JSON config file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Upper bound of frame offsets, exclusive end frames may equal it.
    pub max_frame: u32,
    /// Naming of the frame images.
    pub naming: FrameNaming,
    /// Pose metadata encoding.
    pub source: SourceKind,
    /// Orthonormality tolerance of camera rotations.
    pub rotation_tolerance: f64,
    /// Abort the batch at the first failing frame.
    pub fail_fast: bool,
    /// Convert frames in parallel.
    pub parallel: bool,
    /// Read every written project back and check its identifiers.
    pub verify: bool,
    /// Copy the frame images into each project.
    pub copy_images: bool,
    /// Run the reconstruction pipeline after converting the range.
    pub run_pipeline: bool,
    /// Reconstruction pipeline settings.
    pub pipeline: PipelineConfig,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            max_frame: DEFAULT_MAX_FRAME,
            naming: FrameNaming::default(),
            source: SourceKind::Auto,
            rotation_tolerance: DEFAULT_ROTATION_TOLERANCE,
            fail_fast: false,
            parallel: false,
            verify: true,
            copy_images: true,
            run_pipeline: true,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ConvertConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConvertError::PathNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(rig2colmap_io::error::IoError::from)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_config() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "max_frame": 600,
                "source": "meta",
                "naming": { "extension": "png" },
                "pipeline": { "colmap_binary": "/opt/colmap/bin/colmap" }
            }"#,
        )?;

        let config = ConvertConfig::from_json_file(&path)?;
        assert_eq!(config.max_frame, 600);
        assert_eq!(config.source, SourceKind::Meta);
        assert_eq!(config.naming.extension, "png");
        assert_eq!(config.naming.zero_pad, 6);
        assert!(config.verify);
        assert_eq!(
            config.pipeline.colmap_binary,
            Path::new("/opt/colmap/bin/colmap")
        );
        assert_eq!(config.pipeline.max_image_size, 6000);
        Ok(())
    }

    #[test]
    fn test_invalid_config() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("config.json");
        std::fs::write(&path, r#"{ "source": "colmap" }"#)?;
        assert!(matches!(
            ConvertConfig::from_json_file(&path),
            Err(ConvertError::Config(_))
        ));
        assert!(matches!(
            ConvertConfig::from_json_file(tmp_dir.path().join("missing.json")),
            Err(ConvertError::PathNotFound(_))
        ));
        Ok(())
    }
}
