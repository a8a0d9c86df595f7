mod llff;
mod meta;

pub use llff::*;
pub use meta::*;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use rig2colmap_3d::transforms::Extrinsics;
use serde::Deserialize;

use crate::npy::NpyError;

/// File name of the dense LLFF pose array.
pub const POSES_BOUNDS_FILE: &str = "poses_bounds.npy";

/// File name of the train subset metadata.
pub const TRAIN_META_FILE: &str = "train_meta.json";

/// File name of the test subset metadata.
pub const TEST_META_FILE: &str = "test_meta.json";

/// Error types for pose sources.
#[derive(Debug, thiserror::Error)]
pub enum PoseSourceError {
    /// The metadata document expected for the encoding is absent.
    #[error("Pose metadata not found: {0}")]
    SourceNotFound(PathBuf),

    /// Failed to read the metadata file.
    #[error("Failed to read pose metadata. {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the dense pose array.
    #[error("Failed to parse pose array. {0}")]
    Npy(#[from] NpyError),

    /// Failed to parse a JSON metadata document.
    #[error("Failed to parse pose metadata. {0}")]
    Json(#[from] serde_json::Error),

    /// The metadata has an unexpected layout.
    #[error("Invalid pose metadata: {0}")]
    InvalidLayout(String),

    /// The frame offset is not covered by the metadata.
    #[error("Frame offset {offset} is outside the {frames} frames of {document}")]
    OffsetOutOfRange {
        /// Requested frame offset
        offset: u32,
        /// Number of frames in the document
        frames: usize,
        /// Document name
        document: String,
    },
}

/// Pose and intrinsics of one camera at one frame, as read from metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPose {
    /// Camera identifier declared by the metadata, if any.
    pub camera_id: Option<String>,
    /// Intrinsics matrix `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`.
    pub intrinsics: [[f64; 3]; 3],
    /// Extrinsics in the convention of the source.
    pub extrinsics: Extrinsics,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

impl CameraPose {
    /// Pinhole parameters `(fx, fy, cx, cy)`.
    pub fn pinhole_params(&self) -> [f64; 4] {
        let k = &self.intrinsics;
        [k[0][0], k[1][1], k[0][2], k[1][2]]
    }
}

/// The cameras of one frame, indexed by zero-based metadata camera index.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePoses {
    /// Frame offset.
    pub offset: u32,
    /// Cameras in metadata order.
    pub cameras: Vec<CameraPose>,
}

/// A source of per-frame camera poses.
pub trait PoseSource: Send + Sync {
    /// Short name of the encoding, used in logs.
    fn name(&self) -> &'static str;

    /// Read the cameras of one frame.
    fn read_frame(&self, offset: u32) -> Result<FramePoses, PoseSourceError>;
}

/// Which metadata encoding to read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Prefer train/test metadata, fall back to the dense pose array.
    #[default]
    Auto,
    /// Dense `poses_bounds.npy` array.
    Llff,
    /// `train_meta.json` and `test_meta.json` documents.
    Meta,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(SourceKind::Auto),
            "llff" => Ok(SourceKind::Llff),
            "meta" => Ok(SourceKind::Meta),
            _ => Err(format!("unknown pose source '{s}', expected auto, llff or meta")),
        }
    }
}

/// Open the pose source of a dataset.
///
/// # Arguments
///
/// * `root` - The dataset root directory.
/// * `kind` - The encoding to read. [`SourceKind::Auto`] picks the train/test
///   documents when `train_meta.json` exists and the dense array otherwise.
pub fn open_pose_source(
    root: &Path,
    kind: SourceKind,
) -> Result<Box<dyn PoseSource>, PoseSourceError> {
    let kind = match kind {
        SourceKind::Auto if root.join(TRAIN_META_FILE).exists() => SourceKind::Meta,
        SourceKind::Auto => SourceKind::Llff,
        kind => kind,
    };

    let source: Box<dyn PoseSource> = match kind {
        SourceKind::Meta => Box::new(MetaSource::open(
            root.join(TRAIN_META_FILE),
            root.join(TEST_META_FILE),
        )?),
        _ => Box::new(LlffSource::open(root.join(POSES_BOUNDS_FILE))?),
    };
    log::debug!("Reading poses from {} metadata", source.name());
    Ok(source)
}
