use std::path::PathBuf;

use rig2colmap_3d::io::colmap::ColmapError;
use rig2colmap_3d::transforms::TransformError;
use rig2colmap_io::error::IoError;
use rig2colmap_io::source::PoseSourceError;

use crate::pipeline::PipelineError;

/// An error type for the converter.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The start frame is not smaller than the end frame.
    #[error("start frame must be smaller than end frame (start {start}, end {end})")]
    InvalidRange {
        /// Requested start frame
        start: i64,
        /// Requested end frame
        end: i64,
    },

    /// The frame range leaves the configured bounds.
    #[error("frame must be in range 0-{max_frame} (start {start}, end {end})")]
    FrameOutOfBounds {
        /// Requested start frame
        start: i64,
        /// Requested end frame
        end: i64,
        /// Configured upper bound
        max_frame: u32,
    },

    /// The dataset directory does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    /// Failed to list or copy dataset files.
    #[error(transparent)]
    Dataset(#[from] IoError),

    /// Failed to read the pose metadata.
    #[error(transparent)]
    Source(#[from] PoseSourceError),

    /// The metadata and the camera folders disagree on the number of cameras.
    #[error("metadata holds {poses} cameras but {folders} camera folders were found")]
    CameraCountMismatch {
        /// Cameras in the metadata
        poses: usize,
        /// Camera folders on disk
        folders: usize,
    },

    /// A camera folder has no pose in the metadata.
    #[error("camera folder {0} has no pose in the metadata")]
    UnknownCamera(String),

    /// Two camera folders or two poses of one frame denote the same camera.
    #[error("camera {0} is declared more than once")]
    DuplicateCamera(String),

    /// A camera rotation is not orthonormal.
    #[error("degenerate rotation for camera {camera}. {source}")]
    DegenerateRotation {
        /// Camera folder name
        camera: String,
        /// Transform error
        #[source]
        source: TransformError,
    },

    /// Failed to write the frame project.
    #[error("failed to write frame project. {0}")]
    WriteFailure(#[from] ColmapError),

    /// A written frame project breaks the identifier invariants.
    #[error("frame project verification failed: {0}")]
    Verification(String),

    /// Failed to parse the configuration file.
    #[error("invalid configuration. {0}")]
    Config(#[from] serde_json::Error),

    /// The reconstruction pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
