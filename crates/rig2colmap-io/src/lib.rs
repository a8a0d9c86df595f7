#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for dataset I/O operations.
pub mod error;

/// Dataset layout: camera folders, frame file names and project directories.
pub mod dataset;

/// Copy per-frame camera images into a frame project.
pub mod images;

/// Minimal reader and writer for NumPy `.npy` arrays.
pub mod npy;

/// Camera pose metadata sources.
///
/// See [`source::open_pose_source`] for automatic encoding detection.
pub mod source;
