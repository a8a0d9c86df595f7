#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use rig2colmap_3d as k3d;

#[doc(inline)]
pub use rig2colmap_io as io;

/// Converter configuration.
pub mod config;

/// Orchestration of the per-frame conversion and reconstruction.
pub mod driver;

/// Error types of the converter.
pub mod error;

/// Camera and image identifier allocation.
pub mod ids;

/// External reconstruction pipeline invocation.
pub mod pipeline;

/// Per-frame COLMAP project records, writers and verification.
pub mod project;

/// Validated frame offset ranges.
pub mod range;

pub use config::ConvertConfig;
pub use driver::{BatchReport, FrameDriver, FrameSummary};
pub use error::ConvertError;
pub use range::FrameRange;
