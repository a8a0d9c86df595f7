use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rig2colmap_io::dataset::{CameraFolder, Dataset};
use rig2colmap_io::images::mirror_frame_images;
use rig2colmap_io::source::{open_pose_source, PoseSource};

use crate::config::ConvertConfig;
use crate::error::ConvertError;
use crate::ids::allocate_identifiers;
use crate::pipeline::ReconstructionPipeline;
use crate::project::{verify_project, FrameProject, INPUT_DIR};
use crate::range::FrameRange;

/// Outcome of converting one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    /// Frame offset.
    pub offset: u32,
    /// The frame project directory.
    pub project_dir: PathBuf,
    /// Number of camera and image records written.
    pub records: usize,
    /// Number of images copied into the project.
    pub copied_images: usize,
    /// Source images that were missing.
    pub skipped_images: Vec<PathBuf>,
}

/// Outcome of a frame range.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Converted frames in offset order.
    pub converted: Vec<FrameSummary>,
    /// Frames that failed to convert or reconstruct, with their error.
    pub failed: Vec<(u32, ConvertError)>,
    /// Offsets reconstructed by the pipeline.
    pub reconstructed: Vec<u32>,
}

impl BatchReport {
    /// Whether every frame succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Converts the frames of a dataset into COLMAP projects.
pub struct FrameDriver {
    dataset: Dataset,
    cameras: Vec<CameraFolder>,
    source: Box<dyn PoseSource>,
    config: ConvertConfig,
}

impl FrameDriver {
    /// Open a dataset and its pose metadata.
    ///
    /// Nothing is written to disk.
    ///
    /// # Arguments
    ///
    /// * `root` - The dataset root holding `ims/` and the pose metadata.
    /// * `config` - The converter configuration.
    pub fn new(root: impl AsRef<Path>, config: ConvertConfig) -> Result<Self, ConvertError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ConvertError::PathNotFound(root.to_path_buf()));
        }

        let dataset = Dataset::open(root)?;
        let source = open_pose_source(dataset.root(), config.source)?;
        Self::with_source(dataset, source, config)
    }

    /// Create a driver reading poses from the given source.
    pub fn with_source(
        dataset: Dataset,
        source: Box<dyn PoseSource>,
        config: ConvertConfig,
    ) -> Result<Self, ConvertError> {
        let cameras = dataset.camera_folders()?;
        log::info!(
            "Found {} cameras in {}, reading {} poses",
            cameras.len(),
            dataset.images_dir().display(),
            source.name()
        );
        Ok(Self {
            dataset,
            cameras,
            source,
            config,
        })
    }

    /// The converter configuration.
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// The camera folders, in identifier order.
    pub fn cameras(&self) -> &[CameraFolder] {
        &self.cameras
    }

    /// Convert one frame into its project directory.
    ///
    /// The images are mirrored first. Missing images are skipped and the
    /// records are written regardless.
    pub fn convert_frame(&self, offset: u32) -> Result<FrameSummary, ConvertError> {
        let project_dir = self.dataset.project_dir(offset);
        let naming = &self.config.naming;

        let (copied_images, skipped_images) = if self.config.copy_images {
            let report =
                mirror_frame_images(&self.cameras, offset, naming, &project_dir.join(INPUT_DIR))?;
            (report.copied, report.skipped)
        } else {
            (0, Vec::new())
        };

        let poses = self.source.read_frame(offset)?;
        let cameras = allocate_identifiers(&self.cameras, poses)?;
        let project =
            FrameProject::from_cameras(offset, &cameras, naming, self.config.rotation_tolerance)?;
        project.write(&project_dir)?;

        let records = if self.config.verify {
            verify_project(&project_dir)?
        } else {
            project.records().len()
        };

        log::info!(
            "Frame {offset}: wrote {records} cameras to {}",
            project_dir.display()
        );
        Ok(FrameSummary {
            offset,
            project_dir,
            records,
            copied_images,
            skipped_images,
        })
    }

    /// Convert every frame of a range.
    ///
    /// Failing frames are collected in the report, unless `fail_fast` is set in
    /// which case the first error is returned.
    pub fn convert_range(&self, range: FrameRange) -> Result<BatchReport, ConvertError> {
        if self.config.fail_fast {
            let converted = if self.config.parallel {
                range
                    .iter()
                    .into_par_iter()
                    .map(|offset| self.convert_frame(offset))
                    .collect::<Result<Vec<_>, _>>()?
            } else {
                range
                    .iter()
                    .map(|offset| self.convert_frame(offset))
                    .collect::<Result<Vec<_>, _>>()?
            };
            return Ok(BatchReport {
                converted,
                ..Default::default()
            });
        }

        let results = if self.config.parallel {
            range
                .iter()
                .into_par_iter()
                .map(|offset| (offset, self.convert_frame(offset)))
                .collect::<Vec<_>>()
        } else {
            range
                .iter()
                .map(|offset| (offset, self.convert_frame(offset)))
                .collect::<Vec<_>>()
        };

        let mut report = BatchReport::default();
        for (offset, result) in results {
            match result {
                Ok(summary) => report.converted.push(summary),
                Err(err) => {
                    log::warn!("Frame {offset} failed: {err}");
                    report.failed.push((offset, err));
                }
            }
        }
        Ok(report)
    }

    /// Convert a range and then reconstruct every converted frame.
    ///
    /// All conversions finish before the first pipeline run. Pipeline runs are
    /// sequential.
    ///
    /// # Arguments
    ///
    /// * `range` - The frames to process.
    /// * `pipeline` - The reconstruction pipeline, or `None` to only convert.
    pub fn run(
        &self,
        range: FrameRange,
        pipeline: Option<&dyn ReconstructionPipeline>,
    ) -> Result<BatchReport, ConvertError> {
        log::info!(
            "Converting frames {}..{} of {}",
            range.start(),
            range.end(),
            self.dataset.root().display()
        );
        let mut report = self.convert_range(range)?;

        let Some(pipeline) = pipeline else {
            return Ok(report);
        };

        log::info!("Reconstructing {} frames", report.converted.len());
        for summary in &report.converted {
            match pipeline.reconstruct(&summary.project_dir) {
                Ok(()) => report.reconstructed.push(summary.offset),
                Err(err) if self.config.fail_fast => return Err(err.into()),
                Err(err) => {
                    log::warn!("Reconstruction of frame {} failed: {err}", summary.offset);
                    report.failed.push((summary.offset, err.into()));
                }
            }
        }
        Ok(report)
    }
}
