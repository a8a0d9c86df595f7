use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use serde::Deserialize;

use crate::project::{DATABASE_FILE, INPUT_DIR, MANUAL_DIR};

/// Output directory of the triangulated model, relative to the frame project.
pub const DISTORTED_SPARSE_DIR: &str = "distorted/sparse";

/// Output directory of the undistorted model, relative to the frame project.
pub const SPARSE_DIR: &str = "sparse";

/// An error type for the reconstruction pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The pipeline binary could not be started.
    #[error("failed to launch `{command}`. {source}")]
    Launch {
        /// The command line
        command: String,
        /// The launch error
        #[source]
        source: std::io::Error,
    },

    /// A pipeline step exited with a failure status.
    #[error("`{command}` failed with {status}")]
    CommandFailed {
        /// The command line
        command: String,
        /// The exit status
        status: ExitStatus,
    },

    /// Failed to prepare or rearrange the pipeline directories.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Settings of the COLMAP command line pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// The COLMAP executable, looked up in `PATH` when relative.
    pub colmap_binary: PathBuf,
    /// Largest image side used for feature extraction.
    pub max_image_size: u32,
    /// Function tolerance of the global bundle adjustment.
    pub ba_global_function_tolerance: f64,
    /// Undistort the images into the frame project after triangulation.
    pub undistort: bool,
    /// Delete the mirrored input images once undistorted.
    pub remove_input_images: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            colmap_binary: PathBuf::from("colmap"),
            max_image_size: 6000,
            ba_global_function_tolerance: 1e-6,
            undistort: true,
            remove_input_images: false,
        }
    }
}

/// An external reconstruction run over one frame project.
pub trait ReconstructionPipeline {
    /// Reconstruct the frame project in `project_dir`.
    fn reconstruct(&self, project_dir: &Path) -> Result<(), PipelineError>;
}

/// One invocation of the COLMAP binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    /// COLMAP subcommand, e.g. `feature_extractor`.
    pub subcommand: &'static str,
    /// Arguments following the subcommand.
    pub args: Vec<OsString>,
}

impl PipelineStep {
    fn new(subcommand: &'static str) -> Self {
        Self {
            subcommand,
            args: Vec::new(),
        }
    }

    fn arg(mut self, flag: &str, value: impl Into<OsString>) -> Self {
        self.args.push(flag.into());
        self.args.push(value.into());
        self
    }
}

/// Runs the COLMAP command line tools over a frame project.
///
/// The steps are feature extraction, exhaustive matching, triangulation from the
/// prior poses in `manual/`, and optionally undistortion into the frame project.
#[derive(Debug, Clone, Default)]
pub struct ColmapCli {
    config: PipelineConfig,
}

impl ColmapCli {
    /// Create a runner from its settings.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The invocations for one frame project, in execution order.
    pub fn steps(&self, project_dir: &Path) -> Vec<PipelineStep> {
        let database = project_dir.join(DATABASE_FILE);
        let images = project_dir.join(INPUT_DIR);
        let distorted = project_dir.join(DISTORTED_SPARSE_DIR);

        let mut steps = vec![
            PipelineStep::new("feature_extractor")
                .arg("--database_path", &database)
                .arg("--image_path", &images)
                .arg(
                    "--SiftExtraction.max_image_size",
                    self.config.max_image_size.to_string(),
                ),
            PipelineStep::new("exhaustive_matcher").arg("--database_path", &database),
            PipelineStep::new("point_triangulator")
                .arg("--database_path", &database)
                .arg("--image_path", &images)
                .arg("--input_path", project_dir.join(MANUAL_DIR))
                .arg("--output_path", &distorted)
                .arg(
                    "--Mapper.ba_global_function_tolerance",
                    self.config.ba_global_function_tolerance.to_string(),
                ),
        ];

        if self.config.undistort {
            steps.push(
                PipelineStep::new("image_undistorter")
                    .arg("--image_path", &images)
                    .arg("--input_path", &distorted)
                    .arg("--output_path", project_dir)
                    .arg("--output_type", "COLMAP"),
            );
        }
        steps
    }

    fn command_line(&self, step: &PipelineStep) -> String {
        let mut line = format!("{} {}", self.config.colmap_binary.display(), step.subcommand);
        for arg in &step.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn run_step(&self, step: &PipelineStep) -> Result<(), PipelineError> {
        let command = self.command_line(step);
        log::debug!("Running {command}");

        let status = Command::new(&self.config.colmap_binary)
            .arg(step.subcommand)
            .args(&step.args)
            .status()
            .map_err(|source| PipelineError::Launch {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(PipelineError::CommandFailed { command, status });
        }
        Ok(())
    }
}

impl ReconstructionPipeline for ColmapCli {
    fn reconstruct(&self, project_dir: &Path) -> Result<(), PipelineError> {
        std::fs::create_dir_all(project_dir.join(DISTORTED_SPARSE_DIR))?;

        for step in self.steps(project_dir) {
            self.run_step(&step)?;
        }

        if self.config.undistort {
            move_sparse_into_model_dir(&project_dir.join(SPARSE_DIR))?;
            if self.config.remove_input_images {
                std::fs::remove_dir_all(project_dir.join(INPUT_DIR))?;
            }
        }
        Ok(())
    }
}

/// Move every entry of `sparse/` into `sparse/0`, the layout of a single model.
///
/// A missing `sparse/` directory is left alone.
pub fn move_sparse_into_model_dir(sparse_dir: &Path) -> Result<(), std::io::Error> {
    if !sparse_dir.is_dir() {
        return Ok(());
    }

    let model_dir = sparse_dir.join("0");
    std::fs::create_dir_all(&model_dir)?;
    for entry in std::fs::read_dir(sparse_dir)? {
        let path = entry?.path();
        if path == model_dir {
            continue;
        }
        if let Some(name) = path.file_name() {
            std::fs::rename(&path, model_dir.join(name))?;
        }
    }
    Ok(())
}
