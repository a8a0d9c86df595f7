use argh::FromArgs;
use std::path::PathBuf;
use std::process::ExitCode;

use rig2colmap::io::source::SourceKind;
use rig2colmap::pipeline::{ColmapCli, ReconstructionPipeline};
use rig2colmap::{BatchReport, ConvertConfig, FrameDriver, FrameRange};

#[derive(FromArgs)]
/// Convert a multi-camera capture rig dataset into per-frame COLMAP projects
struct Args {
    /// path to the dataset holding ims/ and the pose metadata
    #[argh(option)]
    folder_path: PathBuf,

    /// first frame to convert
    #[argh(option, default = "0")]
    start_frame: i64,

    /// frame after the last one to convert
    #[argh(option, default = "150")]
    end_frame: i64,

    /// JSON configuration file, overridden by the flags below
    #[argh(option)]
    config: Option<PathBuf>,

    /// pose metadata to read: auto, llff or meta
    #[argh(option)]
    source: Option<SourceKind>,

    /// upper bound of the frame offsets
    #[argh(option)]
    max_frame: Option<u32>,

    /// path to the COLMAP executable
    #[argh(option)]
    colmap_binary: Option<PathBuf>,

    /// only write the COLMAP inputs, do not run COLMAP
    #[argh(switch)]
    skip_colmap: bool,

    /// convert frames in parallel
    #[argh(switch)]
    parallel: bool,

    /// stop at the first failing frame
    #[argh(switch)]
    fail_fast: bool,
}

fn load_config(args: &Args) -> Result<ConvertConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ConvertConfig::from_json_file(path)?,
        None => ConvertConfig::default(),
    };

    if let Some(source) = args.source {
        config.source = source;
    }
    if let Some(max_frame) = args.max_frame {
        config.max_frame = max_frame;
    }
    if let Some(colmap_binary) = &args.colmap_binary {
        config.pipeline.colmap_binary = colmap_binary.clone();
    }
    config.run_pipeline &= !args.skip_colmap;
    config.parallel |= args.parallel;
    config.fail_fast |= args.fail_fast;
    Ok(config)
}

fn run(args: Args) -> Result<BatchReport, Box<dyn std::error::Error>> {
    let config = load_config(&args)?;

    // validate everything before the first project directory is created
    let range = FrameRange::new(args.start_frame, args.end_frame, config.max_frame)?;
    let driver = FrameDriver::new(&args.folder_path, config)?;

    let colmap = ColmapCli::new(driver.config().pipeline.clone());
    let pipeline = driver
        .config()
        .run_pipeline
        .then_some(&colmap as &dyn ReconstructionPipeline);

    Ok(driver.run(range, pipeline)?)
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Args = argh::from_env();

    match run(args) {
        Ok(report) if report.is_success() => {
            log::info!(
                "Converted {} frames, reconstructed {}",
                report.converted.len(),
                report.reconstructed.len()
            );
            ExitCode::SUCCESS
        }
        Ok(report) => {
            for (offset, err) in &report.failed {
                log::error!("Frame {offset}: {err}");
            }
            eprintln!("{} frames failed", report.failed.len());
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
