use std::path::{Path, PathBuf};

use crate::dataset::{CameraFolder, FrameNaming};
use crate::error::IoError;

/// Outcome of mirroring the images of one frame.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    /// Number of copied images.
    pub copied: usize,
    /// Source images that did not exist and were skipped.
    pub skipped: Vec<PathBuf>,
}

/// Copy the images of one frame into `dst_dir`, one file per camera.
///
/// `ims/<camera>/<frame>.<ext>` is copied to `<dst_dir>/<camera>.<ext>`. Missing
/// source images are logged and skipped; the copy does not fail for them.
///
/// # Arguments
///
/// * `cameras` - The camera folders of the dataset.
/// * `offset` - The frame offset.
/// * `naming` - The frame file naming scheme.
/// * `dst_dir` - The destination directory, created if needed.
pub fn mirror_frame_images(
    cameras: &[CameraFolder],
    offset: u32,
    naming: &FrameNaming,
    dst_dir: &Path,
) -> Result<MirrorReport, IoError> {
    std::fs::create_dir_all(dst_dir)?;

    let mut report = MirrorReport::default();
    for camera in cameras {
        let src = camera.path.join(naming.frame_file(offset));
        if !src.is_file() {
            log::warn!("Image {} not found. Skipping.", src.display());
            report.skipped.push(src);
            continue;
        }

        let dst = dst_dir.join(naming.camera_file(&camera.name));
        std::fs::copy(&src, &dst)?;
        report.copied += 1;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    #[test]
    fn test_mirror_skips_missing_images() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let ims = tmp_dir.path().join("ims");
        for camera in ["0", "1", "2"] {
            std::fs::create_dir_all(ims.join(camera))?;
        }
        std::fs::write(ims.join("0").join("000005.jpg"), b"zero")?;
        std::fs::write(ims.join("2").join("000005.jpg"), b"two")?;

        let dataset = Dataset::open(tmp_dir.path())?;
        let cameras = dataset.camera_folders()?;
        let dst_dir = dataset.project_dir(5).join("input");

        let report = mirror_frame_images(&cameras, 5, &FrameNaming::default(), &dst_dir)?;
        assert_eq!(report.copied, 2);
        assert_eq!(report.skipped, vec![ims.join("1").join("000005.jpg")]);
        assert_eq!(std::fs::read(dst_dir.join("2.jpg"))?, b"two");
        assert!(!dst_dir.join("1.jpg").exists());
        Ok(())
    }
}
