use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::IoError;

/// Name of the directory holding one sub-directory per camera.
pub const IMAGES_DIR: &str = "ims";

/// Prefix of the per-frame project directories.
pub const PROJECT_DIR_PREFIX: &str = "colmap_";

/// A camera folder discovered under the images directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFolder {
    /// Folder name, used as the camera name.
    pub name: String,
    /// Full path to the folder.
    pub path: PathBuf,
}

/// How frame images are named on disk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrameNaming {
    /// Zero padding of the frame index, e.g. 6 for `000042.jpg`.
    pub zero_pad: usize,
    /// Image file extension without the dot.
    pub extension: String,
}

impl Default for FrameNaming {
    fn default() -> Self {
        Self {
            zero_pad: 6,
            extension: "jpg".to_string(),
        }
    }
}

impl FrameNaming {
    /// File name of a frame inside a camera folder.
    pub fn frame_file(&self, offset: u32) -> String {
        format!(
            "{offset:0width$}.{ext}",
            width = self.zero_pad,
            ext = self.extension
        )
    }

    /// File name of a camera image inside a frame project.
    pub fn camera_file(&self, camera_name: &str) -> String {
        format!("{camera_name}.{}", self.extension)
    }
}

/// A capture rig dataset rooted at a directory.
///
/// ```text
/// <root>/ims/<camera>/<frame>.jpg
/// <root>/poses_bounds.npy | <root>/train_meta.json + <root>/test_meta.json
/// <root>/colmap_<offset>/   (output)
/// ```
#[derive(Debug, Clone)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    /// Open a dataset, checking that the root directory exists.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, IoError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(IoError::DirectoryDoesNotExist(root));
        }
        Ok(Self { root })
    }

    /// The dataset root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory holding the camera folders.
    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    /// The project directory of a frame offset.
    pub fn project_dir(&self, offset: u32) -> PathBuf {
        self.root.join(format!("{PROJECT_DIR_PREFIX}{offset}"))
    }

    /// List the camera folders sorted lexicographically by name.
    ///
    /// The sort is byte-wise, so `10` comes before `2`.
    pub fn camera_folders(&self) -> Result<Vec<CameraFolder>, IoError> {
        let images_dir = self.images_dir();
        if !images_dir.is_dir() {
            return Err(IoError::DirectoryDoesNotExist(images_dir));
        }

        let mut folders = Vec::new();
        for entry in std::fs::read_dir(&images_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => folders.push(CameraFolder {
                    name,
                    path: entry.path(),
                }),
                Err(name) => log::warn!("Skipping camera folder with non UTF-8 name {name:?}"),
            }
        }

        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }
}
