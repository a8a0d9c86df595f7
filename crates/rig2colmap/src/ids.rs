//! Assignment of the 1-based COLMAP camera and image identifiers.
//!
//! Identifiers follow the lexicographic order of the camera folders on disk, never
//! the order of the metadata. When the metadata declares camera identifiers the
//! poses are joined to the folders by name. Otherwise they are joined by position,
//! which assumes the metadata rows were produced in the same order as the sorted
//! folders; that assumption cannot be checked beyond the camera count.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use rig2colmap_io::dataset::CameraFolder;
use rig2colmap_io::source::{CameraId, CameraPose, FramePoses};

use crate::error::ConvertError;

/// A camera with its allocated identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedCamera {
    /// Camera and image identifier, `disk index + 1`.
    pub id: u32,
    /// The camera folder.
    pub folder: CameraFolder,
    /// The pose read from the metadata.
    pub pose: CameraPose,
}

/// How poses are matched to camera folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraJoin {
    /// Metadata index `i` belongs to folder `i`.
    ByPosition,
    /// The declared camera identifier equals the folder name.
    ByName,
}

impl CameraJoin {
    /// Pick the join for a frame: by name only if every pose declares an identifier.
    pub fn for_poses(poses: &FramePoses) -> Self {
        if !poses.cameras.is_empty() && poses.cameras.iter().all(|c| c.camera_id.is_some()) {
            CameraJoin::ByName
        } else {
            CameraJoin::ByPosition
        }
    }
}

/// Normalize a camera name so `"007"` and `"7"` denote the same camera.
///
/// Uses the same normalization as the metadata merge.
fn join_key(name: &str) -> CameraId {
    CameraId::parse(name)
}

/// Allocate the identifiers `1..=N` for the cameras of one frame.
///
/// # Arguments
///
/// * `folders` - The camera folders, sorted lexicographically.
/// * `poses` - The poses of the frame.
///
/// # Returns
///
/// One entry per folder, in folder order, with identifier `i + 1`.
pub fn allocate_identifiers(
    folders: &[CameraFolder],
    poses: FramePoses,
) -> Result<Vec<AllocatedCamera>, ConvertError> {
    if poses.cameras.len() != folders.len() {
        return Err(ConvertError::CameraCountMismatch {
            poses: poses.cameras.len(),
            folders: folders.len(),
        });
    }

    let join = CameraJoin::for_poses(&poses);
    log::debug!("Joining {} cameras {join:?}", folders.len());

    let assigned: Vec<CameraPose> = match join {
        CameraJoin::ByPosition => poses.cameras,
        CameraJoin::ByName => {
            let mut seen = HashSet::new();
            if let Some(folder) = folders.iter().find(|f| !seen.insert(join_key(&f.name))) {
                return Err(ConvertError::DuplicateCamera(folder.name.clone()));
            }

            let mut by_name = HashMap::new();
            for pose in poses.cameras {
                let key = join_key(pose.camera_id.as_deref().unwrap_or_default());
                match by_name.entry(key) {
                    Entry::Occupied(entry) => {
                        return Err(ConvertError::DuplicateCamera(entry.key().to_string()))
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(pose);
                    }
                }
            }
            folders
                .iter()
                .map(|folder| {
                    by_name
                        .remove(&join_key(&folder.name))
                        .ok_or_else(|| ConvertError::UnknownCamera(folder.name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    folders
        .iter()
        .zip(assigned)
        .enumerate()
        .map(|(i, (folder, pose))| {
            let id = u32::try_from(i + 1).map_err(|_| ConvertError::CameraCountMismatch {
                poses: folders.len(),
                folders: folders.len(),
            })?;
            Ok(AllocatedCamera {
                id,
                folder: folder.clone(),
                pose,
            })
        })
        .collect()
}
