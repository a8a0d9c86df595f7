use std::path::Path;

use rig2colmap_3d::transforms::Extrinsics;

use super::{CameraPose, FramePoses, PoseSource, PoseSourceError};
use crate::npy::{read_npy, NpyArray};

/// Number of pose values per camera: a row-major 3x5 block.
const LLFF_POSE_LEN: usize = 15;

/// Poses from a dense LLFF `poses_bounds.npy` array.
///
/// Every row holds a row-major 3x5 block `[down, right, backwards, center | hwf]`
/// followed by the near/far bounds. The array covers every frame of the capture,
/// so all offsets share the same cameras. The row order is the camera order; it
/// carries no camera identifiers and is joined to the camera folders by position.
pub struct LlffSource {
    cameras: Vec<CameraPose>,
}

impl LlffSource {
    /// Load the pose array.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PoseSourceError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PoseSourceError::SourceNotFound(path.to_path_buf()));
        }
        Self::from_array(&read_npy(path)?)
    }

    /// Build the source from an already loaded array of shape `(N, 15+)`.
    pub fn from_array(array: &NpyArray) -> Result<Self, PoseSourceError> {
        match array.shape() {
            [_, cols] if *cols >= LLFF_POSE_LEN => {}
            shape => {
                return Err(PoseSourceError::InvalidLayout(format!(
                    "poses array of shape {shape:?}, expected (N, 17)"
                )))
            }
        }

        let cameras = array
            .rows()
            .map(|row| {
                let mut pose = [[0.0; 5]; 3];
                for (i, values) in row[..LLFF_POSE_LEN].chunks_exact(5).enumerate() {
                    pose[i].copy_from_slice(values);
                }
                llff_to_camera_pose(&pose)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { cameras })
    }
}

impl PoseSource for LlffSource {
    fn name(&self) -> &'static str {
        "llff"
    }

    fn read_frame(&self, offset: u32) -> Result<FramePoses, PoseSourceError> {
        Ok(FramePoses {
            offset,
            cameras: self.cameras.clone(),
        })
    }
}

/// Convert one LLFF 3x5 block into a camera pose.
///
/// The LLFF axes `[down, right, backwards]` become `[right, down, forward]`, so the
/// result is an OpenCV camera-to-world pose. The principal point is the image
/// center rounded down.
fn llff_to_camera_pose(pose: &[[f64; 5]; 3]) -> Result<CameraPose, PoseSourceError> {
    let mut c2w = [[0.0, 0.0, 0.0, 1.0]; 4];
    for (dst, src) in c2w.iter_mut().zip(pose) {
        *dst = [src[1], src[0], -src[2], src[3]];
    }

    let (height, width, focal) = (pose[0][4], pose[1][4], pose[2][4]);
    if !(height >= 1.0 && width >= 1.0 && focal > 0.0 && focal.is_finite()) {
        return Err(PoseSourceError::InvalidLayout(format!(
            "invalid hwf ({height}, {width}, {focal})"
        )));
    }

    Ok(CameraPose {
        camera_id: None,
        intrinsics: [
            [focal, 0.0, (width / 2.0).floor()],
            [0.0, focal, (height / 2.0).floor()],
            [0.0, 0.0, 1.0],
        ],
        extrinsics: Extrinsics::CameraToWorld(c2w),
        width: width.round() as u32,
        height: height.round() as u32,
    })
}
