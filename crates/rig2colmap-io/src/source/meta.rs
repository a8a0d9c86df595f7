use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use rig2colmap_3d::transforms::Extrinsics;
use serde::Deserialize;

use super::{CameraPose, FramePoses, PoseSource, PoseSourceError};

/// A camera identifier as declared in metadata documents.
///
/// Ordering puts numeric identifiers first, in numeric order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(untagged)]
pub enum CameraId {
    /// Numeric identifier, e.g. the panoptic camera index.
    Index(u64),
    /// Free-form identifier.
    Name(String),
}

impl CameraId {
    /// Interpret a camera name, e.g. a folder name.
    ///
    /// Names made of ASCII digits that fit in `u64` are indices, so `"007"` is
    /// camera `7`.
    pub fn parse(name: &str) -> Self {
        match name.parse::<u64>() {
            Ok(index) if name.bytes().all(|b| b.is_ascii_digit()) => CameraId::Index(index),
            _ => CameraId::Name(name.to_string()),
        }
    }

    /// The canonical form of this identifier, equal for `7`, `"7"` and `"007"`.
    pub fn normalized(&self) -> Self {
        match self {
            CameraId::Index(index) => CameraId::Index(*index),
            CameraId::Name(name) => CameraId::parse(name),
        }
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraId::Index(index) => write!(f, "{index}"),
            CameraId::Name(name) => f.write_str(name),
        }
    }
}

/// A metadata field either indexed by frame offset then camera, or shared by all frames.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PerFrame<T> {
    /// `field[offset][camera]`
    Indexed(Vec<Vec<T>>),
    /// `field[camera]`, the legacy whole-array layout
    Shared(Vec<T>),
}

impl<T> PerFrame<T> {
    /// The per-camera values at one offset.
    pub fn at(&self, offset: u32) -> Option<&[T]> {
        match self {
            PerFrame::Indexed(frames) => frames.get(offset as usize).map(Vec::as_slice),
            PerFrame::Shared(cameras) => Some(cameras),
        }
    }

    /// Number of frames covered, `None` when shared by every frame.
    pub fn num_frames(&self) -> Option<usize> {
        match self {
            PerFrame::Indexed(frames) => Some(frames.len()),
            PerFrame::Shared(_) => None,
        }
    }
}

/// One `train_meta.json` or `test_meta.json` document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetaDocument {
    /// Image width in pixels.
    pub w: u32,
    /// Image height in pixels.
    pub h: u32,
    /// Camera identifiers.
    pub cam_id: PerFrame<CameraId>,
    /// Intrinsics matrices, 3x3 or 4x4.
    pub k: PerFrame<Vec<Vec<f64>>>,
    /// World-to-camera matrices, 3x4 or 4x4.
    pub w2c: PerFrame<Vec<Vec<f64>>>,
}

impl MetaDocument {
    /// Read a metadata document from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PoseSourceError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PoseSourceError::SourceNotFound(path.to_path_buf()));
        }
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// The cameras declared at one offset, keyed by normalized camera identifier.
    fn cameras_at(
        &self,
        offset: u32,
        document: &str,
    ) -> Result<Vec<(CameraId, CameraPose)>, PoseSourceError> {
        let out_of_range = |frames: Option<usize>| PoseSourceError::OffsetOutOfRange {
            offset,
            frames: frames.unwrap_or(0),
            document: document.to_string(),
        };
        let cam_ids = self
            .cam_id
            .at(offset)
            .ok_or_else(|| out_of_range(self.cam_id.num_frames()))?;
        let ks = self
            .k
            .at(offset)
            .ok_or_else(|| out_of_range(self.k.num_frames()))?;
        let w2cs = self
            .w2c
            .at(offset)
            .ok_or_else(|| out_of_range(self.w2c.num_frames()))?;

        if ks.len() != cam_ids.len() || w2cs.len() != cam_ids.len() {
            return Err(PoseSourceError::InvalidLayout(format!(
                "{document}: {} camera ids, {} intrinsics and {} extrinsics at offset {offset}",
                cam_ids.len(),
                ks.len(),
                w2cs.len()
            )));
        }

        cam_ids
            .iter()
            .zip(ks)
            .zip(w2cs)
            .map(|((cam_id, k), w2c)| -> Result<(CameraId, CameraPose), PoseSourceError> {
                let cam_id = cam_id.normalized();
                let pose = CameraPose {
                    camera_id: Some(cam_id.to_string()),
                    intrinsics: intrinsics_matrix(k)?,
                    extrinsics: Extrinsics::WorldToCamera(extrinsics_matrix(w2c)?),
                    width: self.w,
                    height: self.h,
                };
                Ok((cam_id, pose))
            })
            .collect()
    }
}

/// Read the top-left 3x3 block of a 3x3 or 4x4 intrinsics matrix.
fn intrinsics_matrix(k: &[Vec<f64>]) -> Result<[[f64; 3]; 3], PoseSourceError> {
    if !matches!(k.len(), 3 | 4) || k.iter().any(|row| row.len() != k.len()) {
        return Err(PoseSourceError::InvalidLayout(format!(
            "intrinsics must be 3x3 or 4x4, got {} rows",
            k.len()
        )));
    }
    let mut matrix = [[0.0; 3]; 3];
    for (dst, src) in matrix.iter_mut().zip(k) {
        dst.copy_from_slice(&src[..3]);
    }
    Ok(matrix)
}

/// Read a 3x4 or 4x4 extrinsics matrix as a homogeneous 4x4 matrix.
fn extrinsics_matrix(m: &[Vec<f64>]) -> Result<[[f64; 4]; 4], PoseSourceError> {
    if !matches!(m.len(), 3 | 4) || m.iter().any(|row| row.len() != 4) {
        return Err(PoseSourceError::InvalidLayout(format!(
            "extrinsics must be 3x4 or 4x4, got {} rows",
            m.len()
        )));
    }
    let mut matrix = [[0.0, 0.0, 0.0, 1.0]; 4];
    for (dst, src) in matrix.iter_mut().zip(m) {
        dst.copy_from_slice(src);
    }
    Ok(matrix)
}

/// Poses from a pair of train/test metadata documents.
///
/// Cameras of both subsets are merged per offset by normalized camera identifier;
/// the test subset wins when both declare the same camera.
pub struct MetaSource {
    train: MetaDocument,
    test: MetaDocument,
}

impl MetaSource {
    /// Load both documents. Both files must exist.
    pub fn open(
        train_path: impl AsRef<Path>,
        test_path: impl AsRef<Path>,
    ) -> Result<Self, PoseSourceError> {
        for path in [train_path.as_ref(), test_path.as_ref()] {
            if !path.is_file() {
                return Err(PoseSourceError::SourceNotFound(path.to_path_buf()));
            }
        }
        Ok(Self::new(
            MetaDocument::from_file(train_path)?,
            MetaDocument::from_file(test_path)?,
        ))
    }

    /// Build the source from parsed documents.
    pub fn new(train: MetaDocument, test: MetaDocument) -> Self {
        Self { train, test }
    }
}

impl PoseSource for MetaSource {
    fn name(&self) -> &'static str {
        "train/test meta"
    }

    fn read_frame(&self, offset: u32) -> Result<FramePoses, PoseSourceError> {
        let mut merged = BTreeMap::new();
        for (document, meta) in [("train", &self.train), ("test", &self.test)] {
            let mut declared = BTreeSet::new();
            for (cam_id, pose) in meta.cameras_at(offset, document)? {
                if !declared.insert(cam_id.clone()) {
                    return Err(PoseSourceError::InvalidLayout(format!(
                        "{document}: camera {cam_id} declared twice at offset {offset}"
                    )));
                }
                if merged.insert(cam_id.clone(), pose).is_some() {
                    log::debug!("camera {cam_id} at offset {offset} overridden by {document}");
                }
            }
        }

        Ok(FramePoses {
            offset,
            cameras: merged.into_values().collect(),
        })
    }
}
