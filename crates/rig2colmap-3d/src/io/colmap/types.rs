/// Represents a Colmap camera model id.
///
/// The discriminants are the model ids stored in the `cameras.model` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraModelId {
    /// Simple pinhole camera model
    CameraModelSimplePinhole = 0,
    /// Pinhole camera model
    CameraModelPinhole = 1,
    /// Simplified radial camera model
    CameraModelSimplifiedRadial = 2,
    /// Radial camera model
    CameraModelRadial = 3,
    /// OpenCV camera model
    CameraModelOpenCV = 4,
    /// OpenCV fisheye camera model
    CameraModelOpenCVFisheye = 5,
    /// Full OpenCV camera model
    CameraModelFullOpenCV = 6,
    /// Field of view camera model
    CameraModelFOV = 7,
    /// Simple radial fisheye camera model
    CameraModelSimpleRadialFisheye = 8,
    /// Radial fisheye camera model
    CameraModelRadialFisheye = 9,
    /// Thin prism fisheye camera model
    CameraModelThinPrismFisheye = 10,
}

const CAMERA_MODELS: [(CameraModelId, &str, usize); 11] = [
    (CameraModelId::CameraModelSimplePinhole, "SIMPLE_PINHOLE", 3),
    (CameraModelId::CameraModelPinhole, "PINHOLE", 4),
    (CameraModelId::CameraModelSimplifiedRadial, "SIMPLE_RADIAL", 4),
    (CameraModelId::CameraModelRadial, "RADIAL", 5),
    (CameraModelId::CameraModelOpenCV, "OPENCV", 8),
    (CameraModelId::CameraModelOpenCVFisheye, "OPENCV_FISHEYE", 8),
    (CameraModelId::CameraModelFullOpenCV, "FULL_OPENCV", 12),
    (CameraModelId::CameraModelFOV, "FOV", 5),
    (CameraModelId::CameraModelSimpleRadialFisheye, "SIMPLE_RADIAL_FISHEYE", 4),
    (CameraModelId::CameraModelRadialFisheye, "RADIAL_FISHEYE", 5),
    (CameraModelId::CameraModelThinPrismFisheye, "THIN_PRISM_FISHEYE", 12),
];

impl CameraModelId {
    /// The model name used in `cameras.txt`.
    pub fn name(&self) -> &'static str {
        CAMERA_MODELS[*self as usize].1
    }

    /// The number of parameters the model expects.
    pub fn num_params(&self) -> usize {
        CAMERA_MODELS[*self as usize].2
    }

    /// Look up a model from its `cameras.txt` name.
    pub fn from_name(name: &str) -> Option<Self> {
        CAMERA_MODELS
            .iter()
            .find(|(_, model_name, _)| *model_name == name)
            .map(|(model, _, _)| *model)
    }

    /// Look up a model from its database id.
    pub fn from_id(id: i64) -> Option<Self> {
        usize::try_from(id)
            .ok()
            .and_then(|id| CAMERA_MODELS.get(id))
            .map(|(model, _, _)| *model)
    }
}

/// Represents a camera in the Colmap system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapCamera {
    /// Camera id
    pub camera_id: u32,
    /// Camera model id
    pub model_id: CameraModelId,
    /// Image width
    pub width: u32,
    /// Image height
    pub height: u32,
    /// Camera parameters, e.g. fx, fy, cx, cy for the pinhole model
    pub params: Vec<f64>,
}

/// Represents an image in the Colmap system.
#[derive(Debug, Clone, PartialEq)]
pub struct ColmapImage {
    /// Image name
    pub name: String,
    /// Image id
    pub image_id: u32,
    /// Camera id
    pub camera_id: u32,
    /// Rotation
    pub rotation: [f64; 4], // qw, qx, qy, qz
    /// Translation
    pub translation: [f64; 3], // x, y, z
    /// Points2d as (x, y, point3d_id)
    pub points2d: Vec<(f64, f64, i64)>,
}
