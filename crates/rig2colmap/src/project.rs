use std::path::Path;

use rig2colmap_3d::io::colmap::{
    camera_to_line, image_to_lines, read_cameras_txt, read_images_txt, write_empty_points3d_txt,
    write_manifest_lines, CameraModelId, ColmapCamera, ColmapDatabase, ColmapImage,
};
use rig2colmap_3d::transforms::{derive_quaternion_pose, QuaternionPose};
use rig2colmap_io::dataset::FrameNaming;
use rig2colmap_io::error::IoError;

use crate::error::ConvertError;
use crate::ids::AllocatedCamera;

/// Directory of the text manifests inside a frame project.
pub const MANUAL_DIR: &str = "manual";

/// Directory of the mirrored images inside a frame project.
pub const INPUT_DIR: &str = "input";

/// File name of the COLMAP database inside a frame project.
pub const DATABASE_FILE: &str = "input.db";

/// File name of the camera manifest.
pub const CAMERAS_FILE: &str = "cameras.txt";

/// File name of the image manifest.
pub const IMAGES_FILE: &str = "images.txt";

/// File name of the (empty) point manifest.
pub const POINTS3D_FILE: &str = "points3D.txt";

/// One camera and its image at one frame, the unit written to every output.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// Camera and image identifier.
    pub id: u32,
    /// Image file name, `<camera>.<ext>`.
    pub file_name: String,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Pinhole parameters `(fx, fy, cx, cy)`.
    pub intrinsics: [f64; 4],
    /// World-to-camera pose.
    pub pose: QuaternionPose,
}

impl FrameRecord {
    /// Derive the record of an allocated camera.
    ///
    /// # Arguments
    ///
    /// * `camera` - The camera with its identifier and pose.
    /// * `naming` - The image naming scheme.
    /// * `tolerance` - Orthonormality tolerance of the rotation.
    pub fn from_camera(
        camera: &AllocatedCamera,
        naming: &FrameNaming,
        tolerance: f64,
    ) -> Result<Self, ConvertError> {
        let pose = derive_quaternion_pose(&camera.pose.extrinsics, tolerance).map_err(|source| {
            ConvertError::DegenerateRotation {
                camera: camera.folder.name.clone(),
                source,
            }
        })?;

        Ok(Self {
            id: camera.id,
            file_name: naming.camera_file(&camera.folder.name),
            width: camera.pose.width,
            height: camera.pose.height,
            intrinsics: camera.pose.pinhole_params(),
            pose,
        })
    }

    /// The camera row of this record.
    pub fn to_colmap_camera(&self) -> ColmapCamera {
        ColmapCamera {
            camera_id: self.id,
            model_id: CameraModelId::CameraModelPinhole,
            width: self.width,
            height: self.height,
            params: self.intrinsics.to_vec(),
        }
    }

    /// The image row of this record.
    pub fn to_colmap_image(&self) -> ColmapImage {
        ColmapImage {
            name: self.file_name.clone(),
            image_id: self.id,
            camera_id: self.id,
            rotation: self.pose.rotation,
            translation: self.pose.translation,
            points2d: Vec::new(),
        }
    }
}

/// The manifest lines of a frame project, without line terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLines {
    /// `cameras.txt`, one line per record.
    pub cameras: Vec<String>,
    /// `images.txt`, a data line and a blank line per record.
    pub images: Vec<String>,
}

/// The records of one frame, ordered by identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameProject {
    offset: u32,
    records: Vec<FrameRecord>,
}

impl FrameProject {
    /// Create a project from records whose identifiers are exactly `1..=N` in order.
    pub fn new(offset: u32, records: Vec<FrameRecord>) -> Result<Self, ConvertError> {
        for (i, record) in records.iter().enumerate() {
            if record.id as usize != i + 1 {
                return Err(ConvertError::Verification(format!(
                    "record {i} of frame {offset} has id {}, expected {}",
                    record.id,
                    i + 1
                )));
            }
        }
        Ok(Self { offset, records })
    }

    /// Derive the project of one frame from its allocated cameras.
    pub fn from_cameras(
        offset: u32,
        cameras: &[AllocatedCamera],
        naming: &FrameNaming,
        tolerance: f64,
    ) -> Result<Self, ConvertError> {
        let records = cameras
            .iter()
            .map(|camera| FrameRecord::from_camera(camera, naming, tolerance))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(offset, records)
    }

    /// Frame offset.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Records ordered by identifier.
    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// Serialize the records as manifest lines.
    pub fn to_manifest_lines(&self) -> Result<ManifestLines, ConvertError> {
        let cameras = self
            .records
            .iter()
            .map(|record| camera_to_line(&record.to_colmap_camera()))
            .collect::<Result<Vec<_>, _>>()?;
        let images = self
            .records
            .iter()
            .flat_map(|record| image_to_lines(&record.to_colmap_image()))
            .collect();
        Ok(ManifestLines { cameras, images })
    }

    /// Serialize the records as database rows.
    pub fn to_store_rows(&self) -> Vec<(ColmapCamera, ColmapImage)> {
        self.records
            .iter()
            .map(|record| (record.to_colmap_camera(), record.to_colmap_image()))
            .collect()
    }

    /// Write the database and the manifests into a frame project directory.
    ///
    /// Any existing database is deleted first and the manifests are truncated, so
    /// writing the same project twice gives identical outputs.
    ///
    /// # Arguments
    ///
    /// * `project_dir` - The frame project directory, e.g. `<root>/colmap_0`.
    pub fn write(&self, project_dir: &Path) -> Result<(), ConvertError> {
        let manual_dir = project_dir.join(MANUAL_DIR);
        std::fs::create_dir_all(&manual_dir).map_err(IoError::from)?;

        let mut database = ColmapDatabase::create(project_dir.join(DATABASE_FILE))?;
        for (camera, image) in self.to_store_rows() {
            database.add_camera_and_image(&camera, &image)?;
        }

        let lines = self.to_manifest_lines()?;
        write_manifest_lines(manual_dir.join(CAMERAS_FILE), &lines.cameras)?;
        write_manifest_lines(manual_dir.join(IMAGES_FILE), &lines.images)?;
        write_empty_points3d_txt(manual_dir.join(POINTS3D_FILE))?;

        log::debug!(
            "Wrote {} records to {}",
            self.records.len(),
            project_dir.display()
        );
        Ok(())
    }
}

/// Read a frame project back and check its identifiers.
///
/// The database and both manifests must hold the same number of cameras and
/// images, with identifiers `1..=N`, `image_id == camera_id`, and the same image
/// names.
///
/// # Returns
///
/// The number of records of the project.
pub fn verify_project(project_dir: &Path) -> Result<usize, ConvertError> {
    let database = ColmapDatabase::open(project_dir.join(DATABASE_FILE))?;
    let db_cameras = database.read_cameras()?;
    let db_images = database.read_images()?;

    let manual_dir = project_dir.join(MANUAL_DIR);
    let txt_cameras = read_cameras_txt(manual_dir.join(CAMERAS_FILE))?;
    let txt_images = read_images_txt(manual_dir.join(IMAGES_FILE))?;

    let count = db_cameras.len();
    if db_images.len() != count || txt_cameras.len() != count || txt_images.len() != count {
        return Err(ConvertError::Verification(format!(
            "record counts differ: {count} database cameras, {} database images, {} manifest cameras, {} manifest images",
            db_images.len(),
            txt_cameras.len(),
            txt_images.len()
        )));
    }

    for (i, (((db_camera, db_image), txt_camera), txt_image)) in db_cameras
        .iter()
        .zip(&db_images)
        .zip(&txt_cameras)
        .zip(&txt_images)
        .enumerate()
    {
        let expected = i as u32 + 1;
        let ids = [
            db_camera.camera_id,
            db_image.image_id,
            db_image.camera_id,
            txt_camera.camera_id,
            txt_image.image_id,
            txt_image.camera_id,
        ];
        if ids.iter().any(|&id| id != expected) {
            return Err(ConvertError::Verification(format!(
                "identifiers {ids:?} at position {i}, expected {expected}"
            )));
        }
        if db_image.name != txt_image.name {
            return Err(ConvertError::Verification(format!(
                "image {expected} is named {} in the database and {} in the manifest",
                db_image.name, txt_image.name
            )));
        }
    }

    Ok(count)
}
