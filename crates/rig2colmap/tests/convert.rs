//! End-to-end conversion of synthetic capture rig datasets.
//!
//! Every test builds a scratch dataset with `ims/<camera>/<frame>.jpg` and either
//! a `poses_bounds.npy` array or a pair of train/test metadata documents, then
//! checks the written `colmap_<offset>` projects.

use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use rig2colmap::io::source::{PoseSourceError, SourceKind};
use rig2colmap::k3d::io::colmap::{ColmapDatabase, ColmapImage};
use rig2colmap::project::{DATABASE_FILE, INPUT_DIR, MANUAL_DIR};
use rig2colmap::{ConvertConfig, ConvertError, FrameDriver, FrameRange};
use serde_json::json;

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Create `ims/<camera>/<frame>.jpg` for every camera and frame.
fn write_images(root: &Path, cameras: &[&str], frames: u32) -> std::io::Result<()> {
    for camera in cameras {
        let dir = root.join("ims").join(camera);
        std::fs::create_dir_all(&dir)?;
        for frame in 0..frames {
            std::fs::write(dir.join(format!("{frame:06}.jpg")), format!("{camera}/{frame}"))?;
        }
    }
    Ok(())
}

/// Write a poses array of identity-oriented cameras at the given centers.
fn write_poses_bounds(root: &Path, centers: &[[f64; 3]]) -> Result<(), Box<dyn std::error::Error>> {
    // columns down, right, backwards, center, hwf of an OpenCV identity camera
    let down = [0.0, 1.0, 0.0];
    let right = [1.0, 0.0, 0.0];
    let backwards = [0.0, 0.0, -1.0];
    let hwf = [360.0, 640.0, 500.0];

    let mut data = Vec::new();
    for center in centers {
        for i in 0..3 {
            data.extend_from_slice(&[down[i], right[i], backwards[i], center[i], hwf[i]]);
        }
        data.extend_from_slice(&[0.1, 100.0]);
    }
    write_npy_f8(&root.join("poses_bounds.npy"), &[centers.len(), 17], &data)?;
    Ok(())
}

/// Write a little-endian float64 `.npy` file, header padded to 64 bytes.
fn write_npy_f8(path: &Path, shape: &[usize], data: &[f64]) -> std::io::Result<()> {
    let shape = shape.iter().map(|d| format!("{d},")).collect::<String>();
    let mut header = format!("{{'descr': '<f8', 'fortran_order': False, 'shape': ({shape}), }}");
    // magic, version, length, header and newline
    let unpadded = 6 + 2 + 2 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');

    let mut bytes = b"\x93NUMPY\x01\x00".to_vec();
    bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend(data.iter().flat_map(|v| v.to_le_bytes()));
    std::fs::write(path, bytes)
}

fn w2c(translation: [f64; 3]) -> serde_json::Value {
    json!([
        [1.0, 0.0, 0.0, translation[0]],
        [0.0, 1.0, 0.0, translation[1]],
        [0.0, 0.0, 1.0, translation[2]],
        [0.0, 0.0, 0.0, 1.0]
    ])
}

fn k(focal: f64) -> serde_json::Value {
    json!([[focal, 0.0, 320.0], [0.0, focal, 180.0], [0.0, 0.0, 1.0]])
}

/// Write a metadata document in the indexed layout, identical for every frame.
fn write_meta(
    path: PathBuf,
    frames: usize,
    cameras: &[(u64, f64, [f64; 3])],
) -> Result<(), Box<dyn std::error::Error>> {
    let cam_id = cameras.iter().map(|c| c.0).collect::<Vec<_>>();
    let ks = cameras.iter().map(|c| k(c.1)).collect::<Vec<_>>();
    let w2cs = cameras.iter().map(|c| w2c(c.2)).collect::<Vec<_>>();
    let document = json!({
        "w": 640,
        "h": 360,
        "cam_id": vec![cam_id; frames],
        "k": vec![ks; frames],
        "w2c": vec![w2cs; frames],
    });
    std::fs::write(path, serde_json::to_string_pretty(&document)?)?;
    Ok(())
}

fn no_pipeline() -> ConvertConfig {
    ConvertConfig {
        run_pipeline: false,
        ..Default::default()
    }
}

fn read_project(project_dir: &Path) -> Result<(String, String, Vec<ColmapImage>), Box<dyn std::error::Error>> {
    let cameras_txt = std::fs::read_to_string(project_dir.join(MANUAL_DIR).join("cameras.txt"))?;
    let images_txt = std::fs::read_to_string(project_dir.join(MANUAL_DIR).join("images.txt"))?;
    let images = ColmapDatabase::open(project_dir.join(DATABASE_FILE))?.read_images()?;
    Ok((cameras_txt, images_txt, images))
}

#[test]
fn test_llff_dataset() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    let root = tmp_dir.path();
    write_images(root, &["0", "1", "2"], 2)?;
    write_poses_bounds(root, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.5, -1.0]])?;

    let driver = FrameDriver::new(root, no_pipeline())?;
    let report = driver.run(FrameRange::new(0, 2, 300)?, None)?;
    assert!(report.is_success());
    assert_eq!(report.converted.len(), 2);

    let project_dir = root.join("colmap_1");
    let database = ColmapDatabase::open(project_dir.join(DATABASE_FILE))?;
    let cameras = database.read_cameras()?;
    let images = database.read_images()?;
    let (cameras_txt, images_txt, _) = read_project(&project_dir)?;

    // row counts agree across the three outputs
    assert_eq!(cameras.len(), 3);
    assert_eq!(images.len(), 3);
    assert_eq!(cameras_txt.lines().count(), 3);
    assert_eq!(images_txt.lines().count(), 6);

    for (i, (camera, image)) in cameras.iter().zip(&images).enumerate() {
        let id = i as u32 + 1;
        assert_eq!(camera.camera_id, id);
        assert_eq!(image.image_id, id);
        assert_eq!(image.camera_id, id);
        assert_eq!(image.name, format!("{i}.jpg"));
        assert_eq!(camera.params, [500.0, 500.0, 320.0, 180.0]);
        assert_eq!((camera.width, camera.height), (640, 360));

        let norm = image.rotation.iter().map(|q| q * q).sum::<f64>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-6);
    }

    // camera poses are inverted: t = -R^T c with R = I
    assert_relative_eq!(images[2].translation[0], -2.0, epsilon = 1e-12);
    assert_relative_eq!(images[2].translation[1], -0.5, epsilon = 1e-12);
    assert_relative_eq!(images[2].translation[2], 1.0, epsilon = 1e-12);
    assert_relative_eq!(images[2].rotation[0], 1.0, epsilon = 1e-12);

    // images are mirrored by camera name
    let copied = std::fs::read_to_string(project_dir.join(INPUT_DIR).join("2.jpg"))?;
    assert_eq!(copied, "2/1");
    Ok(())
}

#[test]
fn test_meta_identity_pose_is_exact() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    let root = tmp_dir.path();
    write_images(root, &["0"], 1)?;
    write_meta(root.join("train_meta.json"), 1, &[(0, 500.0, [1.0, 2.0, 3.0])])?;
    write_meta(root.join("test_meta.json"), 1, &[])?;

    let driver = FrameDriver::new(root, no_pipeline())?;
    driver.run(FrameRange::new(0, 1, 300)?, None)?;

    let (cameras_txt, images_txt, _) = read_project(&root.join("colmap_0"))?;
    assert_eq!(cameras_txt, "1 PINHOLE 640 360 500 500 320 180\n");
    assert_eq!(images_txt, "1 1 0 0 0 1 2 3 1 0.jpg\n\n");
    Ok(())
}

#[test]
fn test_meta_test_subset_overrides_train() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    let root = tmp_dir.path();
    write_images(root, &["0", "1", "2"], 3)?;
    write_meta(
        root.join("train_meta.json"),
        3,
        &[(0, 100.0, [0.0; 3]), (1, 100.0, [0.0; 3]), (2, 100.0, [0.0; 3])],
    )?;
    write_meta(root.join("test_meta.json"), 3, &[(1, 200.0, [0.0, 0.0, 4.0])])?;

    let driver = FrameDriver::new(root, no_pipeline())?;
    driver.run(FrameRange::new(2, 3, 300)?, None)?;

    let database = ColmapDatabase::open(root.join("colmap_2").join(DATABASE_FILE))?;
    let focals = database
        .read_cameras()?
        .iter()
        .map(|c| c.params[0])
        .collect::<Vec<_>>();
    assert_eq!(focals, [100.0, 200.0, 100.0]);
    assert_eq!(database.read_images()?[1].translation, [0.0, 0.0, 4.0]);
    Ok(())
}

#[test]
fn test_meta_joins_cameras_by_name() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    let root = tmp_dir.path();
    // "10" sorts before "2" on disk
    write_images(root, &["2", "10"], 1)?;
    write_meta(
        root.join("train_meta.json"),
        1,
        &[(2, 200.0, [0.0; 3]), (10, 1000.0, [0.0; 3])],
    )?;
    write_meta(root.join("test_meta.json"), 1, &[])?;

    let driver = FrameDriver::new(root, no_pipeline())?;
    let names = driver.cameras().iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["10", "2"]);
    driver.run(FrameRange::new(0, 1, 300)?, None)?;

    let (cameras_txt, _, images) = read_project(&root.join("colmap_0"))?;
    assert_eq!(
        cameras_txt,
        "1 PINHOLE 640 360 1000 1000 320 180\n2 PINHOLE 640 360 200 200 320 180\n"
    );
    assert_eq!(images[0].name, "10.jpg");
    assert_eq!(images[1].name, "2.jpg");
    Ok(())
}

#[test]
fn test_rerun_is_idempotent() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    let root = tmp_dir.path();
    write_images(root, &["a", "b"], 1)?;
    write_poses_bounds(root, &[[0.25, 0.0, 0.0], [0.0, -3.5, 1e-3]])?;

    let driver = FrameDriver::new(root, no_pipeline())?;
    let range = FrameRange::new(0, 1, 300)?;

    let project_dir = root.join("colmap_0");
    let outputs = [
        project_dir.join(DATABASE_FILE),
        project_dir.join(MANUAL_DIR).join("cameras.txt"),
        project_dir.join(MANUAL_DIR).join("images.txt"),
        project_dir.join(MANUAL_DIR).join("points3D.txt"),
    ];
    let read_outputs = || {
        outputs
            .iter()
            .map(std::fs::read)
            .collect::<std::io::Result<Vec<_>>>()
    };

    driver.run(range, None)?;
    let first = read_outputs()?;
    driver.run(range, None)?;
    let second = read_outputs()?;

    for (path, (first, second)) in outputs.iter().zip(first.iter().zip(&second)) {
        assert!(first == second, "{} differs between runs", path.display());
    }
    assert!(!first[0].is_empty());
    Ok(())
}

#[test]
fn test_missing_image_still_writes_records() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    let root = tmp_dir.path();
    write_images(root, &["0", "1", "2"], 1)?;
    std::fs::remove_file(root.join("ims").join("1").join("000000.jpg"))?;
    write_poses_bounds(root, &[[0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]])?;

    let driver = FrameDriver::new(root, no_pipeline())?;
    let report = driver.run(FrameRange::new(0, 1, 300)?, None)?;

    let summary = &report.converted[0];
    assert_eq!(summary.copied_images, 2);
    assert_eq!(summary.skipped_images.len(), 1);
    assert_eq!(summary.records, 3);
    assert!(!root.join("colmap_0").join(INPUT_DIR).join("1.jpg").exists());
    Ok(())
}

#[test]
fn test_camera_count_mismatch() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    let root = tmp_dir.path();
    write_images(root, &["0", "1", "2"], 1)?;
    write_poses_bounds(root, &[[0.0; 3], [1.0, 0.0, 0.0]])?;

    let driver = FrameDriver::new(root, no_pipeline())?;
    let report = driver.run(FrameRange::new(0, 1, 300)?, None)?;
    assert!(!report.is_success());
    assert!(matches!(
        report.failed[0],
        (0, ConvertError::CameraCountMismatch { poses: 2, folders: 3 })
    ));
    assert!(!root.join("colmap_0").join(DATABASE_FILE).exists());
    Ok(())
}

#[test]
fn test_missing_inputs_are_rejected_before_output() -> TestResult {
    let tmp_dir = tempfile::tempdir()?;
    let missing = tmp_dir.path().join("missing");
    assert!(matches!(
        FrameDriver::new(&missing, no_pipeline()),
        Err(ConvertError::PathNotFound(_))
    ));
    assert!(!missing.exists());

    let root = tmp_dir.path().join("rig");
    write_images(&root, &["0"], 1)?;
    let config = ConvertConfig {
        source: SourceKind::Meta,
        ..no_pipeline()
    };
    assert!(matches!(
        FrameDriver::new(&root, config),
        Err(ConvertError::Source(PoseSourceError::SourceNotFound(_)))
    ));
    assert_eq!(std::fs::read_dir(&root)?.count(), 1);
    Ok(())
}
