use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use super::{CameraModelId, ColmapCamera, ColmapImage};

/// Error types for the COLMAP module.
#[derive(Debug, thiserror::Error)]
pub enum ColmapError {
    /// Error reading or writing file
    #[error("error reading or writing file")]
    IoError(#[from] std::io::Error),

    /// Error reading or writing the database
    #[error("database error. {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Invalid number of camera parameters
    #[error("Invalid number of camera parameters: {0}")]
    InvalidNumCameraParams(usize),

    /// Unknown camera model id stored in a database
    #[error("Unknown camera model id: {0}")]
    UnknownCameraModel(i64),

    /// Parse error
    #[error("Parse error {0}")]
    ParseError(String),
}

/// Read the cameras.txt file and return a vector of ColmapCamera structs.
///
/// Comment lines starting with `#` and empty lines are skipped.
///
/// # Arguments
///
/// * `path` - The path to the cameras.txt file.
///
/// # Returns
///
/// A vector of ColmapCamera structs.
pub fn read_cameras_txt(path: impl AsRef<Path>) -> Result<Vec<ColmapCamera>, ColmapError> {
    let reader = BufReader::new(File::open(path)?);

    let mut cameras = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if is_comment(&line) || line.trim().is_empty() {
            continue;
        }
        cameras.push(parse_camera_line(&line)?);
    }

    Ok(cameras)
}

/// Read the images.txt file and return a vector of ColmapImage structs.
///
/// Every image spans two lines: the pose line and the (possibly empty) line of
/// 2D observations. Comment lines starting with `#` are skipped.
///
/// # Arguments
///
/// * `path` - The path to the images.txt file.
///
/// # Returns
///
/// A vector of ColmapImage structs.
pub fn read_images_txt(path: impl AsRef<Path>) -> Result<Vec<ColmapImage>, ColmapError> {
    let reader = BufReader::new(File::open(path)?);

    let lines = reader
        .lines()
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|line| !is_comment(line))
        .collect::<Vec<_>>();

    lines
        .chunks(2)
        .map(|chunk| match chunk {
            [line1, line2] => parse_image_line(line1, line2),
            _ => Err(ColmapError::ParseError(
                "Invalid number of lines".to_string(),
            )),
        })
        .collect()
}

/// Format a camera as one `cameras.txt` line, without the line terminator.
///
/// CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[]
pub fn camera_to_line(camera: &ColmapCamera) -> Result<String, ColmapError> {
    if camera.params.len() != camera.model_id.num_params() {
        return Err(ColmapError::InvalidNumCameraParams(camera.params.len()));
    }

    let params = camera
        .params
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    Ok(format!(
        "{} {} {} {} {params}",
        camera.camera_id,
        camera.model_id.name(),
        camera.width,
        camera.height
    ))
}

/// Format an image as the two `images.txt` lines, without line terminators.
///
/// IMAGE_ID, QW, QX, QY, QZ, TX, TY, TZ, CAMERA_ID, NAME
/// POINTS2D[] as (X, Y, POINT3D_ID)
pub fn image_to_lines(image: &ColmapImage) -> [String; 2] {
    let [qw, qx, qy, qz] = image.rotation;
    let [tx, ty, tz] = image.translation;
    let pose_line = format!(
        "{} {qw} {qx} {qy} {qz} {tx} {ty} {tz} {} {}",
        image.image_id, image.camera_id, image.name
    );

    let points_line = image
        .points2d
        .iter()
        .map(|(x, y, point3d_id)| format!("{x} {y} {point3d_id}"))
        .collect::<Vec<_>>()
        .join(" ");

    [pose_line, points_line]
}

/// Write manifest lines to a file, terminating every line with `\n`.
///
/// The file is truncated first, so rewriting the same lines is idempotent.
pub fn write_manifest_lines(
    path: impl AsRef<Path>,
    lines: &[String],
) -> Result<(), ColmapError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Create an empty points3D.txt file.
///
/// The reconstruction pipeline fills the points itself but expects the file to exist.
pub fn write_empty_points3d_txt(path: impl AsRef<Path>) -> Result<(), ColmapError> {
    File::create(path)?;
    Ok(())
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Utility functions for parsing COLMAP text files
fn parse_part<T: std::str::FromStr>(s: &str) -> Result<T, ColmapError>
where
    T::Err: std::fmt::Display,
{
    s.parse::<T>()
        .map_err(|e| ColmapError::ParseError(format!("{}: {}", s, e)))
}

fn parse_array<const N: usize>(parts: &[&str]) -> Result<[f64; N], ColmapError> {
    parts
        .iter()
        .map(|s| parse_part(s))
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|_| ColmapError::ParseError(format!("Expected {N} values")))
}

/// Parse a camera line and return a ColmapCamera struct.
/// NOTE: The number of parameters depends on the camera model.
///       CAMERA_ID, MODEL, WIDTH, HEIGHT, PARAMS[0], PARAMS[1], ...
fn parse_camera_line(line: &str) -> Result<ColmapCamera, ColmapError> {
    let parts = line.split_whitespace().collect::<Vec<_>>();

    if parts.len() < 5 {
        return Err(ColmapError::ParseError(format!(
            "Invalid number of parts: {}",
            parts.len()
        )));
    }

    let model_id = CameraModelId::from_name(parts[1]).ok_or_else(|| {
        ColmapError::ParseError(format!("Invalid camera model id: {}", parts[1]))
    })?;

    let params = parts[4..]
        .iter()
        .map(|s| parse_part(s))
        .collect::<Result<Vec<_>, _>>()?;
    if params.len() != model_id.num_params() {
        return Err(ColmapError::InvalidNumCameraParams(params.len()));
    }

    Ok(ColmapCamera {
        camera_id: parse_part(parts[0])?,
        model_id,
        width: parse_part(parts[2])?,
        height: parse_part(parts[3])?,
        params,
    })
}

/// Parse an image line pair and return a ColmapImage struct.
fn parse_image_line(line1: &str, line2: &str) -> Result<ColmapImage, ColmapError> {
    let parts1 = line1.split_whitespace().collect::<Vec<_>>();
    let parts2 = line2.split_whitespace().collect::<Vec<_>>();

    if parts1.len() != 10 {
        return Err(ColmapError::ParseError(format!(
            "Invalid number of parts: {}",
            parts1.len()
        )));
    }

    Ok(ColmapImage {
        image_id: parse_part(parts1[0])?,
        rotation: parse_array(&parts1[1..5])?,
        translation: parse_array(&parts1[5..8])?,
        camera_id: parse_part(parts1[8])?,
        name: parts1[9].to_string(),
        points2d: parts2
            .chunks_exact(3)
            .map(|chunk| -> Result<(f64, f64, i64), ColmapError> {
                Ok((
                    parse_part(chunk[0])?,
                    parse_part(chunk[1])?,
                    parse_part(chunk[2])?,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?,
    })
}
