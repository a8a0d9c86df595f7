use std::path::Path;

use rusqlite::{params, Connection};

use super::{CameraModelId, ColmapCamera, ColmapError, ColmapImage};

/// Largest image id accepted by COLMAP (`2^31 - 1`).
pub const MAX_IMAGE_ID: i64 = 2_147_483_647;

// NOTE: the layout follows the COLMAP database with prior pose columns on the images table.
const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS cameras (
    camera_id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    model INTEGER NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    params BLOB,
    prior_focal_length INTEGER NOT NULL);
CREATE TABLE IF NOT EXISTS images (
    image_id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    name TEXT NOT NULL UNIQUE,
    camera_id INTEGER NOT NULL,
    prior_qw REAL,
    prior_qx REAL,
    prior_qy REAL,
    prior_qz REAL,
    prior_tx REAL,
    prior_ty REAL,
    prior_tz REAL,
    CONSTRAINT image_id_check CHECK(image_id >= 0 and image_id < 2147483647),
    FOREIGN KEY(camera_id) REFERENCES cameras(camera_id));
CREATE TABLE IF NOT EXISTS keypoints (
    image_id INTEGER PRIMARY KEY NOT NULL,
    rows INTEGER NOT NULL,
    cols INTEGER NOT NULL,
    data BLOB,
    FOREIGN KEY(image_id) REFERENCES images(image_id) ON DELETE CASCADE);
CREATE TABLE IF NOT EXISTS descriptors (
    image_id INTEGER PRIMARY KEY NOT NULL,
    rows INTEGER NOT NULL,
    cols INTEGER NOT NULL,
    data BLOB,
    FOREIGN KEY(image_id) REFERENCES images(image_id) ON DELETE CASCADE);
CREATE TABLE IF NOT EXISTS matches (
    pair_id INTEGER PRIMARY KEY NOT NULL,
    rows INTEGER NOT NULL,
    cols INTEGER NOT NULL,
    data BLOB);
CREATE TABLE IF NOT EXISTS two_view_geometries (
    pair_id INTEGER PRIMARY KEY NOT NULL,
    rows INTEGER NOT NULL,
    cols INTEGER NOT NULL,
    data BLOB,
    config INTEGER NOT NULL,
    F BLOB,
    E BLOB,
    H BLOB,
    qvec BLOB,
    tvec BLOB);
CREATE UNIQUE INDEX IF NOT EXISTS index_name ON images(name);
";

/// A COLMAP database holding cameras and images with prior poses.
pub struct ColmapDatabase {
    conn: Connection,
}

impl ColmapDatabase {
    /// Create a fresh database, deleting any existing file at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the database file, e.g. `input.db`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ColmapError> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self { conn })
    }

    /// Open an existing database for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ColmapError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ColmapError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("database not found: {}", path.display()),
            )));
        }
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Insert a camera and its image, committing both in one transaction.
    ///
    /// # Arguments
    ///
    /// * `camera` - The camera row. Its id is stored explicitly.
    /// * `image` - The image row with its prior rotation and translation.
    pub fn add_camera_and_image(
        &mut self,
        camera: &ColmapCamera,
        image: &ColmapImage,
    ) -> Result<(), ColmapError> {
        if camera.params.len() != camera.model_id.num_params() {
            return Err(ColmapError::InvalidNumCameraParams(camera.params.len()));
        }
        if i64::from(image.image_id) >= MAX_IMAGE_ID {
            return Err(ColmapError::ParseError(format!(
                "image id {} out of range",
                image.image_id
            )));
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO cameras VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                camera.camera_id,
                camera.model_id as i64,
                camera.width,
                camera.height,
                params_to_blob(&camera.params),
                false,
            ],
        )?;
        tx.execute(
            "INSERT INTO images VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                image.image_id,
                image.name,
                image.camera_id,
                image.rotation[0],
                image.rotation[1],
                image.rotation[2],
                image.rotation[3],
                image.translation[0],
                image.translation[1],
                image.translation[2],
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Read all cameras ordered by id.
    pub fn read_cameras(&self) -> Result<Vec<ColmapCamera>, ColmapError> {
        let mut stmt = self.conn.prepare(
            "SELECT camera_id, model, width, height, params FROM cameras ORDER BY camera_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, Vec<u8>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(camera_id, model, width, height, blob)| -> Result<_, ColmapError> {
                Ok(ColmapCamera {
                    camera_id,
                    model_id: CameraModelId::from_id(model)
                        .ok_or(ColmapError::UnknownCameraModel(model))?,
                    width,
                    height,
                    params: blob_to_params(&blob)?,
                })
            })
            .collect()
    }

    /// Read all images ordered by id, with their prior poses.
    pub fn read_images(&self) -> Result<Vec<ColmapImage>, ColmapError> {
        let mut stmt = self.conn.prepare(
            "SELECT image_id, name, camera_id, prior_qw, prior_qx, prior_qy, prior_qz, \
             prior_tx, prior_ty, prior_tz FROM images ORDER BY image_id",
        )?;
        let images = stmt
            .query_map([], |row| {
                Ok(ColmapImage {
                    image_id: row.get(0)?,
                    name: row.get(1)?,
                    camera_id: row.get(2)?,
                    rotation: [row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?],
                    translation: [row.get(7)?, row.get(8)?, row.get(9)?],
                    points2d: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(images)
    }
}

/// Encode camera parameters as a little-endian f64 blob.
fn params_to_blob(params: &[f64]) -> Vec<u8> {
    params.iter().flat_map(|p| p.to_le_bytes()).collect()
}

fn blob_to_params(blob: &[u8]) -> Result<Vec<f64>, ColmapError> {
    if blob.len() % 8 != 0 {
        return Err(ColmapError::ParseError(format!(
            "params blob of {} bytes is not a f64 array",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32) -> (ColmapCamera, ColmapImage) {
        (
            ColmapCamera {
                camera_id: id,
                model_id: CameraModelId::CameraModelPinhole,
                width: 640,
                height: 360,
                params: vec![500.0, 501.0, 320.0, 180.0],
            },
            ColmapImage {
                name: format!("{id}.jpg"),
                image_id: id,
                camera_id: id,
                rotation: [1.0, 0.0, 0.0, 0.0],
                translation: [1.0, 2.0, 3.0],
                points2d: Vec::new(),
            },
        )
    }

    #[test]
    fn test_blob_roundtrip() -> Result<(), ColmapError> {
        let params = [1.5, -2.0, 1e-9, 4096.0];
        let blob = params_to_blob(&params);
        assert_eq!(blob.len(), 32);
        assert_eq!(&blob[..8], &1.5f64.to_le_bytes());
        assert_eq!(blob_to_params(&blob)?, params);
        assert!(blob_to_params(&blob[..7]).is_err());
        Ok(())
    }

    #[test]
    fn test_create_insert_read() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("input.db");

        let mut db = ColmapDatabase::create(&path)?;
        for id in 1..=3 {
            let (camera, image) = record(id);
            db.add_camera_and_image(&camera, &image)?;
        }

        let cameras = db.read_cameras()?;
        let images = db.read_images()?;
        assert_eq!(cameras.len(), 3);
        assert_eq!(images.len(), 3);
        assert_eq!(cameras[2], record(3).0);
        assert_eq!(images[0], record(1).1);

        // duplicated names violate the unique index
        let (mut camera, image) = record(1);
        camera.camera_id = 4;
        assert!(db.add_camera_and_image(&camera, &image).is_err());
        assert_eq!(db.read_cameras()?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_create_replaces_existing_database() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("input.db");

        {
            let mut db = ColmapDatabase::create(&path)?;
            let (camera, image) = record(1);
            db.add_camera_and_image(&camera, &image)?;
        }

        let db = ColmapDatabase::create(&path)?;
        assert!(db.read_cameras()?.is_empty());
        assert!(db.read_images()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_open_missing_database() {
        let result = ColmapDatabase::open("/nonexistent/input.db");
        assert!(matches!(result, Err(ColmapError::IoError(_))));
    }
}
