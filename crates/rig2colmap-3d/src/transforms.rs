use crate::utils;

/// Default tolerance used to accept a rotation matrix as orthonormal.
pub const DEFAULT_ROTATION_TOLERANCE: f64 = 1e-3;

/// Error types for the transforms module.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The rotation block is not orthonormal within tolerance.
    #[error("Degenerate rotation: determinant {determinant}, orthonormality error {orthonormality_error}")]
    DegenerateRotation {
        /// Determinant of the rotation block.
        determinant: f64,
        /// Largest absolute deviation of `R^T * R` from the identity.
        orthonormality_error: f64,
    },
}

/// A camera extrinsic matrix in one of the two conventions found in rig metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extrinsics {
    /// Maps world points into the camera frame.
    WorldToCamera([[f64; 4]; 4]),
    /// Maps camera points into the world frame (a camera pose).
    CameraToWorld([[f64; 4]; 4]),
}

/// A world-to-camera pose as a unit quaternion and a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuaternionPose {
    /// Rotation as (qw, qx, qy, qz)
    pub rotation: [f64; 4],
    /// Translation as (tx, ty, tz)
    pub translation: [f64; 3],
}

/// Convert a rotation matrix to a unit quaternion (qw, qx, qy, qz).
///
/// The branch is chosen from the largest of the trace and the diagonal elements,
/// so the divisor never gets close to zero. The hemisphere of the result is not
/// canonicalized: `q` and `-q` describe the same rotation.
///
/// PRECONDITION: `rotation` is orthonormal. See [`check_orthonormal`].
pub fn rotation_matrix_to_quaternion(rotation: &[[f64; 3]; 3]) -> [f64; 4] {
    let [[m00, m01, m02], [m10, m11, m12], [m20, m21, m22]] = *rotation;
    let trace = m00 + m11 + m22;

    let q = if trace >= m00 && trace >= m11 && trace >= m22 {
        let s = (trace + 1.0).sqrt() * 2.0;
        [0.25 * s, (m21 - m12) / s, (m02 - m20) / s, (m10 - m01) / s]
    } else if m00 >= m11 && m00 >= m22 {
        let s = (1.0 + m00 - m11 - m22).sqrt() * 2.0;
        [(m21 - m12) / s, 0.25 * s, (m01 + m10) / s, (m02 + m20) / s]
    } else if m11 >= m22 {
        let s = (1.0 + m11 - m00 - m22).sqrt() * 2.0;
        [(m02 - m20) / s, (m01 + m10) / s, 0.25 * s, (m12 + m21) / s]
    } else {
        let s = (1.0 + m22 - m00 - m11).sqrt() * 2.0;
        [(m10 - m01) / s, (m02 + m20) / s, (m12 + m21) / s, 0.25 * s]
    };

    let norm = q.iter().map(|v| v * v).sum::<f64>().sqrt();
    q.map(|v| v / norm)
}

fn determinant33(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Check that a matrix is a proper rotation within the given tolerance.
///
/// Both `|det(R) - 1|` and every entry of `R^T * R - I` must be within `tolerance`.
/// The diagonal of `R^T * R` holds the squared column norms.
pub fn check_orthonormal(rotation: &[[f64; 3]; 3], tolerance: f64) -> Result<(), TransformError> {
    let r = utils::array33_to_faer_mat33(rotation);
    let gram = r.transpose() * r;

    let mut orthonormality_error: f64 = 0.0;
    for i in 0..3 {
        for j in 0..3 {
            let expected = if i == j { 1.0 } else { 0.0 };
            orthonormality_error = orthonormality_error.max((gram.read(i, j) - expected).abs());
        }
    }

    let determinant = determinant33(rotation);

    // NaN entries fail both comparisons
    if (determinant - 1.0).abs() <= tolerance && orthonormality_error <= tolerance {
        Ok(())
    } else {
        Err(TransformError::DegenerateRotation {
            determinant,
            orthonormality_error,
        })
    }
}

/// Invert a rigid transform given as rotation and translation.
///
/// # Returns
///
/// The pair `(R^T, -R^T * t)`.
pub fn invert_rigid(
    dst_r_src: &[[f64; 3]; 3],
    dst_t_src: &[f64; 3],
) -> ([[f64; 3]; 3], [f64; 3]) {
    let dst_r_src_mat = utils::array33_to_faer_mat33(dst_r_src);
    let dst_t_src_col = utils::array3_to_faer_col(dst_t_src);

    // R' = R^T
    let src_r_dst = dst_r_src_mat.transpose();
    // t' = -R^T * t
    let src_t_dst = -src_r_dst * dst_t_src_col;

    (
        utils::faer_mat33_to_array33(src_r_dst),
        utils::faer_col_to_array3(src_t_dst.as_ref()),
    )
}

/// Split the top three rows of a homogeneous matrix into rotation and translation.
pub fn split_rigid(matrix: &[[f64; 4]; 4]) -> ([[f64; 3]; 3], [f64; 3]) {
    let mut rotation = [[0.0; 3]; 3];
    let mut translation = [0.0; 3];
    for i in 0..3 {
        rotation[i].copy_from_slice(&matrix[i][..3]);
        translation[i] = matrix[i][3];
    }
    (rotation, translation)
}

impl Extrinsics {
    /// Return the world-to-camera rotation and translation, inverting camera poses.
    pub fn world_to_camera(&self) -> ([[f64; 3]; 3], [f64; 3]) {
        match self {
            Extrinsics::WorldToCamera(w2c) => split_rigid(w2c),
            Extrinsics::CameraToWorld(c2w) => {
                let (rotation, translation) = split_rigid(c2w);
                invert_rigid(&rotation, &translation)
            }
        }
    }
}

/// Derive the quaternion pose of a camera from its extrinsics.
///
/// # Arguments
///
/// * `extrinsics` - The camera extrinsics. Camera poses are inverted first.
/// * `tolerance` - Orthonormality tolerance for the rotation block.
///
/// # Returns
///
/// The world-to-camera rotation as a unit quaternion and its translation.
pub fn derive_quaternion_pose(
    extrinsics: &Extrinsics,
    tolerance: f64,
) -> Result<QuaternionPose, TransformError> {
    let (rotation, translation) = extrinsics.world_to_camera();
    check_orthonormal(&rotation, tolerance)?;
    Ok(QuaternionPose {
        rotation: rotation_matrix_to_quaternion(&rotation),
        translation,
    })
}
