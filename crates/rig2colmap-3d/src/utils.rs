/// Create a faer column view over a 3D array.
///
/// # Arguments
///
/// * `array` - A 3D array.
///
/// # Returns
///
/// A faer column view borrowing the array.
pub fn array3_to_faer_col(array: &[f64; 3]) -> faer::ColRef<'_, f64> {
    faer::col::from_slice(array.as_slice())
}

/// Create a row-major faer matrix view over a 3x3 array.
///
/// # Arguments
///
/// * `array` - A 3x3 array in row-major order.
///
/// # Returns
///
/// A faer 3x3 matrix view borrowing the array.
pub fn array33_to_faer_mat33(array: &[[f64; 3]; 3]) -> faer::MatRef<'_, f64> {
    faer::mat::from_row_major_slice(array.as_flattened(), 3, 3)
}

/// Copy a 3x3 faer matrix into a row-major array.
pub fn faer_mat33_to_array33(mat: faer::MatRef<'_, f64>) -> [[f64; 3]; 3] {
    debug_assert_eq!((mat.nrows(), mat.ncols()), (3, 3));
    let mut array = [[0.0; 3]; 3];
    for (i, row) in array.iter_mut().enumerate() {
        for (j, val) in row.iter_mut().enumerate() {
            *val = mat.read(i, j);
        }
    }
    array
}

/// Copy a faer column of length 3 into an array.
pub fn faer_col_to_array3(col: faer::ColRef<'_, f64>) -> [f64; 3] {
    debug_assert_eq!(col.nrows(), 3);
    [col.read(0), col.read(1), col.read(2)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array3_to_col() {
        let array = [1.0, 2.0, 3.0];
        let col = array3_to_faer_col(&array);
        assert_eq!(col.read(0), 1.0);
        assert_eq!(col.read(2), 3.0);
        assert_eq!(faer_col_to_array3(col), array);
    }

    #[test]
    fn test_array33_is_row_major() {
        let array = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let mat = array33_to_faer_mat33(&array);
        assert_eq!(mat.read(0, 1), 2.0);
        assert_eq!(mat.read(1, 0), 4.0);
        assert_eq!(mat.read(2, 1), 8.0);
        assert_eq!(faer_mat33_to_array33(mat), array);
        assert_eq!(faer_mat33_to_array33(mat.transpose())[0][1], 4.0);
    }
}
