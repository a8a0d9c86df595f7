use std::io::Read;
use std::path::Path;

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";
const MAX_HEADER_LEN: usize = 1 << 20;

/// Error types for the npy module.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum NpyError {
    /// Failed to read or write the file
    #[error("Failed to read npy file")]
    Io(#[from] std::io::Error),

    /// The file does not start with the npy magic string
    #[error("Invalid npy magic string")]
    InvalidMagic,

    /// Malformed header dictionary
    #[error("Malformed npy header: {0}")]
    MalformedHeader(String),

    /// Unsupported element type
    #[error("Unsupported npy dtype: {0}")]
    UnsupportedDtype(String),

    /// The payload does not match the declared shape
    #[error("npy payload holds {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// Bytes implied by shape and dtype
        expected: usize,
        /// Bytes found after the header
        actual: usize,
    },
}

/// A dense floating point array loaded from a `.npy` file, stored in C order.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NpyArray {
    /// Create an array from its shape and C-ordered data.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, NpyError> {
        let expected = element_count(&shape)?;
        if expected != data.len() {
            return Err(NpyError::SizeMismatch {
                expected: expected.saturating_mul(8),
                actual: data.len() * 8,
            });
        }
        Ok(Self { shape, data })
    }

    /// The array shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The array elements in C order.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// The rows of a 2D array.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        let cols = self.shape.last().copied().unwrap_or(1).max(1);
        self.data.chunks_exact(cols)
    }
}

/// Number of elements of a shape, or an error if it does not fit in `usize`.
fn element_count(shape: &[usize]) -> Result<usize, NpyError> {
    shape
        .iter()
        .try_fold(1usize, |count, dim| count.checked_mul(*dim))
        .ok_or_else(|| NpyError::MalformedHeader(format!("shape {shape:?} overflows")))
}

#[derive(Debug, Clone, Copy)]
enum Dtype {
    F32 { little_endian: bool },
    F64 { little_endian: bool },
}

impl Dtype {
    fn parse(descr: &str) -> Result<Self, NpyError> {
        match descr {
            "<f8" | "=f8" => Ok(Dtype::F64 { little_endian: true }),
            ">f8" => Ok(Dtype::F64 { little_endian: false }),
            "<f4" | "=f4" => Ok(Dtype::F32 { little_endian: true }),
            ">f4" => Ok(Dtype::F32 { little_endian: false }),
            _ => Err(NpyError::UnsupportedDtype(descr.to_string())),
        }
    }

    fn size(&self) -> usize {
        match self {
            Dtype::F32 { .. } => 4,
            Dtype::F64 { .. } => 8,
        }
    }

    fn decode(&self, bytes: &[u8]) -> f64 {
        match *self {
            Dtype::F64 { little_endian } => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                if little_endian {
                    f64::from_le_bytes(buf)
                } else {
                    f64::from_be_bytes(buf)
                }
            }
            Dtype::F32 { little_endian } => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                let value = if little_endian {
                    f32::from_le_bytes(buf)
                } else {
                    f32::from_be_bytes(buf)
                };
                value as f64
            }
        }
    }
}

struct NpyHeader {
    dtype: Dtype,
    fortran_order: bool,
    shape: Vec<usize>,
}

/// Return the text following `'key':` in the header dictionary.
fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let pattern = format!("'{key}':");
    let start = header
        .find(&pattern)
        .ok_or_else(|| NpyError::MalformedHeader(format!("missing key {key}")))?;
    Ok(header[start + pattern.len()..].trim_start())
}

fn parse_header(header: &str) -> Result<NpyHeader, NpyError> {
    let descr = header_value(header, "descr")?;
    let descr = descr
        .strip_prefix('\'')
        .and_then(|s| s.split('\'').next())
        .ok_or_else(|| NpyError::MalformedHeader("descr is not a string".to_string()))?;

    let fortran_order = match header_value(header, "fortran_order")? {
        s if s.starts_with("True") => true,
        s if s.starts_with("False") => false,
        s => return Err(NpyError::MalformedHeader(format!("fortran_order: {s}"))),
    };

    let shape = header_value(header, "shape")?;
    let shape = shape
        .strip_prefix('(')
        .and_then(|s| s.split(')').next())
        .ok_or_else(|| NpyError::MalformedHeader("shape is not a tuple".to_string()))?;
    let shape = shape
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|e| NpyError::MalformedHeader(format!("shape {s}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NpyHeader {
        dtype: Dtype::parse(descr)?,
        fortran_order,
        shape,
    })
}

/// Reorder column-major data into row-major order.
fn fortran_to_c_order(shape: &[usize], data: Vec<f64>) -> Vec<f64> {
    if shape.len() < 2 {
        return data;
    }

    let mut out = Vec::with_capacity(data.len());
    let mut index = vec![0usize; shape.len()];
    for _ in 0..data.len() {
        // offset of the C-ordered multi-index in the Fortran layout
        let (mut offset, mut stride) = (0, 1);
        for (i, dim) in index.iter().zip(shape) {
            offset += i * stride;
            stride *= dim;
        }
        out.push(data[offset]);

        // advance the multi-index, last axis fastest
        for axis in (0..shape.len()).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}

/// Parse a `.npy` stream holding a float32 or float64 array.
pub fn parse_npy<R: Read>(reader: &mut R) -> Result<NpyArray, NpyError> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if &magic != NPY_MAGIC {
        return Err(NpyError::InvalidMagic);
    }

    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let header_len = match version[0] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        v => {
            return Err(NpyError::MalformedHeader(format!(
                "unsupported version {v}"
            )))
        }
    };
    if header_len > MAX_HEADER_LEN {
        return Err(NpyError::MalformedHeader(format!(
            "header of {header_len} bytes"
        )));
    }

    let mut header = vec![0u8; header_len];
    reader.read_exact(&mut header)?;
    let header = String::from_utf8(header)
        .map_err(|e| NpyError::MalformedHeader(e.to_string()))?;
    let header = parse_header(&header)?;

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;

    let expected = element_count(&header.shape)?
        .checked_mul(header.dtype.size())
        .ok_or_else(|| NpyError::MalformedHeader(format!("shape {:?} overflows", header.shape)))?;
    if payload.len() != expected {
        return Err(NpyError::SizeMismatch {
            expected,
            actual: payload.len(),
        });
    }

    let data = payload
        .chunks_exact(header.dtype.size())
        .map(|bytes| header.dtype.decode(bytes))
        .collect::<Vec<_>>();

    let data = if header.fortran_order {
        fortran_to_c_order(&header.shape, data)
    } else {
        data
    };

    NpyArray::new(header.shape, data)
}

/// Read a `.npy` file holding a float32 or float64 array.
///
/// # Arguments
///
/// * `path` - The path to the `.npy` file.
///
/// # Returns
///
/// The array converted to f64, in C order.
pub fn read_npy(path: impl AsRef<Path>) -> Result<NpyArray, NpyError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    parse_npy(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npy_bytes(descr: &str, fortran: bool, shape: &str, payload: &[u8]) -> Vec<u8> {
        let header = format!(
            "{{'descr': '{descr}', 'fortran_order': {}, 'shape': {shape}, }}\n",
            if fortran { "True" } else { "False" }
        );
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_parse_f4_c_order() -> Result<(), NpyError> {
        let payload = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect::<Vec<_>>();
        let bytes = npy_bytes("<f4", false, "(2, 3)", &payload);

        let array = parse_npy(&mut bytes.as_slice())?;
        assert_eq!(array.shape(), &[2, 3]);
        let rows = array.rows().collect::<Vec<_>>();
        assert_eq!(rows, vec![&[1.0, 2.0, 3.0][..], &[4.0, 5.0, 6.0][..]]);
        Ok(())
    }

    #[test]
    fn test_parse_f8_fortran_order() -> Result<(), NpyError> {
        // column-major storage of [[1, 2, 3], [4, 5, 6]]
        let payload = [1.0f64, 4.0, 2.0, 5.0, 3.0, 6.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect::<Vec<_>>();
        let bytes = npy_bytes("<f8", true, "(2, 3)", &payload);

        let array = parse_npy(&mut bytes.as_slice())?;
        assert_eq!(array.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        let bytes = npy_bytes("<i8", false, "(1,)", &[0u8; 8]);
        assert!(matches!(
            parse_npy(&mut bytes.as_slice()),
            Err(NpyError::UnsupportedDtype(_))
        ));

        let bytes = npy_bytes("<f8", false, "(2,)", &[0u8; 8]);
        assert!(matches!(
            parse_npy(&mut bytes.as_slice()),
            Err(NpyError::SizeMismatch {
                expected: 16,
                actual: 8
            })
        ));

        let bytes = npy_bytes("<f8", false, "(18446744073709551615, 2)", &[0u8; 8]);
        assert!(matches!(
            parse_npy(&mut bytes.as_slice()),
            Err(NpyError::MalformedHeader(_))
        ));

        let bytes = npy_bytes("<f4", false, "(4611686018427387904,)", &[0u8; 8]);
        assert!(matches!(
            parse_npy(&mut bytes.as_slice()),
            Err(NpyError::MalformedHeader(_))
        ));

        let mut bytes = npy_bytes("<f8", false, "(1,)", &[0u8; 8]);
        bytes[1] = b'X';
        assert!(matches!(
            parse_npy(&mut bytes.as_slice()),
            Err(NpyError::InvalidMagic)
        ));
    }

    #[test]
    fn test_read_file() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("poses_bounds.npy");

        let values = (0..34).map(|v| v as f64 * 0.5).collect::<Vec<_>>();
        let payload = values.iter().flat_map(|v| v.to_be_bytes()).collect::<Vec<_>>();
        std::fs::write(&path, npy_bytes(">f8", false, "(2, 17)", &payload))?;

        assert_eq!(read_npy(&path)?, NpyArray::new(vec![2, 17], values)?);
        Ok(())
    }

    #[test]
    fn test_array_shape_overflow() {
        assert!(matches!(
            NpyArray::new(vec![usize::MAX, 2], Vec::new()),
            Err(NpyError::MalformedHeader(_))
        ));
    }
}
