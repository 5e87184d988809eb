//! Compressed named-array archive used by the file transport.
//!
//! Layout of a `.tvba` file:
//! ```text
//! [0..4]   Magic: b"TVBA"
//! [4..6]   Version: u16 LE = 1
//! [6..]    LZ4 block (size-prefixed) of the bincode-encoded list of named arrays
//! ```
//!
//! A transport archive holds exactly two arrays: `time` (1-D) and `values` (N-D).
//! Readers must keep accepting version 1 archives.
use std::io::Write;
use std::path::Path;

use log::trace;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use crate::buffer::TimeValueBuffer;
use crate::error::{CosimError, Result};

const MAGIC: &[u8; 4] = b"TVBA";
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 6;

/// Name of the time array in a transport archive.
pub const TIME_KEY: &str = "time";
/// Name of the values array in a transport archive.
pub const VALUES_KEY: &str = "values";

/// A named, row-major N-dimensional array of floats.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NamedArray {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl NamedArray {
    /// Create a named array from an N-dimensional array (copied in logical order).
    pub fn from_array(name: &str, array: &ArrayD<f64>) -> Self {
        NamedArray {
            name: name.to_string(),
            shape: array.shape().to_vec(),
            data: array.iter().copied().collect(),
        }
    }

    /// Create a named 1-D array from a slice.
    pub fn from_slice(name: &str, data: &[f64]) -> Self {
        NamedArray {
            name: name.to_string(),
            shape: vec![data.len()],
            data: data.to_vec(),
        }
    }

    /// Returns the array as an N-dimensional array.
    pub fn to_array(&self) -> Result<ArrayD<f64>> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.data.clone()).map_err(|e| {
            CosimError::ArchiveError(format!("array {:?} is inconsistent: {}", self.name, e))
        })
    }
}

/// Encode named arrays into the archive format.
pub fn encode(arrays: &[NamedArray]) -> Result<Vec<u8>> {
    let payload =
        bincode::serialize(arrays).map_err(|e| CosimError::ArchiveError(e.to_string()))?;
    let compressed = lz4::block::compress(&payload, None, true)?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + compressed.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.extend_from_slice(&compressed);
    Ok(buf)
}

/// Decode named arrays from the archive format.
pub fn decode(bytes: &[u8]) -> Result<Vec<NamedArray>> {
    if bytes.len() < HEADER_SIZE {
        return Err(CosimError::ArchiveError(
            "data too short for header".to_string(),
        ));
    }
    if &bytes[0..4] != MAGIC {
        return Err(CosimError::ArchiveError(format!(
            "bad magic: expected TVBA, got {:?}",
            &bytes[0..4]
        )));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(CosimError::ArchiveError(format!(
            "unsupported archive version {}",
            version
        )));
    }

    let payload = lz4::block::decompress(&bytes[HEADER_SIZE..], None)
        .map_err(|e| CosimError::ArchiveError(format!("decompression failed: {}", e)))?;
    let arrays: Vec<NamedArray> =
        bincode::deserialize(&payload).map_err(|e| CosimError::ArchiveError(e.to_string()))?;

    for array in arrays.iter() {
        if array.shape.iter().product::<usize>() != array.data.len() {
            return Err(CosimError::ArchiveError(format!(
                "array {:?} has shape {:?} but {} values",
                array.name,
                array.shape,
                array.data.len()
            )));
        }
    }
    Ok(arrays)
}

/// Write named arrays to a file.
/// The archive is first written to a temporary file in the same directory, then renamed,
/// such that a concurrent reader never observes a partially written archive.
pub fn write_archive<P: AsRef<Path>>(path: P, arrays: &[NamedArray]) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode(arrays)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(&bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;

    trace!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Read named arrays from a file.
pub fn read_archive<P: AsRef<Path>>(path: P) -> Result<Vec<NamedArray>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    trace!("Read {} bytes from {}", bytes.len(), path.display());
    decode(&bytes)
}

/// Convert a buffer into the two arrays of a transport archive.
pub fn buffer_to_arrays(buffer: &TimeValueBuffer) -> [NamedArray; 2] {
    [
        NamedArray::from_slice(TIME_KEY, buffer.time()),
        NamedArray::from_array(VALUES_KEY, buffer.values()),
    ]
}

/// Convert the arrays of a transport archive back into a buffer.
pub fn arrays_to_buffer(arrays: &[NamedArray]) -> Result<TimeValueBuffer> {
    let find = |key: &str| {
        arrays
            .iter()
            .find(|array| array.name == key)
            .ok_or_else(|| CosimError::ArchiveError(format!("missing {:?} array", key)))
    };

    let time = find(TIME_KEY)?;
    if time.shape.len() != 1 {
        return Err(CosimError::ArchiveError(format!(
            "time array must be 1-D, got shape {:?}",
            time.shape
        )));
    }
    let values = find(VALUES_KEY)?.to_array()?;
    TimeValueBuffer::new(time.data.clone(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_encode_decode() {
        let arrays = vec![
            NamedArray::from_slice("time", &[0.0, 0.1, 0.2]),
            NamedArray::from_array("values", &array![[1.5, -2.0], [0.0, 1e-12], [3.0, f64::MAX]].into_dyn()),
        ];
        let bytes = encode(&arrays).unwrap();
        assert_eq!(&bytes[0..4], b"TVBA");
        assert_eq!(decode(&bytes).unwrap(), arrays);
    }

    #[test]
    fn test_decode_corrupt() {
        assert!(matches!(decode(b"TVB"), Err(CosimError::ArchiveError(_))));
        assert!(matches!(decode(b"NOPE\x01\x00abc"), Err(CosimError::ArchiveError(_))));
        assert!(matches!(decode(b"TVBA\x02\x00abc"), Err(CosimError::ArchiveError(_))));

        let mut bytes = encode(&[NamedArray::from_slice("time", &[1.0; 64])]).unwrap();
        bytes.truncate(bytes.len() / 2);
        assert!(matches!(decode(&bytes), Err(CosimError::ArchiveError(_))));
    }

    #[test]
    fn test_write_read_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.tvba");

        let buffer = TimeValueBuffer::new(vec![0.0, 1.0], array![[[1.0, 2.0]], [[3.0, 4.0]]].into_dyn()).unwrap();
        write_archive(&path, &buffer_to_arrays(&buffer)).unwrap();

        // no temporary file is left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let arrays = read_archive(&path).unwrap();
        assert_eq!(arrays_to_buffer(&arrays).unwrap(), buffer);
    }

    #[test]
    fn test_missing_arrays() {
        let arrays = vec![NamedArray::from_slice("time", &[0.0])];
        assert!(matches!(arrays_to_buffer(&arrays), Err(CosimError::ArchiveError(_))));
    }
}
