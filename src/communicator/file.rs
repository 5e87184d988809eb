//! Communicators writing to and reading from named-array archives on disk.
use std::fmt;
use std::path::{Path, PathBuf};

use log::trace;

use crate::archive::{arrays_to_buffer, buffer_to_arrays, read_archive, write_archive};
use crate::buffer::TimeValueBuffer;
use crate::error::Result;

use super::{check_shape, Receiver, Sender};

/// Writes the data to an archive file, replacing any previous content atomically.
#[derive(Debug, PartialEq, Clone)]
pub struct WriterToFile {
    target: PathBuf,
    shape: Option<Vec<usize>>,
}

impl WriterToFile {
    pub fn new(target: PathBuf) -> Self {
        WriterToFile {
            target,
            shape: None,
        }
    }

    /// Only accept data with the given shape (without the time axis).
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl Sender for WriterToFile {
    fn send(&mut self, data: &TimeValueBuffer) -> Result<()> {
        check_shape(&self.shape, data)?;
        write_archive(&self.target, &buffer_to_arrays(data))?;
        trace!("{} time points written to {}", data.len(), self.target.display());
        Ok(())
    }
}

impl fmt::Display for WriterToFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Writer to file {}", self.target.display())
    }
}

/// Reads the data from an archive file. The file is left in place.
#[derive(Debug, PartialEq, Clone)]
pub struct ReaderFromFile {
    source: PathBuf,
    shape: Option<Vec<usize>>,
}

impl ReaderFromFile {
    pub fn new(source: PathBuf) -> Self {
        ReaderFromFile {
            source,
            shape: None,
        }
    }

    /// Only accept data with the given shape (without the time axis).
    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl Receiver for ReaderFromFile {
    fn receive(&mut self) -> Result<TimeValueBuffer> {
        let data = arrays_to_buffer(&read_archive(&self.source)?)?;
        check_shape(&self.shape, &data)?;
        trace!("{} time points read from {}", data.len(), self.source.display());
        Ok(data)
    }
}

impl fmt::Display for ReaderFromFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Reader from file {}", self.source.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CosimError;
    use ndarray::Array4;

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.tvba");

        let values = Array4::from_shape_fn((3, 2, 4, 1), |(t, v, r, _)| t as f64 * 0.5 - v as f64 + r as f64 * 1e-3);
        let data = TimeValueBuffer::new(vec![0.0, 0.1, 0.2], values.into_dyn()).unwrap();

        let mut writer = WriterToFile::new(path.clone()).with_shape(vec![2, 4, 1]);
        let mut reader = ReaderFromFile::new(path.clone()).with_shape(vec![2, 4, 1]);
        writer.send(&data).unwrap();
        assert_eq!(reader.receive().unwrap(), data);

        // overwritten, never appended
        writer.send(&data.shifted(0.3)).unwrap();
        assert_eq!(reader.receive().unwrap(), data.shifted(0.3));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = ReaderFromFile::new(dir.path().join("missing.tvba"));
        assert!(matches!(reader.receive(), Err(CosimError::IOError(_))));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.tvba");
        std::fs::write(&path, b"not an archive").unwrap();
        let mut reader = ReaderFromFile::new(path);
        assert!(matches!(reader.receive(), Err(CosimError::ArchiveError(_))));
    }

    #[test]
    fn test_writer_shape_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.tvba");
        let data = TimeValueBuffer::from_rows(vec![0.0], &[vec![1.0, 2.0]]).unwrap();

        let mut writer = WriterToFile::new(path.clone()).with_shape(vec![3]);
        assert!(matches!(writer.send(&data), Err(CosimError::ShapeMismatch(_))));
        assert!(!path.exists());
    }
}
