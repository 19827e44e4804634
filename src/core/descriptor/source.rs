//! Where image data comes from: a file path or an in-memory buffer.

use super::decode::{read_file_bytes, FileBytes};
use crate::error::DescribeError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use xxhash_rust::xxh3::xxh3_64;

/// A readable image supplied by the corpus or candidate supplier
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// An image file on disk
    Path(PathBuf),
    /// Image bytes already held in memory (e.g. read from an archive)
    Bytes {
        /// Display name used in reports and logs
        name: String,
        /// Encoded image data
        data: Arc<[u8]>,
    },
}

impl ImageSource {
    /// Create a source for a file on disk
    pub fn path(path: impl Into<PathBuf>) -> Self {
        ImageSource::Path(path.into())
    }

    /// Create a source for an in-memory buffer
    pub fn bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        ImageSource::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Human-readable label for this source
    pub fn label(&self) -> String {
        match self {
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Bytes { name, .. } => name.clone(),
        }
    }

    /// The file path, if this source lives on disk
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            ImageSource::Path(path) => Some(path),
            ImageSource::Bytes { .. } => None,
        }
    }

    /// Load the encoded bytes
    pub fn load(&self) -> Result<SourceBytes, DescribeError> {
        match self {
            ImageSource::Path(path) => Ok(SourceBytes::File(read_file_bytes(path)?)),
            ImageSource::Bytes { data, .. } => Ok(SourceBytes::Shared(Arc::clone(data))),
        }
    }

    /// Identity used to look the descriptor up in a cache.
    ///
    /// Files are keyed by canonical path and validated by size and
    /// modification time.
    /// Buffers are keyed by an xxh3 digest of their content.
    pub fn fingerprint(&self) -> Result<SourceFingerprint, DescribeError> {
        match self {
            ImageSource::Path(path) => {
                let metadata = std::fs::metadata(path).map_err(|e| DescribeError::IoError {
                    path: path.clone(),
                    source: e,
                })?;
                let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
                Ok(SourceFingerprint {
                    key: canonical.display().to_string(),
                    size: metadata.len(),
                    modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                })
            }
            ImageSource::Bytes { data, .. } => Ok(SourceFingerprint {
                key: format!("xxh3:{:016x}", xxh3_64(data)),
                size: data.len() as u64,
                modified: SystemTime::UNIX_EPOCH,
            }),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

/// Cache identity of an image source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFingerprint {
    /// Cache key (path or content digest)
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Modification time (UNIX epoch for in-memory buffers)
    pub modified: SystemTime,
}

/// Loaded image bytes, borrowed from a file read or a shared buffer
pub enum SourceBytes {
    File(FileBytes),
    Shared(Arc<[u8]>),
}

impl std::ops::Deref for SourceBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        match self {
            SourceBytes::File(bytes) => &bytes[..],
            SourceBytes::Shared(bytes) => &bytes[..],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn label_uses_path_or_name() {
        assert_eq!(ImageSource::path("/upload/7_1.jpg").label(), "/upload/7_1.jpg");
        assert_eq!(ImageSource::bytes("7_thumbnail.png", vec![1u8, 2]).label(), "7_thumbnail.png");
    }

    #[test]
    fn identical_buffers_share_a_fingerprint() {
        let a = ImageSource::bytes("a.png", vec![1u8, 2, 3]);
        let b = ImageSource::bytes("b.png", vec![1u8, 2, 3]);
        let c = ImageSource::bytes("c.png", vec![3u8, 2, 1]);

        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap().key, c.fingerprint().unwrap().key);
    }

    #[test]
    fn file_fingerprint_tracks_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1_thumbnail.jpg");
        std::fs::File::create(&path).unwrap().write_all(b"12345").unwrap();

        let fingerprint = ImageSource::path(&path).fingerprint().unwrap();
        assert_eq!(fingerprint.size, 5);
        assert_eq!(
            fingerprint.key,
            std::fs::canonicalize(&path).unwrap().display().to_string()
        );
    }

    #[test]
    fn file_fingerprint_ignores_path_spelling() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("upload")).unwrap();
        let path = temp_dir.path().join("upload").join("2_1.png");
        std::fs::write(&path, b"png").unwrap();
        let roundabout = temp_dir.path().join("upload").join("..").join("upload").join(".").join("2_1.png");

        let direct = ImageSource::path(&path).fingerprint().unwrap();
        let indirect = ImageSource::path(&roundabout).fingerprint().unwrap();

        assert_eq!(direct.key, indirect.key);
        assert!(Path::new(&direct.key).is_absolute());
    }

    #[test]
    fn missing_file_cannot_be_loaded() {
        let source = ImageSource::path("/nonexistent/1_thumbnail.jpg");
        assert!(source.load().is_err());
        assert!(source.fingerprint().is_err());
    }

    #[test]
    fn shared_bytes_load_without_copy() {
        let source = ImageSource::bytes("x.png", vec![9u8, 8, 7]);
        let loaded = source.load().unwrap();
        assert_eq!(&*loaded, &[9, 8, 7]);
    }
}
