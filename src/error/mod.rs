//! # Error Module
//!
//! Error types for the artifact duplicate detector.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, artifact ids, what went wrong
//! - **Degrade, don't abort** - a broken image is skipped, not fatal

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum ArtifactMatchError {
    #[error("Descriptor error: {0}")]
    Describe(#[from] DescribeError),

    #[error("Matching error: {0}")]
    Match(#[from] MatchError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Bundle layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Report generation error: {0}")]
    Report(#[from] ReportError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while turning an image into a descriptor
#[derive(Error, Debug)]
pub enum DescribeError {
    #[error("Unsupported image format: {source_label}")]
    UnsupportedFormat { source_label: String },

    #[error("Failed to decode image {source_label}: {reason}")]
    DecodeError { source_label: String, reason: String },

    #[error("Image is empty or corrupted: {source_label}")]
    EmptyImage { source_label: String },

    #[error("Image {source_label} has {pixels} pixels, above the limit of {limit}")]
    TooLarge {
        source_label: String,
        pixels: u64,
        limit: u64,
    },

    #[error("Failed to open image file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while matching candidates against the corpus
#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Invalid threshold: {value} (must be a finite number >= 0)")]
    InvalidThreshold { value: f64 },

    #[error("Batch has {count} candidates, above the limit of {limit}")]
    BatchTooLarge { count: usize, limit: usize },
}

/// Errors that occur with the descriptor cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to open cache database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Cache corruption detected at {path}. Delete this file and try again.")]
    Corrupted { path: PathBuf },

    #[error("Failed to decode stored descriptor for {key}: {reason}")]
    InvalidDescriptor { key: String, reason: String },
}

/// Errors that occur while loading an artifact manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Artifact id {id} appears more than once in {path}")]
    DuplicateId { path: PathBuf, id: String },
}

/// Errors found while resolving the files of an extracted upload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Bundle directory not found: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Artifact {id} has no associated files")]
    NoFiles { id: String },

    #[error("Artifact {id} has no thumbnail")]
    NoThumbnail { id: String },

    #[error("Artifact {id} has more than one thumbnail: {files:?}")]
    MultipleThumbnails { id: String, files: Vec<String> },

    #[error("Artifact {id} has neither images nor a complete model (missing {missing:?})")]
    NoImagesOrModel { id: String, missing: Vec<String> },
}

impl LayoutError {
    /// The artifact the error is about, if any
    pub fn artifact_id(&self) -> Option<&str> {
        match self {
            LayoutError::RootNotFound { .. } => None,
            LayoutError::NoFiles { id }
            | LayoutError::NoThumbnail { id }
            | LayoutError::MultipleThumbnails { id, .. }
            | LayoutError::NoImagesOrModel { id, .. } => Some(id),
        }
    }
}

/// Errors that occur during report generation
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to generate report: {0}")]
    GenerationFailed(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ArtifactMatchError>;
