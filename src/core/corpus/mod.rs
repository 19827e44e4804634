//! # Corpus Module
//!
//! The described artifacts a batch is matched against, and the
//! described candidates of the batch itself.
//!
//! ## Sources
//! - `ArtifactImages` - thumbnail and image sources of one artifact
//! - `Corpus::from_entries` - descriptors that were persisted earlier
//! - `load_manifest` - a JSON list of artifacts (CLI input)
//!
//! ## Failure Policy
//! Images that cannot be described are kept as `SkippedImage`s with
//! the reason. They never take part in matching.

mod describer;
mod manifest;

pub use describer::{DescribeOutcome, Describer};
pub use manifest::{describe_entries, load_manifest, parse_manifest, ManifestEntry};

use crate::core::descriptor::{Descriptor, ImageSource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which picture of an artifact a descriptor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageRole {
    /// The artifact's thumbnail
    Thumbnail,
    /// Additional image, numbered from 1 in upload order
    Image(usize),
    /// Descriptor loaded from storage, numbered from 1 in stored order
    Stored(usize),
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageRole::Thumbnail => write!(f, "thumbnail"),
            ImageRole::Image(n) => write!(f, "image {}", n),
            ImageRole::Stored(n) => write!(f, "stored descriptor {}", n),
        }
    }
}

/// The image sources of one artifact
#[derive(Debug, Clone)]
pub struct ArtifactImages {
    /// Artifact identifier (catalog id or spreadsheet id)
    pub id: String,
    /// Thumbnail, if the artifact has one
    pub thumbnail: Option<ImageSource>,
    /// Additional images in upload order
    pub images: Vec<ImageSource>,
}

impl ArtifactImages {
    /// Create an artifact with no images yet
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thumbnail: None,
            images: Vec::new(),
        }
    }

    /// Set the thumbnail
    pub fn with_thumbnail(mut self, source: impl Into<ImageSource>) -> Self {
        self.thumbnail = Some(source.into());
        self
    }

    /// Append an additional image
    pub fn with_image(mut self, source: impl Into<ImageSource>) -> Self {
        self.images.push(source.into());
        self
    }

    /// Thumbnail first, then the images, each with its role
    pub fn sources(&self) -> impl Iterator<Item = (ImageRole, &ImageSource)> + '_ {
        self.thumbnail
            .iter()
            .map(|source| (ImageRole::Thumbnail, source))
            .chain(
                self.images
                    .iter()
                    .enumerate()
                    .map(|(i, source)| (ImageRole::Image(i + 1), source)),
            )
    }

    /// Number of image sources (thumbnail included)
    pub fn image_count(&self) -> usize {
        self.thumbnail.iter().count() + self.images.len()
    }
}

/// A descriptor together with the picture it was computed from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledDescriptor {
    pub role: ImageRole,
    /// Source label (path or buffer name)
    pub source: String,
    pub descriptor: Descriptor,
}

/// An image that could not be described
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedImage {
    pub role: ImageRole,
    pub source: String,
    pub reason: String,
}

/// An artifact after description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribedArtifact {
    pub id: String,
    /// Descriptors of the images that could be read
    pub descriptors: Vec<LabeledDescriptor>,
    /// Images that were skipped, with the reason
    pub skipped: Vec<SkippedImage>,
}

impl DescribedArtifact {
    /// Wrap descriptors that were persisted earlier
    pub fn from_descriptors(id: impl Into<String>, descriptors: Vec<Descriptor>) -> Self {
        let id = id.into();
        let descriptors = descriptors
            .into_iter()
            .enumerate()
            .map(|(i, descriptor)| LabeledDescriptor {
                role: ImageRole::Stored(i + 1),
                source: format!("{}#{}", id, i + 1),
                descriptor,
            })
            .collect();

        Self {
            id,
            descriptors,
            skipped: Vec::new(),
        }
    }

    /// Descriptors that take part in matching
    pub fn comparable(&self) -> impl Iterator<Item = &LabeledDescriptor> + '_ {
        self.descriptors
            .iter()
            .filter(|labeled| labeled.descriptor.is_comparable())
    }

    /// Whether at least one descriptor can be matched
    pub fn has_comparable(&self) -> bool {
        self.comparable().next().is_some()
    }
}

/// One comparable corpus descriptor and the artifact it belongs to
#[derive(Debug, Clone, Copy)]
pub struct CorpusRow<'a> {
    pub artifact_id: &'a str,
    pub image: &'a LabeledDescriptor,
}

/// The existing artifacts a batch is matched against.
///
/// Read-only during matching; a batch never adds to it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    artifacts: Vec<DescribedArtifact>,
}

impl Corpus {
    pub fn new(artifacts: Vec<DescribedArtifact>) -> Self {
        Self { artifacts }
    }

    /// Build a corpus from persisted `(artifact id, descriptors)` pairs
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Descriptor>)>,
        S: Into<String>,
    {
        Self {
            artifacts: entries
                .into_iter()
                .map(|(id, descriptors)| DescribedArtifact::from_descriptors(id, descriptors))
                .collect(),
        }
    }

    pub fn artifacts(&self) -> &[DescribedArtifact] {
        &self.artifacts
    }

    /// Number of artifacts
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Number of descriptors that take part in matching
    pub fn comparable_count(&self) -> usize {
        self.artifacts.iter().map(|a| a.comparable().count()).sum()
    }

    /// Comparable descriptors in artifact order, then image order
    pub fn rows(&self) -> Vec<CorpusRow<'_>> {
        self.artifacts
            .iter()
            .flat_map(|artifact| {
                artifact.comparable().map(move |image| CorpusRow {
                    artifact_id: &artifact.id,
                    image,
                })
            })
            .collect()
    }
}
