//! JSON artifact manifests.
//!
//! ```json
//! [
//!   {"id": "123", "thumbnail": "photos/123_thumbnail.jpg", "images": ["photos/123_1.png"]},
//!   {"id": "124", "descriptors": [[0.0, 0.125, ...]]}
//! ]
//! ```
//!
//! Relative paths resolve against the manifest's directory. An entry may
//! carry already persisted `descriptors` instead of (or besides) images.

use super::{ArtifactImages, DescribeOutcome, DescribedArtifact, Describer};
use crate::core::descriptor::{Descriptor, ImageSource};
use crate::error::ManifestError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One artifact as written in a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    #[serde(default)]
    pub thumbnail: Option<PathBuf>,
    #[serde(default)]
    pub images: Vec<PathBuf>,
    #[serde(default)]
    pub descriptors: Vec<Descriptor>,
}

impl ManifestEntry {
    /// Image sources of this entry
    pub fn to_images(&self) -> ArtifactImages {
        let resolve = |path: &PathBuf| ImageSource::path(path.clone());

        ArtifactImages {
            id: self.id.clone(),
            thumbnail: self.thumbnail.as_ref().map(resolve),
            images: self.images.iter().map(resolve).collect(),
        }
    }

    /// The persisted descriptors, if any
    pub fn to_described(&self) -> Option<DescribedArtifact> {
        if self.descriptors.is_empty() {
            None
        } else {
            Some(DescribedArtifact::from_descriptors(
                self.id.clone(),
                self.descriptors.clone(),
            ))
        }
    }
}

/// Describe manifest entries, keeping their persisted descriptors.
///
/// Stored descriptors come first, then those of the listed images.
/// Artifacts keep manifest order.
pub fn describe_entries(
    entries: &[ManifestEntry],
    describer: &Describer<'_>,
    events: &EventSender,
) -> DescribeOutcome {
    let images: Vec<ArtifactImages> = entries.iter().map(ManifestEntry::to_images).collect();
    let mut outcome = describer.describe_all(&images, events);

    for (entry, described) in entries.iter().zip(outcome.artifacts.iter_mut()) {
        if let Some(mut stored) = entry.to_described() {
            stored.descriptors.append(&mut described.descriptors);
            stored.skipped.append(&mut described.skipped);
            *described = stored;
        }
    }

    outcome
}

/// Read and validate a manifest file
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_manifest(&text, path)
}

/// Parse manifest text; `path` is used to resolve relative image paths
pub fn parse_manifest(text: &str, path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let mut entries: Vec<ManifestEntry> =
        serde_json::from_str(text).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.id.as_str()) {
            return Err(ManifestError::DuplicateId {
                path: path.to_path_buf(),
                id: entry.id.clone(),
            });
        }
    }

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for entry in &mut entries {
        if let Some(thumbnail) = entry.thumbnail.take() {
            entry.thumbnail = Some(base.join(thumbnail));
        }
        for image in &mut entry.images {
            *image = base.join(&*image);
        }
    }

    tracing::debug!(path = %path.display(), artifacts = entries.len(), "loaded manifest");
    Ok(entries)
}
