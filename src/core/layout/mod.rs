//! # Layout Module
//!
//! Groups the files of an extracted bulk upload by artifact id.
//!
//! ## Assignment Rules
//! - A file belongs to id `X` when its path contains a separator,
//!   optional leading zeros, `X`, then one of `. , / _ \ -`
//!   (`/pieces/007_thumbnail.jpg` belongs to `7`)
//! - Ids are processed in the given order; a file assigned to an earlier
//!   id is not considered again
//! - `thumbnail` in the path marks the thumbnail (exactly one required)
//! - `obj` in the path marks 3D model files (`.obj`, `.mtl`, `.jpg` texture)
//! - Other `jpg`/`png` files are additional images
//!
//! An artifact needs at least one image or a complete model.

mod walker;

pub use walker::{list_files, relative_name, BundleListing};

use crate::core::corpus::ArtifactImages;
use crate::core::descriptor::ImageSource;
use crate::core::pipeline::RejectedCandidate;
use crate::error::LayoutError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 3D model files of one artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFiles {
    /// Every assigned file whose path contains `obj`
    pub files: Vec<String>,
}

impl ModelFiles {
    fn with_suffix(&self, suffix: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|file| file.ends_with(suffix))
            .map(String::as_str)
    }

    /// The `.obj` mesh
    pub fn mesh(&self) -> Option<&str> {
        self.with_suffix(".obj")
    }

    /// The `.mtl` material
    pub fn material(&self) -> Option<&str> {
        self.with_suffix(".mtl")
    }

    /// The `.jpg` texture
    pub fn texture(&self) -> Option<&str> {
        self.with_suffix(".jpg")
    }

    /// Missing parts, as file suffixes
    pub fn missing(&self) -> Vec<String> {
        [
            (".obj", self.mesh()),
            (".mtl", self.material()),
            (".jpg", self.texture()),
        ]
        .into_iter()
        .filter(|(_, found)| found.is_none())
        .map(|(suffix, _)| suffix.to_string())
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }
}

/// The validated files of one candidate artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub id: String,
    /// Relative path of the thumbnail
    pub thumbnail: String,
    /// Relative paths of the additional images
    pub images: Vec<String>,
    pub model: ModelFiles,
}

impl ArtifactBundle {
    /// Absolute path of a relative bundle file
    pub fn resolve(root: &Path, relative: &str) -> PathBuf {
        root.join(relative.trim_start_matches('/'))
    }

    /// Image sources for description; paths resolve against `root`
    pub fn to_images(&self, root: &Path) -> ArtifactImages {
        ArtifactImages {
            id: self.id.clone(),
            thumbnail: Some(ImageSource::path(Self::resolve(root, &self.thumbnail))),
            images: self
                .images
                .iter()
                .map(|image| ImageSource::path(Self::resolve(root, image)))
                .collect(),
        }
    }
}

/// Outcome of resolving an upload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutReport {
    pub root: PathBuf,
    /// Valid artifacts, in id order
    pub bundles: Vec<ArtifactBundle>,
    /// Every validation failure (an id may fail more than one rule)
    #[serde(skip)]
    pub errors: Vec<LayoutError>,
    /// Files not assigned to any id
    pub unassigned: Vec<String>,
    /// Entries that could not be read
    pub unreadable: Vec<String>,
}

impl LayoutReport {
    /// Whether every id resolved to a valid bundle
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Image sources of the valid artifacts
    pub fn artifact_images(&self) -> Vec<ArtifactImages> {
        self.bundles
            .iter()
            .map(|bundle| bundle.to_images(&self.root))
            .collect()
    }

    /// Error messages, for display
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    /// Invalid ids with the reasons they were left out.
    ///
    /// An id failing several rules appears once per failure.
    pub fn rejected(&self) -> Vec<RejectedCandidate> {
        self.errors
            .iter()
            .filter_map(|error| {
                error.artifact_id().map(|id| RejectedCandidate {
                    id: id.to_string(),
                    reason: error.to_string(),
                })
            })
            .collect()
    }
}

/// Pattern matching the files of one id
fn id_pattern(id: &str) -> Option<Regex> {
    Regex::new(&format!(r"^.*[/\\]+0*{}[.,/_\\-]+.*$", regex::escape(id))).ok()
}

/// Assign listed files to ids and validate each artifact
pub fn assign_files(files: &[String], ids: &[String]) -> (Vec<ArtifactBundle>, Vec<LayoutError>, Vec<String>) {
    let mut remaining: Vec<&String> = files.iter().collect();
    let mut bundles = Vec::new();
    let mut errors = Vec::new();

    for id in ids {
        let Some(pattern) = id_pattern(id) else {
            errors.push(LayoutError::NoFiles { id: id.clone() });
            continue;
        };
        let (assigned, rest): (Vec<&String>, Vec<&String>) =
            remaining.into_iter().partition(|file| pattern.is_match(file));
        remaining = rest;

        if assigned.is_empty() {
            errors.push(LayoutError::NoFiles { id: id.clone() });
            continue;
        }

        let thumbnails: Vec<&String> = assigned
            .iter()
            .copied()
            .filter(|file| file.contains("thumbnail"))
            .collect();
        let model = ModelFiles {
            files: assigned
                .iter()
                .filter(|file| file.contains("obj"))
                .map(|file| file.to_string())
                .collect(),
        };
        let images: Vec<String> = assigned
            .iter()
            .map(|file| file.as_str())
            .filter(|file| file.contains("jpg") || file.contains("png"))
            .filter(|file| {
                !thumbnails.iter().any(|t| t.as_str() == *file)
                    && !model.files.iter().any(|m| m.as_str() == *file)
            })
            .map(str::to_string)
            .collect();

        let error_count = errors.len();

        match thumbnails.len() {
            0 => errors.push(LayoutError::NoThumbnail { id: id.clone() }),
            1 => {}
            _ => errors.push(LayoutError::MultipleThumbnails {
                id: id.clone(),
                files: thumbnails.iter().map(|file| file.to_string()).collect(),
            }),
        }

        if images.is_empty() && !model.is_complete() {
            errors.push(LayoutError::NoImagesOrModel {
                id: id.clone(),
                missing: model.missing(),
            });
        }

        if errors.len() == error_count {
            bundles.push(ArtifactBundle {
                id: id.clone(),
                thumbnail: thumbnails[0].to_string(),
                images,
                model,
            });
        }
    }

    let unassigned = remaining.into_iter().cloned().collect();
    (bundles, errors, unassigned)
}

/// Resolve an extracted upload into validated artifact bundles
pub fn resolve_bundle(root: &Path, ids: &[String]) -> Result<LayoutReport, LayoutError> {
    let listing = list_files(root)?;
    let (bundles, errors, unassigned) = assign_files(&listing.files, ids);

    for error in &errors {
        tracing::warn!(error = %error, "invalid artifact in upload");
    }
    tracing::info!(
        root = %root.display(),
        valid = bundles.len(),
        invalid = ids.len() - bundles.len(),
        "resolved upload layout"
    );

    Ok(LayoutReport {
        root: root.to_path_buf(),
        bundles,
        errors,
        unassigned,
        unreadable: listing.unreadable,
    })
}
