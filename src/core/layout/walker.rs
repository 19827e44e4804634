//! Listing the files of an extracted upload using walkdir.

use crate::error::LayoutError;
use std::path::{Component, Path};
use walkdir::WalkDir;

/// Files under a bundle root
#[derive(Debug, Default)]
pub struct BundleListing {
    /// Relative, `/`-separated paths with a leading `/`, sorted
    pub files: Vec<String>,
    /// Entries that could not be read, with the reason
    pub unreadable: Vec<String>,
}

/// Relative path of `path` under `root` in upload notation (`/dir/file.jpg`)
pub fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut name = String::new();

    for component in relative.components() {
        if let Component::Normal(part) = component {
            name.push('/');
            name.push_str(&part.to_string_lossy());
        }
    }

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// List every regular file under `root`, recursively
pub fn list_files(root: &Path) -> Result<BundleListing, LayoutError> {
    if !root.is_dir() {
        return Err(LayoutError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut listing = BundleListing::default();

    for entry_result in WalkDir::new(root).sort_by_file_name() {
        match entry_result {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Some(name) = relative_name(root, entry.path()) {
                    listing.files.push(name);
                }
            }
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                tracing::warn!(path = %path, error = %e, "unreadable entry in upload");
                listing.unreadable.push(format!("{}: {}", path, e));
            }
        }
    }

    Ok(listing)
}
