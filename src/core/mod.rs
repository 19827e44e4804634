//! # Core Module
//!
//! The matching engine, independent of any user interface.
//!
//! ## Modules
//! - `descriptor` - Computes zoned histogram descriptors from images
//! - `corpus` - Describes artifacts and holds the existing corpus
//! - `matcher` - Finds the nearest existing artifact for each candidate
//! - `cache` - Persists descriptors to avoid recomputation
//! - `layout` - Assigns the files of an extracted upload to artifact ids
//! - `pipeline` - Orchestrates a batch from description to report
//! - `reporter` - Explains outcomes and exports reports
//! - `resolution` - Maps reviewer decisions to ingest actions

pub mod cache;
pub mod corpus;
pub mod descriptor;
pub mod layout;
pub mod matcher;
pub mod pipeline;
pub mod reporter;
pub mod resolution;

// Re-export commonly used types
pub use corpus::{ArtifactImages, Corpus, DescribedArtifact};
pub use descriptor::{Descriptor, ImageSource};
pub use matcher::{DuplicateMatch, MatchOutcome, NoveltyReason};
pub use pipeline::{BatchReport, Pipeline};
pub use reporter::MatchExplanation;
pub use resolution::{IngestAction, Resolution};
