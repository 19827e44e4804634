//! # Pipeline Module
//!
//! Orchestrates the matching of one bulk-upload batch.
//!
//! ## Pipeline Stages
//! 1. **Describe corpus** - Existing artifacts (skipped for a prebuilt `Corpus`)
//! 2. **Describe candidates** - Every thumbnail and image of the batch
//! 3. **Match** - Each candidate against the unchanged corpus
//! 4. **Report** - A `BatchReport` with one outcome per candidate
//!
//! ## Parallelism
//! Uses rayon for parallel description and matching. The corpus is
//! read-only for the whole batch.

mod executor;
mod report;

pub use executor::{BatchLimits, Pipeline, PipelineBuilder};
pub use report::{BatchReport, CandidateReport, RejectedCandidate};
