//! # Matcher Module
//!
//! Finds, for each candidate artifact, the closest existing artifact.
//!
//! ## How It Works
//! 1. Collect the comparable descriptors of the corpus (rows) and of
//!    one candidate (columns: thumbnail and every image)
//! 2. Compute the M x N matrix of Manhattan distances
//! 3. Take the global minimum over the whole matrix
//! 4. Flag a possible duplicate when the minimum is below the threshold
//!
//! Candidates are matched independently against the same corpus. Two
//! candidates of one batch are never compared with each other.

pub mod distance;
mod traits;

pub use distance::{manhattan, DistanceMatrix, MatrixMinimum};
pub use traits::{MatchStrategy, ThresholdStrategy, DEFAULT_THRESHOLD};

use crate::core::corpus::{Corpus, CorpusRow, DescribedArtifact, ImageRole, LabeledDescriptor};
use crate::events::{Event, EventSender, MatchEvent};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Identifies one picture taking part in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub role: ImageRole,
    /// Source label (path or buffer name)
    pub source: String,
}

impl From<&LabeledDescriptor> for ImageRef {
    fn from(labeled: &LabeledDescriptor) -> Self {
        Self {
            role: labeled.role,
            source: labeled.source.clone(),
        }
    }
}

/// The closest (existing, candidate) image pair of a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMatch {
    /// The existing artifact the closest descriptor belongs to
    pub existing_id: String,
    /// Manhattan distance of the pair
    pub distance: f64,
    pub existing_image: ImageRef,
    pub candidate_image: ImageRef,
}

/// Why a candidate was classified as novel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoveltyReason {
    /// The corpus has no comparable descriptors
    EmptyCorpus,
    /// None of the candidate's images could be described
    NoComparableImages,
    /// The nearest existing artifact is not close enough
    NoCloseMatch {
        nearest_id: String,
        nearest_distance: f64,
    },
}

impl std::fmt::Display for NoveltyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoveltyReason::EmptyCorpus => write!(f, "no existing artifacts to compare with"),
            NoveltyReason::NoComparableImages => write!(f, "no readable images"),
            NoveltyReason::NoCloseMatch {
                nearest_id,
                nearest_distance,
            } => write!(f, "nearest is {} at distance {:.4}", nearest_id, nearest_distance),
        }
    }
}

/// Classification of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Closest existing artifact is below the threshold; needs human review
    PossibleDuplicate(DuplicateMatch),
    /// No existing artifact is close enough
    Novel { reason: NoveltyReason },
}

impl MatchOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, MatchOutcome::PossibleDuplicate(_))
    }

    /// Matched existing artifact, for possible duplicates
    pub fn existing_id(&self) -> Option<&str> {
        match self {
            MatchOutcome::PossibleDuplicate(m) => Some(&m.existing_id),
            MatchOutcome::Novel { .. } => None,
        }
    }

    /// Distance to the nearest existing artifact, when one was compared
    pub fn nearest_distance(&self) -> Option<f64> {
        match self {
            MatchOutcome::PossibleDuplicate(m) => Some(m.distance),
            MatchOutcome::Novel {
                reason: NoveltyReason::NoCloseMatch {
                    nearest_distance, ..
                },
            } => Some(*nearest_distance),
            MatchOutcome::Novel { .. } => None,
        }
    }
}

/// Matches candidates against a fixed corpus
pub struct DescriptorMatcher<'a> {
    rows: Vec<CorpusRow<'a>>,
    strategy: &'a dyn MatchStrategy,
}

impl<'a> DescriptorMatcher<'a> {
    /// Prepare the corpus rows once for a whole batch
    pub fn new(corpus: &'a Corpus, strategy: &'a dyn MatchStrategy) -> Self {
        Self {
            rows: corpus.rows(),
            strategy,
        }
    }

    /// Number of comparable corpus descriptors
    pub fn corpus_descriptors(&self) -> usize {
        self.rows.len()
    }

    /// The closest (existing, candidate) pair, regardless of threshold
    pub fn nearest(&self, candidate: &DescribedArtifact) -> Option<DuplicateMatch> {
        let columns: Vec<&LabeledDescriptor> = candidate.comparable().collect();
        if self.rows.is_empty() || columns.is_empty() {
            return None;
        }

        let existing: Vec<_> = self.rows.iter().map(|row| &row.image.descriptor).collect();
        let new: Vec<_> = columns.iter().map(|labeled| &labeled.descriptor).collect();

        let minimum = DistanceMatrix::compute(&existing, &new).argmin()?;
        let row = &self.rows[minimum.row];

        Some(DuplicateMatch {
            existing_id: row.artifact_id.to_string(),
            distance: minimum.distance,
            existing_image: ImageRef::from(row.image),
            candidate_image: ImageRef::from(columns[minimum.col]),
        })
    }

    /// Classify one candidate
    pub fn classify(&self, candidate: &DescribedArtifact) -> MatchOutcome {
        if self.rows.is_empty() {
            return MatchOutcome::Novel {
                reason: NoveltyReason::EmptyCorpus,
            };
        }

        match self.nearest(candidate) {
            None => MatchOutcome::Novel {
                reason: NoveltyReason::NoComparableImages,
            },
            Some(nearest) if self.strategy.is_duplicate(nearest.distance) => {
                MatchOutcome::PossibleDuplicate(nearest)
            }
            Some(nearest) => MatchOutcome::Novel {
                reason: NoveltyReason::NoCloseMatch {
                    nearest_id: nearest.existing_id,
                    nearest_distance: nearest.distance,
                },
            },
        }
    }

    /// Classify every candidate in parallel, keeping input order
    pub fn classify_all(&self, candidates: &[DescribedArtifact]) -> Vec<MatchOutcome> {
        candidates.par_iter().map(|c| self.classify(c)).collect()
    }

    /// Classify every candidate and report each outcome as an event
    pub fn classify_all_with_events(
        &self,
        candidates: &[DescribedArtifact],
        events: &EventSender,
    ) -> Vec<MatchOutcome> {
        events.send(Event::Match(MatchEvent::Started {
            candidates: candidates.len(),
            corpus_descriptors: self.rows.len(),
        }));

        let outcomes = self.classify_all(candidates);

        for (candidate, outcome) in candidates.iter().zip(&outcomes) {
            match outcome {
                MatchOutcome::PossibleDuplicate(m) => {
                    events.send(Event::Match(MatchEvent::PossibleDuplicate {
                        candidate_id: candidate.id.clone(),
                        existing_id: m.existing_id.clone(),
                        distance: m.distance,
                    }))
                }
                MatchOutcome::Novel { .. } => events.send(Event::Match(MatchEvent::Novel {
                    candidate_id: candidate.id.clone(),
                })),
            }
        }

        let possible_duplicates = outcomes.iter().filter(|o| o.is_duplicate()).count();
        events.send(Event::Match(MatchEvent::Completed {
            possible_duplicates,
            novel: outcomes.len() - possible_duplicates,
        }));

        outcomes
    }
}
