//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};

/// All events emitted by the batch matching pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Descriptor computation events (corpus and candidates)
    Describe(DescribeEvent),
    /// Matching phase events
    Match(MatchEvent),
    /// Batch-level events
    Batch(BatchEvent),
}

/// Events while computing descriptors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DescribeEvent {
    /// Describing has started
    Started { total_images: usize },
    /// Progress update while describing
    Progress(DescribeProgress),
    /// A descriptor was loaded from cache (no decoding needed)
    CacheHit { source: String },
    /// An image was skipped but describing continues
    Error { source: String, message: String },
    /// Describing completed
    Completed {
        total_described: usize,
        cache_hits: usize,
    },
}

/// Progress information while describing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeProgress {
    /// Number of images processed so far
    pub completed: usize,
    /// Total number of images to describe
    pub total: usize,
    /// Label of the image just processed
    pub current_source: String,
    /// Number of cache hits
    pub cache_hits: usize,
}

/// Events during the matching phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchEvent {
    /// Matching has started
    Started {
        candidates: usize,
        corpus_descriptors: usize,
    },
    /// A candidate was flagged as a possible duplicate
    PossibleDuplicate {
        candidate_id: String,
        existing_id: String,
        distance: f64,
    },
    /// A candidate was classified as novel
    Novel { candidate_id: String },
    /// Matching completed
    Completed {
        possible_duplicates: usize,
        novel: usize,
    },
}

/// Batch-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchEvent {
    /// A batch has started
    Started { batch_id: String, candidates: usize },
    /// Moving to a new phase
    PhaseChanged { phase: BatchPhase },
    /// Batch completed successfully
    Completed { summary: BatchSummary },
    /// Batch was rejected before any work
    Error { message: String },
}

/// Phases of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchPhase {
    DescribingCorpus,
    DescribingCandidates,
    Matching,
    Reporting,
}

/// Summary of batch results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Candidates in the batch
    pub candidates: usize,
    /// Candidates flagged as possible duplicates
    pub possible_duplicates: usize,
    /// Candidates classified as novel
    pub novel: usize,
    /// Existing artifacts in the corpus
    pub corpus_artifacts: usize,
    /// Descriptors read from cache instead of computed
    pub cache_hits: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchPhase::DescribingCorpus => write!(f, "Describing corpus"),
            BatchPhase::DescribingCandidates => write!(f, "Describing candidates"),
            BatchPhase::Matching => write!(f, "Matching"),
            BatchPhase::Reporting => write!(f, "Reporting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Describe(DescribeEvent::Progress(DescribeProgress {
            completed: 10,
            total: 50,
            current_source: "/upload/12_thumbnail.jpg".to_string(),
            cache_hits: 3,
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Describe(DescribeEvent::Progress(p)) => {
                assert_eq!(p.total, 50);
                assert_eq!(p.current_source, "/upload/12_thumbnail.jpg");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn batch_summary_is_serializable() {
        let summary = BatchSummary {
            candidates: 40,
            possible_duplicates: 3,
            novel: 37,
            corpus_artifacts: 12_000,
            cache_hits: 11_500,
            duration_ms: 5000,
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("11500"));
    }

    #[test]
    fn phase_display_is_readable() {
        assert_eq!(BatchPhase::DescribingCorpus.to_string(), "Describing corpus");
        assert_eq!(BatchPhase::Matching.to_string(), "Matching");
    }
}
