//! Batch report types.

use crate::core::corpus::SkippedImage;
use crate::core::matcher::MatchOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The outcome for one candidate artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReport {
    /// Candidate identifier (spreadsheet or manifest id)
    pub id: String,
    pub outcome: MatchOutcome,
    /// Images that produced a descriptor
    pub described_images: usize,
    /// Images that could not be described
    pub skipped: Vec<SkippedImage>,
}

/// A candidate left out of matching because its upload files are invalid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    pub id: String,
    pub reason: String,
}

/// Result of matching one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Threshold the batch was matched with
    pub threshold: f64,
    /// One report per candidate, in submission order
    pub candidates: Vec<CandidateReport>,
    /// Existing artifacts in the corpus
    pub corpus_artifacts: usize,
    /// Comparable descriptors in the corpus
    pub corpus_descriptors: usize,
    /// Descriptors served from the cache
    pub cache_hits: usize,
    /// Candidates that never reached matching, in id order
    #[serde(default)]
    pub rejected: Vec<RejectedCandidate>,
    /// Non-fatal errors (skipped images)
    pub errors: Vec<String>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl BatchReport {
    /// A report with no candidates
    pub fn empty(threshold: f64) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            created_at: Utc::now(),
            threshold,
            candidates: Vec::new(),
            corpus_artifacts: 0,
            corpus_descriptors: 0,
            cache_hits: 0,
            rejected: Vec::new(),
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Candidates flagged for review
    pub fn possible_duplicates(&self) -> impl Iterator<Item = &CandidateReport> + '_ {
        self.candidates.iter().filter(|c| c.outcome.is_duplicate())
    }

    pub fn duplicate_count(&self) -> usize {
        self.possible_duplicates().count()
    }

    pub fn novel_count(&self) -> usize {
        self.candidates.len() - self.duplicate_count()
    }

    /// Outcome per candidate id
    pub fn outcomes_by_id(&self) -> HashMap<&str, &MatchOutcome> {
        self.candidates
            .iter()
            .map(|c| (c.id.as_str(), &c.outcome))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::matcher::NoveltyReason;

    #[test]
    fn empty_report_has_fresh_id() {
        let a = BatchReport::empty(0.1);
        let b = BatchReport::empty(0.1);
        assert_ne!(a.batch_id, b.batch_id);
        assert_eq!(a.duplicate_count(), 0);
    }

    #[test]
    fn outcomes_are_keyed_by_candidate() {
        let mut report = BatchReport::empty(0.1);
        report.candidates.push(CandidateReport {
            id: "42".to_string(),
            outcome: MatchOutcome::Novel {
                reason: NoveltyReason::EmptyCorpus,
            },
            described_images: 2,
            skipped: Vec::new(),
        });

        let outcomes = report.outcomes_by_id();
        assert!(!outcomes["42"].is_duplicate());
        assert_eq!(report.novel_count(), 1);
    }

    #[test]
    fn report_serializes_to_json() {
        let report = BatchReport::empty(0.25);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"threshold\":0.25"));
        assert!(json.contains(&report.batch_id.to_string()));
    }
}
