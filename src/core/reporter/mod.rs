//! # Reporter Module
//!
//! Explains match outcomes to the people resolving a bulk upload.
//!
//! A possible duplicate is never acted on automatically. Reviewers need
//! to see which existing artifact was matched, through which pair of
//! pictures and how close the match was, before choosing replace, keep
//! or new.
//!
//! ## Outputs
//! 1. **Explanation**: summary and reviewer text per candidate
//! 2. **Export**: CSV for spreadsheets, JSON for other tools

mod explanation;
pub mod export;

pub use explanation::{Closeness, DetailedReporter, MatchExplanation, TechnicalDetails};
pub use export::{export_csv, export_json, export_to_file, ExportFormat};

use crate::core::pipeline::BatchReport;
use serde::{Deserialize, Serialize};

/// One candidate with its explanation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub candidate_id: String,
    /// Whether a human decision is required
    pub needs_decision: bool,
    pub explanation: MatchExplanation,
    /// Images of the candidate that could not be read
    pub skipped_images: Vec<String>,
}

/// Explain every candidate of a batch, possible duplicates first
pub fn review_items(report: &BatchReport) -> Vec<ReviewItem> {
    let reporter = DetailedReporter::new(report.threshold);

    let mut items: Vec<ReviewItem> = report
        .candidates
        .iter()
        .map(|candidate| ReviewItem {
            candidate_id: candidate.id.clone(),
            needs_decision: candidate.outcome.is_duplicate(),
            explanation: reporter.explain(&candidate.outcome),
            skipped_images: candidate
                .skipped
                .iter()
                .map(|s| format!("{}: {}", s.source, s.reason))
                .collect(),
        })
        .collect();

    // Stable: submission order is kept within each group
    items.sort_by_key(|item| !item.needs_decision);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::corpus::{ImageRole, SkippedImage};
    use crate::core::matcher::{DuplicateMatch, ImageRef, MatchOutcome, NoveltyReason};
    use crate::core::pipeline::CandidateReport;

    #[test]
    fn duplicates_are_listed_first() {
        let mut report = BatchReport::empty(0.1);
        let image = ImageRef {
            role: ImageRole::Thumbnail,
            source: "t.jpg".to_string(),
        };
        report.candidates = vec![
            CandidateReport {
                id: "1".to_string(),
                outcome: MatchOutcome::Novel {
                    reason: NoveltyReason::EmptyCorpus,
                },
                described_images: 1,
                skipped: vec![SkippedImage {
                    role: ImageRole::Image(1),
                    source: "1_1.jpg".to_string(),
                    reason: "truncated".to_string(),
                }],
            },
            CandidateReport {
                id: "2".to_string(),
                outcome: MatchOutcome::PossibleDuplicate(DuplicateMatch {
                    existing_id: "90".to_string(),
                    distance: 0.05,
                    existing_image: image.clone(),
                    candidate_image: image,
                }),
                described_images: 1,
                skipped: Vec::new(),
            },
        ];

        let items = review_items(&report);

        assert_eq!(items[0].candidate_id, "2");
        assert!(items[0].needs_decision);
        assert_eq!(items[1].skipped_images, vec!["1_1.jpg: truncated".to_string()]);
    }
}
