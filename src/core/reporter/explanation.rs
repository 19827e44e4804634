//! Human-readable explanations for match outcomes.

use crate::core::matcher::{ImageRef, MatchOutcome, NoveltyReason};
use serde::{Deserialize, Serialize};

/// How close the nearest existing artifact is, relative to the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Closeness {
    /// Distance 0: the same zoned histograms
    Identical,
    /// Below half the threshold
    VeryClose,
    /// Below the threshold
    Close,
    /// Not below the threshold, but within twice of it
    Borderline,
    /// Twice the threshold or more
    Distant,
}

impl Closeness {
    /// Classify a distance against a threshold
    pub fn from_distance(distance: f64, threshold: f64) -> Self {
        if distance == 0.0 {
            Closeness::Identical
        } else if distance < threshold / 2.0 {
            Closeness::VeryClose
        } else if distance < threshold {
            Closeness::Close
        } else if distance < threshold * 2.0 {
            Closeness::Borderline
        } else {
            Closeness::Distant
        }
    }
}

impl std::fmt::Display for Closeness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Closeness::Identical => write!(f, "Identical"),
            Closeness::VeryClose => write!(f, "Very close"),
            Closeness::Close => write!(f, "Close"),
            Closeness::Borderline => write!(f, "Borderline"),
            Closeness::Distant => write!(f, "Distant"),
        }
    }
}

/// Which pictures produced the nearest distance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalDetails {
    pub distance: f64,
    pub threshold: f64,
    pub existing_image: ImageRef,
    pub candidate_image: ImageRef,
}

/// Explanation of one candidate's outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchExplanation {
    /// One-line summary
    pub summary: String,
    /// None when nothing was compared
    pub closeness: Option<Closeness>,
    /// Longer explanation for reviewers
    pub human_readable: String,
    /// Present for possible duplicates
    pub technical: Option<TechnicalDetails>,
}

/// Reporter that generates explanations for a fixed threshold
pub struct DetailedReporter {
    threshold: f64,
}

impl DetailedReporter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Explain one outcome
    pub fn explain(&self, outcome: &MatchOutcome) -> MatchExplanation {
        match outcome {
            MatchOutcome::PossibleDuplicate(m) => {
                let closeness = Closeness::from_distance(m.distance, self.threshold);
                MatchExplanation {
                    summary: format!(
                        "Possible duplicate of artifact {} (distance {:.4})",
                        m.existing_id, m.distance
                    ),
                    closeness: Some(closeness),
                    human_readable: self.duplicate_text(closeness, &m.candidate_image, &m.existing_image),
                    technical: Some(TechnicalDetails {
                        distance: m.distance,
                        threshold: self.threshold,
                        existing_image: m.existing_image.clone(),
                        candidate_image: m.candidate_image.clone(),
                    }),
                }
            }
            MatchOutcome::Novel { reason } => self.explain_novel(reason),
        }
    }

    fn explain_novel(&self, reason: &NoveltyReason) -> MatchExplanation {
        match reason {
            NoveltyReason::EmptyCorpus => MatchExplanation {
                summary: "New artifact".to_string(),
                closeness: None,
                human_readable: "The catalog has no artifact images to compare with yet.".to_string(),
                technical: None,
            },
            NoveltyReason::NoComparableImages => MatchExplanation {
                summary: "New artifact (not compared)".to_string(),
                closeness: None,
                human_readable: "None of this artifact's images could be read, so it was not \
                                 compared with the catalog. Check the uploaded files."
                    .to_string(),
                technical: None,
            },
            NoveltyReason::NoCloseMatch {
                nearest_id,
                nearest_distance,
            } => {
                let closeness = Closeness::from_distance(*nearest_distance, self.threshold);
                let human_readable = if closeness == Closeness::Borderline {
                    format!(
                        "The most similar catalog artifact is {} at distance {:.4}. This is close \
                         to the duplicate threshold of {}, so a quick visual check may be worthwhile.",
                        nearest_id, nearest_distance, self.threshold
                    )
                } else {
                    format!(
                        "The most similar catalog artifact is {} at distance {:.4}, well above \
                         the duplicate threshold of {}.",
                        nearest_id, nearest_distance, self.threshold
                    )
                };

                MatchExplanation {
                    summary: "New artifact".to_string(),
                    closeness: Some(closeness),
                    human_readable,
                    technical: None,
                }
            }
        }
    }

    fn duplicate_text(&self, closeness: Closeness, candidate: &ImageRef, existing: &ImageRef) -> String {
        match closeness {
            Closeness::Identical => format!(
                "The {} ({}) has exactly the same brightness layout as the existing {} ({}). \
                 It is most likely the same photograph uploaded again.",
                candidate.role, candidate.source, existing.role, existing.source
            ),
            _ => format!(
                "The {} ({}) closely resembles the existing {} ({}). Small differences \
                 usually come from re-compression, resizing or lighting. Compare both \
                 pictures and choose replace, keep or new.",
                candidate.role, candidate.source, existing.role, existing.source
            ),
        }
    }
}
