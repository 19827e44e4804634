//! # Resolution Module
//!
//! Turns human decisions on flagged candidates into ingest actions.
//!
//! | Outcome            | Decision  | Action                  |
//! |--------------------|-----------|-------------------------|
//! | novel              | -         | create new artifact     |
//! | possible duplicate | `replace` | replace existing        |
//! | possible duplicate | `keep`    | keep existing unchanged |
//! | possible duplicate | `new`     | create new artifact     |
//! | possible duplicate | none      | pending                 |

use crate::core::matcher::MatchOutcome;
use crate::core::pipeline::BatchReport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// A reviewer's decision on a possible duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Overwrite the existing artifact with the candidate
    Replace,
    /// Discard the candidate and keep the existing artifact
    Keep,
    /// The candidate is a different artifact after all
    New,
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(Resolution::Replace),
            "keep" => Ok(Resolution::Keep),
            "new" => Ok(Resolution::New),
            other => Err(format!(
                "unknown resolution '{}' (expected replace, keep or new)",
                other
            )),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Replace => write!(f, "replace"),
            Resolution::Keep => write!(f, "keep"),
            Resolution::New => write!(f, "new"),
        }
    }
}

/// What the ingest layer should do with one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum IngestAction {
    CreateNew { candidate_id: String },
    ReplaceExisting { candidate_id: String, existing_id: String },
    KeepExisting { candidate_id: String, existing_id: String },
}

/// Actions for decided candidates, plus the ones still awaiting review
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionPlan {
    /// In candidate order
    pub actions: Vec<IngestAction>,
    /// Possible duplicates without a decision
    pub pending: Vec<String>,
}

impl ResolutionPlan {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Map a batch report and decisions to ingest actions.
///
/// Decisions for novel candidates are ignored; they are always created.
pub fn plan_resolutions(
    report: &BatchReport,
    decisions: &HashMap<String, Resolution>,
) -> ResolutionPlan {
    let mut plan = ResolutionPlan::default();

    for candidate in &report.candidates {
        let candidate_id = candidate.id.clone();

        let existing_id = match &candidate.outcome {
            MatchOutcome::Novel { .. } => {
                plan.actions.push(IngestAction::CreateNew { candidate_id });
                continue;
            }
            MatchOutcome::PossibleDuplicate(m) => m.existing_id.clone(),
        };

        match decisions.get(&candidate.id) {
            Some(Resolution::Replace) => plan.actions.push(IngestAction::ReplaceExisting {
                candidate_id,
                existing_id,
            }),
            Some(Resolution::Keep) => plan.actions.push(IngestAction::KeepExisting {
                candidate_id,
                existing_id,
            }),
            Some(Resolution::New) => plan.actions.push(IngestAction::CreateNew { candidate_id }),
            None => plan.pending.push(candidate_id),
        }
    }

    plan
}
