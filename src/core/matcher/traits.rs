//! Trait definitions for match decision strategies.

use crate::error::MatchError;

/// Acceptance threshold used by the catalog's bulk loader
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Strategy trait for deciding whether a nearest match is a duplicate
pub trait MatchStrategy: Send + Sync {
    /// Decide whether the nearest distance flags a possible duplicate
    fn is_duplicate(&self, distance: f64) -> bool;

    /// Get the threshold used
    fn threshold(&self) -> f64;

    /// Human-readable description of the strategy
    fn description(&self) -> String;
}

/// Strict threshold strategy: duplicate when `distance < threshold`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdStrategy {
    threshold: f64,
}

impl ThresholdStrategy {
    /// Create a threshold strategy.
    ///
    /// The threshold must be finite and not negative.
    pub fn new(threshold: f64) -> Result<Self, MatchError> {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(MatchError::InvalidThreshold { value: threshold });
        }
        Ok(Self { threshold })
    }
}

impl Default for ThresholdStrategy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl MatchStrategy for ThresholdStrategy {
    fn is_duplicate(&self, distance: f64) -> bool {
        distance < self.threshold
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn description(&self) -> String {
        format!(
            "Threshold strategy: artifacts with nearest distance < {} are possible duplicates",
            self.threshold
        )
    }
}
