//! Pipeline execution implementation.

use super::{BatchReport, CandidateReport};
use crate::core::cache::{CacheBackend, InMemoryCache};
use crate::core::corpus::{ArtifactImages, Corpus, DescribeOutcome, Describer};
use crate::core::descriptor::DescribeOptions;
use crate::core::matcher::{DescriptorMatcher, MatchStrategy, ThresholdStrategy, DEFAULT_THRESHOLD};
use crate::error::{MatchError, Result};
use crate::events::{null_sender, BatchEvent, BatchPhase, BatchSummary, Event, EventSender};
use std::time::Instant;

/// Bounds on the work a single batch may cause
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchLimits {
    /// Reject batches with more candidates (None = unlimited)
    pub max_candidates: Option<usize>,
    /// Skip images with more pixels (None = unlimited)
    pub max_pixels_per_image: Option<u64>,
}

/// Configuration for the pipeline
#[derive(Debug, Clone)]
struct PipelineConfig {
    /// Acceptance threshold (strict `<`)
    threshold: f64,
    limits: BatchLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            limits: BatchLimits::default(),
        }
    }
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    config: PipelineConfig,
    cache: Option<Box<dyn CacheBackend>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            cache: None,
        }
    }

    /// Set the acceptance threshold
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the cache backend
    pub fn cache(mut self, cache: Box<dyn CacheBackend>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set all work limits
    pub fn limits(mut self, limits: BatchLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Reject batches with more candidates than this
    pub fn max_candidates(mut self, max: usize) -> Self {
        self.config.limits.max_candidates = Some(max);
        self
    }

    /// Skip images with more pixels than this
    pub fn max_pixels_per_image(mut self, max: u64) -> Self {
        self.config.limits.max_pixels_per_image = Some(max);
        self
    }

    /// Build the pipeline, validating the threshold
    pub fn build(self) -> std::result::Result<Pipeline, MatchError> {
        Ok(Pipeline {
            strategy: ThresholdStrategy::new(self.config.threshold)?,
            limits: self.config.limits,
            cache: self.cache.unwrap_or_else(|| Box::new(InMemoryCache::new())),
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The batch matching pipeline
pub struct Pipeline {
    strategy: ThresholdStrategy,
    limits: BatchLimits,
    cache: Box<dyn CacheBackend>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn threshold(&self) -> f64 {
        self.strategy.threshold()
    }

    pub fn limits(&self) -> BatchLimits {
        self.limits
    }

    /// The cache this pipeline reads and fills
    pub fn cache(&self) -> &dyn CacheBackend {
        self.cache.as_ref()
    }

    /// A describer using this pipeline's cache and pixel limit
    pub fn describer(&self) -> Describer<'_> {
        Describer::new(DescribeOptions {
            max_pixels: self.limits.max_pixels_per_image,
        })
        .with_cache(self.cache.as_ref())
    }

    /// Describe existing artifacts into a reusable corpus
    pub fn describe_corpus(&self, artifacts: &[ArtifactImages], events: &EventSender) -> (Corpus, DescribeOutcome) {
        let mut outcome = self.describer().describe_all(artifacts, events);
        let corpus = Corpus::new(std::mem::take(&mut outcome.artifacts));
        (corpus, outcome)
    }

    /// Describe the corpus and match a batch, without events
    pub fn run(&self, corpus: &[ArtifactImages], candidates: &[ArtifactImages]) -> Result<BatchReport> {
        self.run_with_events(corpus, candidates, &null_sender())
    }

    /// Describe the corpus and match a batch, with event reporting
    pub fn run_with_events(
        &self,
        corpus: &[ArtifactImages],
        candidates: &[ArtifactImages],
        events: &EventSender,
    ) -> Result<BatchReport> {
        let start_time = Instant::now();
        self.check_limits(candidates.len(), events)?;
        let mut report = self.start_batch(candidates.len(), events);

        events.send(Event::Batch(BatchEvent::PhaseChanged {
            phase: BatchPhase::DescribingCorpus,
        }));

        let (corpus, described) = self.describe_corpus(corpus, events);
        report.cache_hits += described.cache_hits;
        report
            .errors
            .extend(described.errors.into_iter().map(|e| format!("corpus {}", e)));

        Ok(self.finish_batch(report, &corpus, candidates, events, start_time))
    }

    /// Match a batch against an already described corpus
    pub fn run_against(
        &self,
        corpus: &Corpus,
        candidates: &[ArtifactImages],
        events: &EventSender,
    ) -> Result<BatchReport> {
        let start_time = Instant::now();
        self.check_limits(candidates.len(), events)?;
        let report = self.start_batch(candidates.len(), events);

        Ok(self.finish_batch(report, corpus, candidates, events, start_time))
    }

    fn check_limits(&self, candidates: usize, events: &EventSender) -> std::result::Result<(), MatchError> {
        if let Some(limit) = self.limits.max_candidates {
            if candidates > limit {
                let error = MatchError::BatchTooLarge {
                    count: candidates,
                    limit,
                };
                events.send(Event::Batch(BatchEvent::Error {
                    message: error.to_string(),
                }));
                return Err(error);
            }
        }
        Ok(())
    }

    fn start_batch(&self, candidates: usize, events: &EventSender) -> BatchReport {
        let report = BatchReport::empty(self.threshold());

        events.send(Event::Batch(BatchEvent::Started {
            batch_id: report.batch_id.to_string(),
            candidates,
        }));

        report
    }

    fn finish_batch(
        &self,
        mut report: BatchReport,
        corpus: &Corpus,
        candidates: &[ArtifactImages],
        events: &EventSender,
        start_time: Instant,
    ) -> BatchReport {
        // Phase: describing candidates
        events.send(Event::Batch(BatchEvent::PhaseChanged {
            phase: BatchPhase::DescribingCandidates,
        }));

        let described = self.describer().describe_all(candidates, events);
        report.cache_hits += described.cache_hits;
        report.errors.extend(described.errors);

        // Phase: matching
        events.send(Event::Batch(BatchEvent::PhaseChanged {
            phase: BatchPhase::Matching,
        }));

        let matcher = DescriptorMatcher::new(corpus, &self.strategy);
        let outcomes = matcher.classify_all_with_events(&described.artifacts, events);

        // Phase: reporting
        events.send(Event::Batch(BatchEvent::PhaseChanged {
            phase: BatchPhase::Reporting,
        }));

        report.corpus_artifacts = corpus.len();
        report.corpus_descriptors = matcher.corpus_descriptors();
        report.candidates = described
            .artifacts
            .into_iter()
            .zip(outcomes)
            .map(|(artifact, outcome)| CandidateReport {
                id: artifact.id,
                outcome,
                described_images: artifact.descriptors.len(),
                skipped: artifact.skipped,
            })
            .collect();
        report.duration_ms = start_time.elapsed().as_millis() as u64;

        tracing::info!(
            batch_id = %report.batch_id,
            candidates = report.candidates.len(),
            possible_duplicates = report.duplicate_count(),
            corpus_artifacts = report.corpus_artifacts,
            cache_hits = report.cache_hits,
            duration_ms = report.duration_ms,
            "batch matched"
        );

        events.send(Event::Batch(BatchEvent::Completed {
            summary: BatchSummary {
                candidates: report.candidates.len(),
                possible_duplicates: report.duplicate_count(),
                novel: report.novel_count(),
                corpus_artifacts: report.corpus_artifacts,
                cache_hits: report.cache_hits,
                duration_ms: report.duration_ms,
            },
        }));

        report
    }
}
