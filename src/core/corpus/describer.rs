//! Parallel, cache-aware description of artifacts.

use super::{ArtifactImages, DescribedArtifact, ImageRole, LabeledDescriptor, SkippedImage};
use crate::core::cache::{CacheBackend, CacheEntry};
use crate::core::descriptor::{
    check_pixel_limit, try_describe_source, DescribeOptions, Descriptor, ImageSource,
};
use crate::error::DescribeError;
use crate::events::{DescribeEvent, DescribeProgress, Event, EventSender};
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Result of describing a set of artifacts
#[derive(Debug, Default)]
pub struct DescribeOutcome {
    /// One entry per input artifact, in input order
    pub artifacts: Vec<DescribedArtifact>,
    /// Descriptors served from the cache
    pub cache_hits: usize,
    /// Reasons for every skipped image
    pub errors: Vec<String>,
}

/// Computes descriptors for artifacts, consulting an optional cache
pub struct Describer<'a> {
    cache: Option<&'a dyn CacheBackend>,
    options: DescribeOptions,
}

struct ImageJob<'s> {
    artifact: usize,
    role: ImageRole,
    source: &'s ImageSource,
}

struct ImageResult {
    artifact: usize,
    role: ImageRole,
    label: String,
    descriptor: Result<Descriptor, String>,
    fresh_entry: Option<CacheEntry>,
}

impl<'a> Describer<'a> {
    pub fn new(options: DescribeOptions) -> Self {
        Self {
            cache: None,
            options,
        }
    }

    /// Use a cache for lookups and to store new descriptors
    pub fn with_cache(mut self, cache: &'a dyn CacheBackend) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Describe one source. Returns the descriptor and whether it came from cache.
    ///
    /// The new descriptor is not written back; see `describe_all`.
    pub fn describe_one(&self, source: &ImageSource) -> Result<(Descriptor, bool), DescribeError> {
        let (descriptor, cached, _) = self.lookup_or_compute(source)?;
        Ok((descriptor, cached))
    }

    fn lookup_or_compute(
        &self,
        source: &ImageSource,
    ) -> Result<(Descriptor, bool, Option<CacheEntry>), DescribeError> {
        let fingerprint = match self.cache {
            Some(_) => source.fingerprint().ok(),
            None => None,
        };

        if let (Some(cache), Some(fp)) = (self.cache, fingerprint.as_ref()) {
            match cache.get(&fp.key, fp.size, fp.modified) {
                Ok(Some(entry)) if entry.descriptor.is_comparable() => {
                    // The pixel limit applies to cached images too
                    if self.options.max_pixels.is_some() {
                        let bytes = source.load()?;
                        check_pixel_limit(&bytes, &source.label(), &self.options)?;
                    }
                    return Ok((entry.descriptor, true, None));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(source = %fp.key, error = %e, "descriptor cache lookup failed"),
            }
        }

        let descriptor = try_describe_source(source, &self.options)?;
        let fresh_entry = fingerprint
            .map(|fp| CacheEntry::new(fp.key, descriptor.clone(), fp.size, fp.modified));

        Ok((descriptor, false, fresh_entry))
    }

    /// Describe every image of every artifact in parallel.
    ///
    /// Images that fail are recorded as skipped and reported as
    /// `DescribeEvent::Error`; they never fail the whole call.
    pub fn describe_all(&self, artifacts: &[ArtifactImages], events: &EventSender) -> DescribeOutcome {
        let jobs: Vec<ImageJob<'_>> = artifacts
            .iter()
            .enumerate()
            .flat_map(|(index, artifact)| {
                artifact.sources().map(move |(role, source)| ImageJob {
                    artifact: index,
                    role,
                    source,
                })
            })
            .collect();

        let total = jobs.len();
        events.send(Event::Describe(DescribeEvent::Started { total_images: total }));

        let completed = AtomicUsize::new(0);
        let cache_hits = AtomicUsize::new(0);

        let results: Vec<ImageResult> = jobs
            .par_iter()
            .map(|job| {
                let label = job.source.label();
                let outcome = self.lookup_or_compute(job.source);
                let current_completed = completed.fetch_add(1, Ordering::SeqCst) + 1;

                match outcome {
                    Ok((descriptor, cached, fresh_entry)) => {
                        if cached {
                            cache_hits.fetch_add(1, Ordering::SeqCst);
                            events.send(Event::Describe(DescribeEvent::CacheHit {
                                source: label.clone(),
                            }));
                        } else {
                            tracing::debug!(source = %label, role = %job.role, "described image");
                        }

                        events.send(Event::Describe(DescribeEvent::Progress(DescribeProgress {
                            completed: current_completed,
                            total,
                            current_source: label.clone(),
                            cache_hits: cache_hits.load(Ordering::SeqCst),
                        })));

                        ImageResult {
                            artifact: job.artifact,
                            role: job.role,
                            label,
                            descriptor: Ok(descriptor),
                            fresh_entry,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(source = %label, error = %e, "skipping unreadable image");
                        events.send(Event::Describe(DescribeEvent::Error {
                            source: label.clone(),
                            message: e.to_string(),
                        }));

                        ImageResult {
                            artifact: job.artifact,
                            role: job.role,
                            label,
                            descriptor: Err(e.to_string()),
                            fresh_entry: None,
                        }
                    }
                }
            })
            .collect();

        let mut described: Vec<DescribedArtifact> = artifacts
            .iter()
            .map(|artifact| DescribedArtifact {
                id: artifact.id.clone(),
                descriptors: Vec::new(),
                skipped: Vec::new(),
            })
            .collect();

        let mut fresh_entries = Vec::new();
        let mut errors = Vec::new();

        for result in results {
            let target = &mut described[result.artifact];
            match result.descriptor {
                Ok(descriptor) => target.descriptors.push(LabeledDescriptor {
                    role: result.role,
                    source: result.label,
                    descriptor,
                }),
                Err(reason) => {
                    errors.push(format!("{} ({}): {}", target.id, result.role, reason));
                    target.skipped.push(SkippedImage {
                        role: result.role,
                        source: result.label,
                        reason,
                    });
                }
            }
            fresh_entries.extend(result.fresh_entry);
        }

        if let Some(cache) = self.cache {
            if !fresh_entries.is_empty() {
                if let Err(e) = cache.set_batch(&fresh_entries) {
                    tracing::warn!(error = %e, entries = fresh_entries.len(), "failed to store descriptors in cache");
                }
            }
        }

        let cache_hits = cache_hits.load(Ordering::SeqCst);
        let total_described = described.iter().map(|a| a.descriptors.len()).sum();

        events.send(Event::Describe(DescribeEvent::Completed {
            total_described,
            cache_hits,
        }));

        DescribeOutcome {
            artifacts: described,
            cache_hits,
            errors,
        }
    }
}

impl Default for Describer<'_> {
    fn default() -> Self {
        Self::new(DescribeOptions::default())
    }
}
