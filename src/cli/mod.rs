//! CLI implementation for artifact-match.

use artifact_dedup::core::cache::{CacheBackend, InMemoryCache, SqliteCache};
use artifact_dedup::core::corpus::{
    describe_entries, load_manifest, ArtifactImages, Corpus, Describer, ManifestEntry,
};
use artifact_dedup::core::descriptor::{DescribeOptions, ImageSource, BINS_PER_ZONE};
use artifact_dedup::core::layout::resolve_bundle;
use artifact_dedup::core::matcher::{MatchOutcome, DEFAULT_THRESHOLD};
use artifact_dedup::core::pipeline::{BatchReport, Pipeline, RejectedCandidate};
use artifact_dedup::core::reporter::{export_to_file, review_items, ExportFormat};
use artifact_dedup::core::resolution::{plan_resolutions, IngestAction, Resolution};
use artifact_dedup::error::{ArtifactMatchError, ReportError};
use artifact_dedup::events::{BatchEvent, DescribeEvent, Event, EventChannel, EventSender, MatchEvent};
use artifact_dedup::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread;

/// Environment variable overriding the default acceptance threshold
const THRESHOLD_ENV: &str = "ARTIFACT_MATCH_THRESHOLD";

/// Flag possible duplicates in a bulk artifact upload
#[derive(Parser)]
#[command(name = "artifact-match")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the descriptor of one or more images
    Describe {
        /// Image files to describe
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        output: DescribeFormat,

        /// Skip images with more pixels than this
        #[arg(long)]
        max_pixels: Option<u64>,
    },

    /// Match a batch of candidate artifacts against the existing corpus
    Match {
        /// Manifest of existing artifacts
        #[arg(long)]
        corpus: PathBuf,

        /// Manifest of candidate artifacts
        #[arg(long, conflicts_with = "bundle_dir", required_unless_present = "bundle_dir")]
        candidates: Option<PathBuf>,

        /// Extracted upload directory holding the candidate files
        #[arg(long, requires = "ids")]
        bundle_dir: Option<PathBuf>,

        /// Candidate ids, in spreadsheet order
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        /// Nearest distance below which a candidate is a possible duplicate
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD, env = THRESHOLD_ENV)]
        threshold: f64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        output: OutputFormat,

        /// Path to the descriptor cache database
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Describe everything from scratch without a persistent cache
        #[arg(long, conflicts_with = "cache")]
        no_cache: bool,

        /// Reject batches with more candidates than this
        #[arg(long)]
        max_candidates: Option<usize>,

        /// Skip images with more pixels than this
        #[arg(long)]
        max_pixels: Option<u64>,

        /// Also write the report as CSV
        #[arg(long)]
        export_csv: Option<PathBuf>,

        /// Show detailed explanations and per-image progress
        #[arg(short, long)]
        verbose: bool,
    },

    /// Turn reviewer decisions into ingest actions
    Resolve {
        /// JSON batch report written by `match --output json`
        #[arg(long)]
        report: PathBuf,

        /// Decisions as ID=replace|keep|new
        #[arg(short, long, value_parser = parse_decision)]
        decision: Vec<(String, Resolution)>,
    },

    /// Manage the descriptor cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,

        /// Path to the descriptor cache database
        #[arg(long, global = true)]
        cache: Option<PathBuf>,
    },
}

#[derive(Subcommand, Clone, Copy)]
enum CacheAction {
    /// Show entry count, size and age
    Stats,
    /// Remove every entry
    Clear,
    /// Remove entries for files that no longer exist
    Prune,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (just the possible duplicates)
    Minimal,
}

#[derive(Clone, Copy, ValueEnum)]
enum DescribeFormat {
    Pretty,
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Describe {
            images,
            output,
            max_pixels,
        } => describe_command(&images, output, max_pixels),
        Commands::Match {
            corpus,
            candidates,
            bundle_dir,
            ids,
            threshold,
            output,
            cache,
            no_cache,
            max_candidates,
            max_pixels,
            export_csv,
            verbose,
        } => {
            let candidates = match (candidates, bundle_dir) {
                (Some(manifest), _) => CandidateSource::Manifest(manifest),
                (None, Some(root)) => CandidateSource::Bundle { root, ids },
                (None, None) => {
                    return Err(ArtifactMatchError::Config(
                        "either --candidates or --bundle-dir is required".to_string(),
                    ))
                }
            };
            let options = MatchOptions {
                threshold,
                output,
                cache: if no_cache {
                    None
                } else {
                    Some(cache.unwrap_or_else(default_cache_path))
                },
                max_candidates,
                max_pixels,
                export_csv,
                verbose,
            };
            match_command(&corpus, candidates, options)
        }
        Commands::Resolve { report, decision } => resolve_command(&report, decision),
        Commands::Cache { action, cache } => {
            cache_command(action, &cache.unwrap_or_else(default_cache_path))
        }
    }
}

fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("artifact-dedup")
        .join("descriptors.db")
}

fn parse_decision(s: &str) -> std::result::Result<(String, Resolution), String> {
    let (id, resolution) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=DECISION, got '{}'", s))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing candidate id in '{}'", s));
    }
    Ok((id.to_string(), resolution.parse()?))
}

// ---------------------------------------------------------------------------
// describe
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DescribedImage {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    descriptor: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn describe_command(images: &[PathBuf], output: DescribeFormat, max_pixels: Option<u64>) -> Result<()> {
    let describer = Describer::new(DescribeOptions { max_pixels });

    let described: Vec<DescribedImage> = images
        .iter()
        .map(|path| {
            let source = ImageSource::path(path);
            match describer.describe_one(&source) {
                Ok((descriptor, _)) => DescribedImage {
                    source: source.label(),
                    descriptor: Some(descriptor.values().to_vec()),
                    error: None,
                },
                Err(e) => DescribedImage {
                    source: source.label(),
                    descriptor: None,
                    error: Some(e.to_string()),
                },
            }
        })
        .collect();

    match output {
        DescribeFormat::Json => print_json(&described)?,
        DescribeFormat::Pretty => {
            for image in &described {
                println!("{}", style(&image.source).bold());
                match (&image.descriptor, &image.error) {
                    (Some(values), _) => {
                        for (zone, bins) in values.chunks(BINS_PER_ZONE).enumerate() {
                            let row: Vec<String> = bins.iter().map(|v| format!("{:.3}", v)).collect();
                            println!("  zone {:>2}: {}", zone, row.join(" "));
                        }
                    }
                    (None, Some(error)) => println!("  {} {}", style("✗").red(), error),
                    (None, None) => {}
                }
                println!();
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// match
// ---------------------------------------------------------------------------

enum CandidateSource {
    Manifest(PathBuf),
    Bundle { root: PathBuf, ids: Vec<String> },
}

struct MatchOptions {
    threshold: f64,
    output: OutputFormat,
    cache: Option<PathBuf>,
    max_candidates: Option<usize>,
    max_pixels: Option<u64>,
    export_csv: Option<PathBuf>,
    verbose: bool,
}

fn match_command(corpus_manifest: &Path, candidates: CandidateSource, options: MatchOptions) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(options.output, OutputFormat::Pretty);

    if pretty {
        term.write_line(&format!(
            "\n{} {}\n",
            style("Artifact Match").bold().cyan(),
            style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
    }

    let cache: Box<dyn CacheBackend> = match &options.cache {
        Some(path) => Box::new(SqliteCache::open_with_prune(path)?),
        None => Box::new(InMemoryCache::new()),
    };

    let mut builder = Pipeline::builder().threshold(options.threshold).cache(cache);
    if let Some(max) = options.max_candidates {
        builder = builder.max_candidates(max);
    }
    if let Some(max) = options.max_pixels {
        builder = builder.max_pixels_per_image(max);
    }
    let pipeline = builder.build()?;

    let corpus_entries = load_manifest(corpus_manifest)?;
    let batch = load_candidates(candidates)?;

    if pretty {
        term.write_line(&format!(
            "Matching {} candidates against {} existing artifacts (threshold {})\n",
            style(batch.images.len()).bold(),
            style(corpus_entries.len()).bold(),
            style(pipeline.threshold()).bold()
        ))
        .ok();
    }

    let (sender, receiver) = EventChannel::new();
    let progress = if pretty { Some(progress_bar()) } else { None };

    let progress_handle = {
        let progress = progress.clone();
        let verbose = options.verbose;
        thread::spawn(move || {
            for event in receiver.iter() {
                if let Some(ref pb) = progress {
                    update_progress(pb, &event, verbose);
                }
            }
        })
    };

    let result = run_batch(&pipeline, &corpus_entries, &batch, &sender);

    drop(sender);
    progress_handle.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report = result?;

    if let Some(path) = &options.export_csv {
        export_to_file(&report, path, ExportFormat::Csv)?;
        if pretty {
            term.write_line(&format!("CSV report written to {}\n", style(path.display()).cyan()))
                .ok();
        }
    }

    match options.output {
        OutputFormat::Pretty => print_pretty(&report, options.verbose),
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Minimal => print_minimal(&report),
    }

    Ok(())
}

/// Candidates ready for matching plus the ones left out on the way
struct CandidateBatch {
    images: Vec<ArtifactImages>,
    rejected: Vec<RejectedCandidate>,
    /// Upload entries that could not be listed
    unreadable: Vec<String>,
}

fn load_candidates(source: CandidateSource) -> Result<CandidateBatch> {
    match source {
        CandidateSource::Manifest(path) => Ok(CandidateBatch {
            images: load_manifest(&path)?
                .iter()
                .map(ManifestEntry::to_images)
                .collect(),
            rejected: Vec::new(),
            unreadable: Vec::new(),
        }),
        CandidateSource::Bundle { root, ids } => {
            let layout = resolve_bundle(&root, &ids)?;
            Ok(CandidateBatch {
                images: layout.artifact_images(),
                rejected: layout.rejected(),
                unreadable: layout.unreadable,
            })
        }
    }
}

/// Describe the corpus (stored descriptors plus images), then match the batch
fn run_batch(
    pipeline: &Pipeline,
    corpus_entries: &[ManifestEntry],
    batch: &CandidateBatch,
    events: &EventSender,
) -> Result<BatchReport> {
    let described = describe_entries(corpus_entries, &pipeline.describer(), events);
    let corpus = Corpus::new(described.artifacts);

    let mut report = pipeline.run_against(&corpus, &batch.images, events)?;
    report.cache_hits += described.cache_hits;
    report.rejected = batch.rejected.clone();
    report
        .errors
        .extend(batch.unreadable.iter().map(|entry| format!("unreadable upload entry {}", entry)));
    report
        .errors
        .extend(described.errors.into_iter().map(|e| format!("corpus {}", e)));
    Ok(report)
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );
    pb
}

fn update_progress(pb: &ProgressBar, event: &Event, verbose: bool) {
    match event {
        Event::Describe(DescribeEvent::Started { total_images }) => {
            pb.set_length(*total_images as u64);
            pb.set_position(0);
        }
        Event::Describe(DescribeEvent::Progress(p)) => {
            pb.set_position(p.completed as u64);
            if verbose {
                pb.set_message(p.current_source.clone());
            }
        }
        Event::Describe(DescribeEvent::Error { source, message }) if verbose => {
            pb.println(format!("  {} {}: {}", style("✗").red(), source, message));
        }
        Event::Match(MatchEvent::Started { candidates, .. }) => {
            pb.set_length(*candidates as u64);
            pb.set_position(0);
        }
        Event::Match(MatchEvent::PossibleDuplicate { .. }) | Event::Match(MatchEvent::Novel { .. }) => {
            pb.inc(1);
        }
        Event::Batch(BatchEvent::PhaseChanged { phase }) => {
            pb.set_message(phase.to_string());
        }
        _ => {}
    }
}

fn print_pretty(report: &BatchReport, verbose: bool) {
    let items = review_items(report);

    for rejected in &report.rejected {
        println!("{} {} rejected: {}", style("✗").red(), style(&rejected.id).bold(), rejected.reason);
    }
    if !report.rejected.is_empty() {
        println!();
    }

    if report.candidates.is_empty() {
        println!("{}", style("No candidates to match.").yellow());
        return;
    }

    println!(
        "{} {} possible duplicates, {} novel\n",
        style("Results:").bold(),
        style(report.duplicate_count()).yellow().bold(),
        style(report.novel_count()).green().bold()
    );

    for item in &items {
        let marker = if item.needs_decision {
            style("⚠").yellow()
        } else {
            style("✓").green()
        };
        println!(
            "{} {} {}",
            marker,
            style(&item.candidate_id).bold(),
            item.explanation.summary
        );

        if verbose || item.needs_decision {
            println!("    {}", style(&item.explanation.human_readable).dim());
        }
        for skipped in &item.skipped_images {
            println!("    {} {}", style("skipped").red(), skipped);
        }
    }

    println!(
        "\n{} corpus: {} artifacts / {} descriptors, {} cache hits, {}ms",
        style("Batch").dim(),
        report.corpus_artifacts,
        report.corpus_descriptors,
        report.cache_hits,
        report.duration_ms
    );

    if !report.errors.is_empty() {
        println!(
            "{} {} images could not be described",
            style("⚠").yellow(),
            report.errors.len()
        );
        if verbose {
            for error in &report.errors {
                println!("    {}", error);
            }
        }
    }

    if report.duplicate_count() > 0 {
        println!(
            "\n{}",
            style("Resolve each possible duplicate as replace, keep or new before ingesting.").dim()
        );
    }
}

fn print_minimal(report: &BatchReport) {
    for rejected in &report.rejected {
        eprintln!("rejected\t{}\t{}", rejected.id, rejected.reason);
    }
    for candidate in report.possible_duplicates() {
        if let MatchOutcome::PossibleDuplicate(m) = &candidate.outcome {
            println!("{}\t{}\t{:.6}", candidate.id, m.existing_id, m.distance);
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ReportError::GenerationFailed(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

fn resolve_command(report_path: &Path, decisions: Vec<(String, Resolution)>) -> Result<()> {
    let text = std::fs::read_to_string(report_path).map_err(|e| {
        ArtifactMatchError::Config(format!("cannot read {}: {}", report_path.display(), e))
    })?;
    let report: BatchReport = serde_json::from_str(&text).map_err(|e| {
        ArtifactMatchError::Config(format!("{} is not a batch report: {}", report_path.display(), e))
    })?;

    let known: HashMap<&str, &MatchOutcome> = report.outcomes_by_id();
    for (id, _) in &decisions {
        if !known.contains_key(id.as_str()) {
            return Err(ArtifactMatchError::Config(format!(
                "decision for unknown candidate {}",
                id
            )));
        }
    }

    let decisions: HashMap<String, Resolution> = decisions.into_iter().collect();
    let plan = plan_resolutions(&report, &decisions);

    for action in &plan.actions {
        match action {
            IngestAction::CreateNew { candidate_id } => {
                println!("{} {} create new", style("+").green(), candidate_id)
            }
            IngestAction::ReplaceExisting {
                candidate_id,
                existing_id,
            } => println!("{} {} replaces {}", style("~").yellow(), candidate_id, existing_id),
            IngestAction::KeepExisting {
                candidate_id,
                existing_id,
            } => println!("{} {} dropped, keeping {}", style("=").dim(), candidate_id, existing_id),
        }
    }

    if !plan.is_complete() {
        println!(
            "\n{} awaiting a decision: {}",
            style("⚠").yellow(),
            plan.pending.join(", ")
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// cache
// ---------------------------------------------------------------------------

fn cache_command(action: CacheAction, path: &Path) -> Result<()> {
    let cache = SqliteCache::open(path)?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats()?;
            println!("{} {}", style("Cache:").bold(), cache.path().display());
            println!("  entries: {}", stats.total_entries);
            println!("  size:    {}", format_bytes(stats.total_size_bytes));
            if let Some(oldest) = stats.oldest_entry {
                println!("  oldest:  {}", DateTime::<Utc>::from(oldest).format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if let Some(newest) = stats.newest_entry {
                println!("  newest:  {}", DateTime::<Utc>::from(newest).format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        CacheAction::Clear => {
            cache.clear()?;
            println!("{} cleared {}", style("✓").green(), cache.path().display());
        }
        CacheAction::Prune => {
            let removed = cache.prune_orphans()?;
            println!("{} removed {} orphaned entries", style("✓").green(), removed);
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
