//! Integration tests for the pipeline module.
//!
//! These tests exercise a batch end to end with files on disk:
//! - Manifests with relative paths and stored descriptors
//! - Unreadable images
//! - The persistent SQLite cache across runs

use artifact_dedup::core::cache::{CacheBackend, SqliteCache};
use artifact_dedup::core::corpus::{describe_entries, load_manifest, Corpus, ImageRole, ManifestEntry};
use artifact_dedup::core::descriptor::describe_file;
use artifact_dedup::core::matcher::{MatchOutcome, NoveltyReason};
use artifact_dedup::core::pipeline::{BatchReport, Pipeline};
use artifact_dedup::core::reporter::{export_to_file, ExportFormat};
use artifact_dedup::events::null_sender;
use image::{GrayImage, ImageBuffer, Luma};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn gradient(width: u32, height: u32) -> GrayImage {
    ImageBuffer::from_fn(width, height, |x, _| Luma([(x * 4 % 256) as u8]))
}

fn diagonal(width: u32, height: u32) -> GrayImage {
    ImageBuffer::from_fn(width, height, |x, y| Luma([((x * 7 + y * 13) % 256) as u8]))
}

fn flat(width: u32, height: u32) -> GrayImage {
    ImageBuffer::from_pixel(width, height, Luma([200]))
}

fn save(dir: &Path, name: &str, image: &GrayImage) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    image.save(path).unwrap();
}

fn write_manifest(dir: &Path, name: &str, json: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, json).unwrap();
    path
}

/// Describe a corpus manifest and match a candidate manifest against it
fn run_manifests(pipeline: &Pipeline, corpus: &Path, candidates: &Path) -> BatchReport {
    let corpus_entries = load_manifest(corpus).unwrap();
    let candidates: Vec<_> = load_manifest(candidates)
        .unwrap()
        .iter()
        .map(ManifestEntry::to_images)
        .collect();

    let described = describe_entries(&corpus_entries, &pipeline.describer(), &null_sender());
    let corpus = Corpus::new(described.artifacts);
    let mut report = pipeline.run_against(&corpus, &candidates, &null_sender()).unwrap();
    report.cache_hits += described.cache_hits;
    report
}

#[test]
fn manifest_batch_flags_reuploaded_artifact() {
    let dir = TempDir::new().unwrap();
    save(dir.path(), "corpus/100_thumbnail.png", &gradient(64, 64));
    save(dir.path(), "corpus/101_thumbnail.png", &flat(64, 64));
    save(dir.path(), "upload/new_thumbnail.png", &gradient(64, 64));
    save(dir.path(), "upload/other_thumbnail.png", &diagonal(64, 48));

    let corpus = write_manifest(
        dir.path(),
        "corpus.json",
        r#"[
            {"id": "100", "thumbnail": "corpus/100_thumbnail.png"},
            {"id": "101", "thumbnail": "corpus/101_thumbnail.png"}
        ]"#,
    );
    let candidates = write_manifest(
        dir.path(),
        "upload.json",
        r#"[
            {"id": "new", "thumbnail": "upload/new_thumbnail.png"},
            {"id": "other", "thumbnail": "upload/other_thumbnail.png"}
        ]"#,
    );

    let pipeline = Pipeline::builder().build().unwrap();
    let report = run_manifests(&pipeline, &corpus, &candidates);

    let outcomes = report.outcomes_by_id();
    assert_eq!(outcomes["new"].existing_id(), Some("100"));
    assert_eq!(outcomes["new"].nearest_distance(), Some(0.0));
    assert!(!outcomes["other"].is_duplicate());
    assert_eq!(report.corpus_artifacts, 2);
    assert_eq!(report.corpus_descriptors, 2);
}

#[test]
fn unreadable_thumbnail_falls_back_to_images() {
    let dir = TempDir::new().unwrap();
    save(dir.path(), "corpus/7_1.png", &diagonal(40, 40));
    fs::write(dir.path().join("upload_thumbnail.jpg"), b"not really a jpeg").unwrap();
    save(dir.path(), "upload_1.png", &diagonal(40, 40));

    let corpus = write_manifest(dir.path(), "corpus.json", r#"[{"id": "7", "images": ["corpus/7_1.png"]}]"#);
    let candidates = write_manifest(
        dir.path(),
        "upload.json",
        r#"[{"id": "u", "thumbnail": "upload_thumbnail.jpg", "images": ["upload_1.png"]}]"#,
    );

    let pipeline = Pipeline::builder().build().unwrap();
    let report = run_manifests(&pipeline, &corpus, &candidates);

    let candidate = &report.candidates[0];
    assert_eq!(candidate.described_images, 1);
    assert_eq!(candidate.skipped.len(), 1);
    assert_eq!(candidate.skipped[0].role, ImageRole::Thumbnail);
    match &candidate.outcome {
        MatchOutcome::PossibleDuplicate(m) => {
            assert_eq!(m.existing_id, "7");
            assert_eq!(m.candidate_image.role, ImageRole::Image(1));
        }
        other => panic!("expected a possible duplicate, got {:?}", other),
    }
    assert_eq!(report.errors.len(), 1);
}

#[test]
fn empty_corpus_manifest_leaves_everything_novel() {
    let dir = TempDir::new().unwrap();
    save(dir.path(), "a_thumbnail.png", &gradient(32, 32));

    let corpus = write_manifest(dir.path(), "corpus.json", "[]");
    let candidates = write_manifest(dir.path(), "upload.json", r#"[{"id": "a", "thumbnail": "a_thumbnail.png"}]"#);

    let pipeline = Pipeline::builder().build().unwrap();
    let report = run_manifests(&pipeline, &corpus, &candidates);

    assert_eq!(report.novel_count(), 1);
    assert!(matches!(
        report.candidates[0].outcome,
        MatchOutcome::Novel {
            reason: NoveltyReason::EmptyCorpus
        }
    ));
}

#[test]
fn stored_descriptors_match_without_source_images() {
    let dir = TempDir::new().unwrap();
    save(dir.path(), "upload/9_thumbnail.png", &gradient(48, 48));
    let stored = describe_file(&dir.path().join("upload/9_thumbnail.png"));
    let stored_json = serde_json::to_string(stored.values()).unwrap();

    let corpus = write_manifest(
        dir.path(),
        "corpus.json",
        &format!(r#"[{{"id": "legacy-9", "descriptors": [{}]}}]"#, stored_json),
    );
    let candidates = write_manifest(
        dir.path(),
        "upload.json",
        r#"[{"id": "9", "thumbnail": "upload/9_thumbnail.png"}]"#,
    );

    let pipeline = Pipeline::builder().build().unwrap();
    let report = run_manifests(&pipeline, &corpus, &candidates);

    match &report.candidates[0].outcome {
        MatchOutcome::PossibleDuplicate(m) => {
            assert_eq!(m.existing_id, "legacy-9");
            assert!(m.distance < 1e-9);
            assert_eq!(m.existing_image.role, ImageRole::Stored(1));
        }
        other => panic!("expected a possible duplicate, got {:?}", other),
    }
}

#[test]
fn sqlite_cache_serves_second_batch() {
    let dir = TempDir::new().unwrap();
    save(dir.path(), "corpus/1_thumbnail.png", &gradient(64, 64));
    save(dir.path(), "corpus/2_thumbnail.png", &flat(64, 64));
    save(dir.path(), "upload/3_thumbnail.png", &gradient(64, 64));

    let corpus = write_manifest(
        dir.path(),
        "corpus.json",
        r#"[
            {"id": "1", "thumbnail": "corpus/1_thumbnail.png"},
            {"id": "2", "thumbnail": "corpus/2_thumbnail.png"}
        ]"#,
    );
    let candidates = write_manifest(dir.path(), "upload.json", r#"[{"id": "3", "thumbnail": "upload/3_thumbnail.png"}]"#);
    let db_path = dir.path().join("cache/descriptors.db");

    let first = {
        let cache = SqliteCache::open(&db_path).unwrap();
        let pipeline = Pipeline::builder().cache(Box::new(cache)).build().unwrap();
        run_manifests(&pipeline, &corpus, &candidates)
    };

    let cache = SqliteCache::open(&db_path).unwrap();
    assert_eq!(cache.stats().unwrap().total_entries, 3);

    let pipeline = Pipeline::builder().cache(Box::new(cache)).build().unwrap();
    let second = run_manifests(&pipeline, &corpus, &candidates);

    assert_eq!(first.cache_hits, 0);
    assert_eq!(second.cache_hits, 3);
    assert_eq!(
        first.candidates[0].outcome.nearest_distance(),
        second.candidates[0].outcome.nearest_distance()
    );
    assert_eq!(second.candidates[0].outcome.existing_id(), Some("1"));
}

#[test]
fn report_exports_to_csv_and_json() {
    let dir = TempDir::new().unwrap();
    save(dir.path(), "c_thumbnail.png", &gradient(32, 32));
    save(dir.path(), "n_thumbnail.png", &gradient(32, 32));

    let corpus = write_manifest(dir.path(), "corpus.json", r#"[{"id": "c", "thumbnail": "c_thumbnail.png"}]"#);
    let candidates = write_manifest(dir.path(), "upload.json", r#"[{"id": "n", "thumbnail": "n_thumbnail.png"}]"#);

    let pipeline = Pipeline::builder().build().unwrap();
    let report = run_manifests(&pipeline, &corpus, &candidates);

    let csv_path = dir.path().join("out/report.csv");
    let json_path = dir.path().join("out/report.json");
    fs::create_dir_all(dir.path().join("out")).unwrap();
    export_to_file(&report, &csv_path, ExportFormat::Csv).unwrap();
    export_to_file(&report, &json_path, ExportFormat::Json).unwrap();

    let csv = fs::read_to_string(csv_path).unwrap();
    assert!(csv.lines().nth(1).unwrap().starts_with("n,possible_duplicate,c,"));

    let parsed: BatchReport = serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
    assert_eq!(parsed.batch_id, report.batch_id);
    assert_eq!(parsed.duplicate_count(), 1);
}
