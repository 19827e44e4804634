//! Export functionality for batch reports.
//!
//! Supports CSV (one row per candidate, for spreadsheets) and JSON
//! (the full report).

use crate::core::matcher::{MatchOutcome, NoveltyReason};
use crate::core::pipeline::BatchReport;
use crate::error::ReportError;
use std::io::Write;
use std::path::Path;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Pick a format from a file extension (`.json`, anything else is CSV)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Csv,
        }
    }
}

/// Quote a CSV field when it contains a separator, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Export a batch report to CSV format
///
/// CSV columns: Candidate ID, Status, Existing ID, Distance, Candidate Image,
/// Existing Image, Described Images, Skipped Images
///
/// Rejected candidates follow with status `rejected` and no images.
pub fn export_csv<W: Write>(report: &BatchReport, mut writer: W) -> std::io::Result<()> {
    writeln!(
        writer,
        "Candidate ID,Status,Existing ID,Distance,Candidate Image,Existing Image,Described Images,Skipped Images"
    )?;

    for candidate in &report.candidates {
        let (status, existing_id, distance, candidate_image, existing_image) = match &candidate.outcome {
            MatchOutcome::PossibleDuplicate(m) => (
                "possible_duplicate",
                m.existing_id.clone(),
                format!("{:.6}", m.distance),
                m.candidate_image.source.clone(),
                m.existing_image.source.clone(),
            ),
            MatchOutcome::Novel {
                reason:
                    NoveltyReason::NoCloseMatch {
                        nearest_id,
                        nearest_distance,
                    },
            } => (
                "novel",
                nearest_id.clone(),
                format!("{:.6}", nearest_distance),
                String::new(),
                String::new(),
            ),
            MatchOutcome::Novel { .. } => ("novel", String::new(), String::new(), String::new(), String::new()),
        };

        writeln!(
            writer,
            "{},{},{},{},{},{},{},{}",
            csv_field(&candidate.id),
            status,
            csv_field(&existing_id),
            distance,
            csv_field(&candidate_image),
            csv_field(&existing_image),
            candidate.described_images,
            candidate.skipped.len()
        )?;
    }

    for rejected in &report.rejected {
        writeln!(writer, "{},rejected,,,,,0,0", csv_field(&rejected.id))?;
    }

    Ok(())
}

/// Export a batch report as pretty-printed JSON
pub fn export_json<W: Write>(report: &BatchReport, writer: W) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(writer, report)
        .map_err(|e| ReportError::GenerationFailed(e.to_string()))
}

/// Export a batch report to a file
pub fn export_to_file(report: &BatchReport, path: &Path, format: ExportFormat) -> Result<(), ReportError> {
    let write_failed = |source: std::io::Error| ReportError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::create(path).map_err(write_failed)?;
    let mut writer = std::io::BufWriter::new(file);

    match format {
        ExportFormat::Csv => export_csv(report, &mut writer).map_err(write_failed)?,
        ExportFormat::Json => export_json(report, &mut writer)?,
    }

    writer.flush().map_err(write_failed)
}
