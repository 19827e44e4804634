//! # artifact-match CLI
//!
//! Command-line interface for the artifact duplicate detector.
//!
//! ## Usage
//! ```bash
//! artifact-match match --corpus corpus.json --candidates upload.json
//! artifact-match match --corpus corpus.json --bundle-dir ./upload --ids 101,102 --output json
//! artifact-match resolve --report report.json --decision 101=replace
//! ```

mod cli;

use artifact_dedup::Result;

fn main() -> Result<()> {
    artifact_dedup::init_tracing();
    cli::run()
}
