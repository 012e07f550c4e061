//! File-system boundary: experimental CSV input and run artifact output.
//!
//! # Input layout
//!
//! One directory per channel, one CSV file per dose:
//!
//! ```text
//! Time,Dose,rep1,rep2,rep3
//! 0.0,0.1,0.02,0.03,
//! 1.0,0.1,0.11,0.09,0.10
//! ```
//!
//! The first three columns other than `Time` and `Dose` are replicates and
//! are averaged per row; empty cells are skipped.
//!
//! # Output layout
//!
//! ```text
//! <root>/<name>/output.txt        manifest, written once
//! <root>/<name>/<name>_0000.json  first run artifact
//! <root>/<name>/<name>_0001.json  ...
//! ```
//!
//! Each artifact holds `best_scores` and `best_individuals`, one entry per
//! generation. Existing artifacts are never overwritten.

mod loader;
mod sink;

pub use loader::{REPLICATE_COLUMNS, load_channel_dir, load_dataset};
pub use sink::{
    JsonResultSink, MANIFEST_FILE, MemorySink, OutputDirectory, ResultSink, RunArtifact,
    StorageError, strip_filename,
};
