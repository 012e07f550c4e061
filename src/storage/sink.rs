//! Run artifact persistence.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::schema::RunResult;

/// Manifest written once when the output directory is created.
pub const MANIFEST_FILE: &str = "output.txt";

/// Errors persisting run results.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Save filename '{0}' has no usable base name")]
    EmptyName(String),
}

/// Destination for finished run traces.
pub trait ResultSink {
    fn persist(&mut self, result: RunResult) -> Result<(), StorageError>;
}

/// Collects results in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub results: Vec<RunResult>,
}

impl ResultSink for MemorySink {
    fn persist(&mut self, result: RunResult) -> Result<(), StorageError> {
        self.results.push(result);
        Ok(())
    }
}

/// On-disk artifact of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifact {
    pub best_scores: Vec<f64>,
    pub best_individuals: Vec<Vec<f64>>,
}

impl From<&RunResult> for RunArtifact {
    fn from(result: &RunResult) -> Self {
        Self {
            best_scores: result.best_scores(),
            best_individuals: result.best_individuals(),
        }
    }
}

/// Base name of a save filename: directory and everything after the first
/// `.` removed.
pub fn strip_filename(save_filename: &str) -> Result<String, StorageError> {
    let name = save_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(save_filename);
    let base = name.split('.').next().unwrap_or("");
    if base.is_empty() {
        return Err(StorageError::EmptyName(save_filename.to_string()));
    }
    Ok(base.to_string())
}

/// Output directory `<root>/<name>` for a fitting job.
#[derive(Debug, Clone)]
pub struct OutputDirectory {
    name: String,
    path: PathBuf,
}

impl OutputDirectory {
    /// Open the directory, creating it and its manifest on first use.
    ///
    /// The manifest records the base name, the directory, the save filename,
    /// the source data paths and the serialized configuration.
    pub fn create<P, C>(
        save_filename: &str,
        root: P,
        data_paths: &[&Path],
        config: &C,
    ) -> Result<Self, StorageError>
    where
        P: AsRef<Path>,
        C: Serialize,
    {
        let name = strip_filename(save_filename)?;
        let path = root.as_ref().join(&name);

        if !path.is_dir() {
            fs::create_dir_all(&path).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            write_manifest(&path, &name, save_filename, data_paths, config)?;
            log::info!("Created output directory {}", path.display());
        }

        Ok(Self { name, path })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of artifact slot `index`.
    pub fn slot_path(&self, index: usize) -> PathBuf {
        self.path.join(format!("{}_{index:04}.json", self.name))
    }

    /// First slot index without an artifact.
    pub fn next_free_slot(&self) -> usize {
        (0..)
            .find(|&index| !self.slot_path(index).exists())
            .unwrap_or(0)
    }
}

fn write_manifest<C: Serialize>(
    dir: &Path,
    name: &str,
    save_filename: &str,
    data_paths: &[&Path],
    config: &C,
) -> Result<(), StorageError> {
    let path = dir.join(MANIFEST_FILE);
    let io_err = |source| StorageError::Io {
        path: path.clone(),
        source,
    };

    let file = File::create(&path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    write!(
        writer,
        "OUTPUT\n\nFilename: {name}\nDirectory: {}\nData file: {save_filename}\n",
        dir.display()
    )
    .map_err(io_err)?;
    for data_path in data_paths {
        writeln!(writer, "Data path: {}", data_path.display()).map_err(io_err)?;
    }
    writeln!(writer).map_err(io_err)?;
    serde_json::to_writer_pretty(&mut writer, config)?;
    writeln!(writer).map_err(io_err)?;
    writer.flush().map_err(io_err)
}

/// Writes each run to the next free `<name>_<NNNN>.json` slot.
#[derive(Debug)]
pub struct JsonResultSink {
    output: OutputDirectory,
    written: Vec<PathBuf>,
}

impl JsonResultSink {
    pub fn new(output: OutputDirectory) -> Self {
        Self {
            output,
            written: Vec::new(),
        }
    }

    pub fn output(&self) -> &OutputDirectory {
        &self.output
    }

    /// Artifacts written by this sink, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Create the next free slot exclusively, skipping slots taken meanwhile.
    fn claim_slot(&self) -> Result<(PathBuf, File), StorageError> {
        let mut index = self.output.next_free_slot();
        loop {
            let path = self.output.slot_path(index);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => index += 1,
                Err(source) => return Err(StorageError::Io { path, source }),
            }
        }
    }
}

impl ResultSink for JsonResultSink {
    fn persist(&mut self, result: RunResult) -> Result<(), StorageError> {
        let (path, file) = self.claim_slot()?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &RunArtifact::from(&result))?;
        writer.flush().map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        log::info!(
            "Run {} saved to {} ({} generations)",
            result.run,
            path.display(),
            result.generations.len()
        );
        self.written.push(path);
        Ok(())
    }
}
