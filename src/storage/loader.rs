//! CSV ingestion of per-dose measurement files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::schema::{ChannelSeries, DatasetError, ExperimentalDataset};

/// Replicate columns averaged per row.
pub const REPLICATE_COLUMNS: usize = 3;

const TIME_COLUMN: &str = "Time";
const DOSE_COLUMN: &str = "Dose";

/// One parsed dose file.
struct DoseFile {
    dose: f64,
    times: Vec<f64>,
    trace: Vec<f64>,
}

/// Load both channel directories into a validated dataset.
pub fn load_dataset<P, Q>(phospho_dir: P, nuclear_dir: Q) -> Result<ExperimentalDataset, DatasetError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let phospho = load_channel_dir(phospho_dir)?;
    let nuclear = load_channel_dir(nuclear_dir)?;
    ExperimentalDataset::new(phospho, nuclear)
}

/// Load every `*.csv` file of a directory into a dose-sorted series.
///
/// All files must share the same time column.
pub fn load_channel_dir<P: AsRef<Path>>(dir: P) -> Result<ChannelSeries, DatasetError> {
    let dir = dir.as_ref();
    let paths = csv_files(dir)?;
    if paths.is_empty() {
        return Err(DatasetError::NoFiles(dir.to_path_buf()));
    }

    let mut times: Option<Vec<f64>> = None;
    let mut pairs = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = read_dose_file(path)?;
        match &times {
            Some(shared) if !same_times(shared, &file.times) => {
                return Err(DatasetError::TimeMismatch { path: path.clone() });
            }
            Some(_) => {}
            None => times = Some(file.times),
        }
        pairs.push((file.dose, file.trace));
    }

    log::info!("Loaded {} dose file(s) from {}", pairs.len(), dir.display());
    Ok(ChannelSeries::new(times.unwrap_or_default(), pairs))
}

/// `*.csv` files of a directory in name order.
fn csv_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn read_dose_file(path: &Path) -> Result<DoseFile, DatasetError> {
    let csv_err = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DatasetError::MissingColumn {
                path: path.to_path_buf(),
                column: name,
            })
    };
    let time_col = column(TIME_COLUMN)?;
    let dose_col = column(DOSE_COLUMN)?;
    let replicate_cols: Vec<usize> = (0..headers.len())
        .filter(|&i| i != time_col && i != dose_col)
        .take(REPLICATE_COLUMNS)
        .collect();
    if replicate_cols.is_empty() {
        return Err(DatasetError::NoReplicates {
            path: path.to_path_buf(),
        });
    }

    let mut dose = None;
    let mut times = Vec::new();
    let mut trace = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let cell = |index: usize| record.get(index).unwrap_or("");

        times.push(parse_number(path, row, cell(time_col))?);
        if dose.is_none() {
            dose = Some(parse_number(path, row, cell(dose_col))?);
        }

        let mut sum = 0.0;
        let mut count = 0usize;
        for &col in &replicate_cols {
            let value = cell(col);
            if value.is_empty() {
                continue;
            }
            sum += parse_number(path, row, value)?;
            count += 1;
        }
        if count == 0 {
            return Err(DatasetError::EmptyRow {
                path: path.to_path_buf(),
                row,
            });
        }
        trace.push(sum / count as f64);
    }

    let Some(dose) = dose else {
        return Err(DatasetError::EmptyFile {
            path: path.to_path_buf(),
        });
    };
    Ok(DoseFile { dose, times, trace })
}

fn parse_number(path: &Path, row: usize, value: &str) -> Result<f64, DatasetError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DatasetError::InvalidNumber {
            path: path.to_path_buf(),
            row,
            value: value.to_string(),
        })
}

fn same_times(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= 1e-9 * x.abs().max(y.abs()).max(1.0))
}
