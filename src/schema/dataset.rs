//! Experimental dose-response measurements.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Measurement channel of the pathway readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Phosphorylated fraction of the kinase.
    Phospho,
    /// Nuclear-localized signal.
    Nuclear,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Phospho, Channel::Nuclear];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Phospho => "phospho",
            Channel::Nuclear => "nuclear",
        }
    }
}

/// One channel's measurements: a shared time column and one averaged
/// trace per dose, sorted ascending by dose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSeries {
    /// Measurement times.
    pub times: Vec<f64>,
    /// Dose of each trace.
    pub doses: Vec<f64>,
    /// `traces[d][t]` is the signal at `times[t]` for `doses[d]`.
    pub traces: Vec<Vec<f64>>,
}

impl ChannelSeries {
    /// Build and sort by dose.
    pub fn new(times: Vec<f64>, mut pairs: Vec<(f64, Vec<f64>)>) -> Self {
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (doses, traces) = pairs.into_iter().unzip();
        Self {
            times,
            doses,
            traces,
        }
    }

    fn validate(&self, channel: Channel) -> Result<(), DatasetError> {
        if self.traces.is_empty() {
            return Err(DatasetError::EmptyChannel(channel));
        }
        if self.doses.len() != self.traces.len() {
            return Err(DatasetError::DoseCountMismatch {
                channel,
                doses: self.doses.len(),
                traces: self.traces.len(),
            });
        }
        if self.doses.windows(2).any(|w| w[0] > w[1]) {
            return Err(DatasetError::UnsortedDoses(channel));
        }
        if self.times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(DatasetError::InvalidTime(channel));
        }
        for (dose_index, trace) in self.traces.iter().enumerate() {
            if trace.len() != self.times.len() {
                return Err(DatasetError::TraceLengthMismatch {
                    channel,
                    dose_index,
                    expected: self.times.len(),
                    actual: trace.len(),
                });
            }
        }
        Ok(())
    }
}

/// Multi-dose measurements for both channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentalDataset {
    phospho: ChannelSeries,
    nuclear: ChannelSeries,
}

impl ExperimentalDataset {
    /// Bundle both channels, checking that they describe the same doses.
    pub fn new(phospho: ChannelSeries, nuclear: ChannelSeries) -> Result<Self, DatasetError> {
        phospho.validate(Channel::Phospho)?;
        nuclear.validate(Channel::Nuclear)?;

        if phospho.doses.len() != nuclear.doses.len() {
            return Err(DatasetError::ChannelDoseMismatch {
                phospho: phospho.doses.len(),
                nuclear: nuclear.doses.len(),
            });
        }
        for (index, (a, b)) in phospho.doses.iter().zip(&nuclear.doses).enumerate() {
            let tolerance = 1e-9 * a.abs().max(b.abs()).max(1.0);
            if (a - b).abs() > tolerance {
                return Err(DatasetError::DoseValueMismatch {
                    index,
                    phospho: *a,
                    nuclear: *b,
                });
            }
        }

        Ok(Self { phospho, nuclear })
    }

    /// Doses in ascending order, shared by both channels.
    pub fn doses(&self) -> &[f64] {
        &self.phospho.doses
    }

    pub fn channel(&self, channel: Channel) -> &ChannelSeries {
        match channel {
            Channel::Phospho => &self.phospho,
            Channel::Nuclear => &self.nuclear,
        }
    }
}

/// Errors loading or validating experimental data.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{} has no '{column}' column", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("{} has no replicate columns", .path.display())]
    NoReplicates { path: PathBuf },
    #[error("{}: invalid number '{value}' in row {row}", .path.display())]
    InvalidNumber {
        path: PathBuf,
        row: usize,
        value: String,
    },
    #[error("{}: row {row} has no replicate values", .path.display())]
    EmptyRow { path: PathBuf, row: usize },
    #[error("{} contains no rows", .path.display())]
    EmptyFile { path: PathBuf },
    #[error("{}: time column differs from the other files of the same directory", .path.display())]
    TimeMismatch { path: PathBuf },
    #[error("No CSV files found in {}", .0.display())]
    NoFiles(PathBuf),
    #[error("{} channel has no traces", .0.name())]
    EmptyChannel(Channel),
    #[error("{} channel has {doses} doses but {traces} traces", .channel.name())]
    DoseCountMismatch {
        channel: Channel,
        doses: usize,
        traces: usize,
    },
    #[error("{} channel doses are not sorted", .0.name())]
    UnsortedDoses(Channel),
    #[error("{} channel has negative or non-finite times", .0.name())]
    InvalidTime(Channel),
    #[error("{} channel trace {dose_index} has {actual} points, expected {expected}", .channel.name())]
    TraceLengthMismatch {
        channel: Channel,
        dose_index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Channels disagree on dose count: phospho {phospho}, nuclear {nuclear}")]
    ChannelDoseMismatch { phospho: usize, nuclear: usize },
    #[error("Dose {index} differs between channels: phospho {phospho}, nuclear {nuclear}")]
    DoseValueMismatch {
        index: usize,
        phospho: f64,
        nuclear: f64,
    },
}
