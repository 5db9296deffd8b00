use crate::domain::{ValdError, WavelengthRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionFormat {
    Short,
    #[default]
    Long,
}

impl ExtractionFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataRetrieval {
    Email,
    #[default]
    Ftp,
}

impl DataRetrieval {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Ftp => "ftp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinelistConfig {
    Default,
    #[default]
    Custom,
}

impl LinelistConfig {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Custom => "custom",
        }
    }
}

/// One "Extract All" submission covering a wavelength sub-range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRequest {
    /// 1-based position in the acquisition run.
    pub index: usize,
    pub range: WavelengthRange,
    pub comment: String,
}

impl ExtractionRequest {
    pub fn new(index: usize, range: WavelengthRange) -> Self {
        Self {
            index,
            range,
            comment: format!("Range {index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub received: DateTime<Utc>,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStage {
    Idle,
    FormSubmitted,
    EmailPolled,
    Downloaded,
    Decompressed,
    Done,
}

impl AcquisitionStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FormSubmitted => "form_submitted",
            Self::EmailPolled => "email_polled",
            Self::Downloaded => "downloaded",
            Self::Decompressed => "decompressed",
            Self::Done => "done",
        }
    }
}

impl Display for AcquisitionStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// A decompressed extraction on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquiredFile {
    pub index: usize,
    pub range: WavelengthRange,
    pub path: PathBuf,
    pub records: usize,
    /// Wavelength of the last record, if the file had any.
    pub last_wavelength: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The last wavelength reached the requested end.
    RangeCovered,
    /// A file came back without records.
    EmptyExtraction,
    /// The last wavelength did not advance past the sub-range start.
    NoProgress,
    /// The configured request cap was hit.
    RequestLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AcquisitionReport {
    pub requested: WavelengthRange,
    pub files: Vec<AcquiredFile>,
    pub stop_reason: StopReason,
}

/// A failed acquisition step with the sub-range and stage it was attempting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("request {index} for {range} failed at stage {stage}: {source}")]
pub struct AcquisitionError {
    pub index: usize,
    pub range: WavelengthRange,
    pub stage: AcquisitionStage,
    #[source]
    pub source: ValdError,
}

impl AcquisitionError {
    pub fn exit_code(&self) -> i32 {
        self.source.exit_code()
    }

    /// The underlying error with request context folded into its message.
    pub fn into_vald_error(self) -> ValdError {
        let context = format!(
            "request {} for {} at stage {}",
            self.index, self.range, self.stage
        );
        self.source.with_context(context)
    }
}
