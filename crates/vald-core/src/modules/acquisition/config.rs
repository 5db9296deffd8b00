use super::model::{DataRetrieval, ExtractionFormat, LinelistConfig};
use crate::domain::{ValdError, ValdServer};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MAX_WAIT_SECS: u64 = 1800;
pub const DEFAULT_RANGE_MARGIN: f64 = 5.0;
pub const DEFAULT_MAX_REQUESTS: usize = 50;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// Settings for one acquisition run, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcquisitionConfig {
    /// Address registered with VALD.
    pub email: String,
    #[serde(default)]
    pub server: ValdServer,
    #[serde(default)]
    pub extraction_format: ExtractionFormat,
    #[serde(default)]
    pub data_retrieval: DataRetrieval,
    #[serde(default)]
    pub linelist_config: LinelistConfig,
    /// Where archives are downloaded before decompression.
    pub download_dir: PathBuf,
    /// Where decompressed `.lst` files are written.
    pub output_dir: PathBuf,
    /// Local maildir receiving VALD notifications.
    pub mailbox_dir: PathBuf,
    /// Browser-automation program that fills in the extraction form.
    pub form_helper: PathBuf,
    #[serde(default)]
    pub web_driver: Option<PathBuf>,
    #[serde(default)]
    pub show_browser: bool,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,
    /// Angstroms added past the requested end of every sub-range.
    #[serde(default = "default_range_margin")]
    pub range_margin: f64,
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_max_wait_secs() -> u64 {
    DEFAULT_MAX_WAIT_SECS
}

fn default_range_margin() -> f64 {
    DEFAULT_RANGE_MARGIN
}

fn default_max_requests() -> usize {
    DEFAULT_MAX_REQUESTS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionConfigError {
    #[error("failed to read acquisition config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse acquisition config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid acquisition config: {0}")]
    Invalid(String),
}

impl From<AcquisitionConfigError> for ValdError {
    fn from(error: AcquisitionConfigError) -> Self {
        let code = match &error {
            AcquisitionConfigError::Read { .. } => "IO.CONFIG_READ",
            AcquisitionConfigError::Parse { .. } => "INPUT.CONFIG_PARSE",
            AcquisitionConfigError::Invalid(_) => "INPUT.CONFIG_INVALID",
        };
        match error {
            AcquisitionConfigError::Read { .. } => ValdError::io_system(code, error.to_string()),
            _ => ValdError::input_validation(code, error.to_string()),
        }
    }
}

impl AcquisitionConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AcquisitionConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| AcquisitionConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn from_json(json: &str) -> Result<Self, AcquisitionConfigError> {
        Self::parse(json, Path::new("<inline-config>"))
    }

    fn parse(json: &str, path: &Path) -> Result<Self, AcquisitionConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|source| AcquisitionConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AcquisitionConfigError> {
        if self.email.trim().is_empty() {
            return Err(AcquisitionConfigError::Invalid(
                "email must not be empty".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(AcquisitionConfigError::Invalid(
                "poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.max_requests == 0 {
            return Err(AcquisitionConfigError::Invalid(
                "max_requests must be positive".to_string(),
            ));
        }
        if !self.range_margin.is_finite() || self.range_margin < 0.0 {
            return Err(AcquisitionConfigError::Invalid(format!(
                "range_margin must be a non-negative number, got {}",
                self.range_margin
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
