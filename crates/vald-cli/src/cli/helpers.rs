use super::CliError;
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use vald_core::domain::ValdError;
use vald_core::modules::acquisition::AcquisitionConfig;
use vald_core::modules::serialization::list_input_files;

pub(super) const DEFAULT_FILE_PATTERN: &str = "*";

/// Installs the stderr log subscriber; `RUST_LOG` overrides the flag-derived level.
pub(super) fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vald_core={level},vald_tools={level}")));

    // A subscriber may already be installed when the CLI runs in-process.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init();
}

/// Explicit inputs first, then matching files of `input_dir` in file-name order.
pub(super) fn resolve_inputs(
    inputs: Vec<PathBuf>,
    input_dir: Option<&Path>,
    pattern: &str,
) -> Result<Vec<PathBuf>, CliError> {
    let mut resolved = inputs;
    if let Some(directory) = input_dir {
        resolved.extend(list_input_files(directory, pattern)?);
    }
    if resolved.is_empty() {
        return Err(CliError::Usage(
            "no input files given; pass file paths or --input-dir".to_string(),
        ));
    }
    Ok(resolved)
}

pub(super) fn load_acquisition_config(path: &Path) -> Result<AcquisitionConfig, CliError> {
    AcquisitionConfig::from_path(path).map_err(|error| CliError::Core(ValdError::from(error)))
}

/// Prints `report` as JSON, or the human summary lines.
pub(super) fn emit_report<T: Serialize>(
    report: &T,
    json: bool,
    human: impl FnOnce() -> Vec<String>,
) -> Result<(), CliError> {
    if json {
        let rendered =
            serde_json::to_string_pretty(report).context("failed to serialize command summary")?;
        println!("{rendered}");
    } else {
        for line in human() {
            println!("{line}");
        }
    }
    Ok(())
}
