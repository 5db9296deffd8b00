mod sort;

pub use sort::{
    MergePolicy, MergeSummary, SpeciesBlock, merge_species_blocks, parse_turbo_table,
    render_turbo_table,
};

use super::traits::LineListReformatter;
use crate::domain::{ValdError, ValdResult};
use crate::modules::serialization::{
    ensure_directory, list_input_files, read_text_input, write_text_atomically,
};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Suffix appended to the input stem for converted files.
pub const TURBO_OUTPUT_SUFFIX: &str = "_TS.lst";

/// Runs `vald3line-BPz-freeformat`, which reads the input path, output path
/// and `end` from standard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalReformatter {
    executable: PathBuf,
}

impl ExternalReformatter {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Bare program names are looked up on `PATH`; anything with a directory is made absolute.
    fn resolved_executable(&self) -> ValdResult<PathBuf> {
        if self.executable.components().count() > 1 {
            absolute(&self.executable)
        } else {
            Ok(self.executable.clone())
        }
    }
}

fn working_dir(executable: &Path) -> PathBuf {
    executable
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn absolute(path: &Path) -> ValdResult<PathBuf> {
    std::path::absolute(path).map_err(|source| {
        ValdError::io_system(
            "IO.PATH_RESOLVE",
            format!("failed to resolve '{}': {}", path.display(), source),
        )
    })
}

impl LineListReformatter for ExternalReformatter {
    fn reformat(&self, input: &Path, output: &Path) -> ValdResult<()> {
        let executable = self.resolved_executable()?;
        let input = absolute(input)?;
        let output = absolute(output)?;
        let output_dir = output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        ensure_directory(&output_dir)?;

        // The tool writes into a scratch directory next to the destination; only a
        // finished file is moved into place.
        let scratch = tempfile::Builder::new()
            .prefix(".vald-turbo-")
            .tempdir_in(&output_dir)
            .map_err(|source| {
                ValdError::io_system(
                    "IO.OUTPUT_STAGING",
                    format!(
                        "failed to create scratch directory in '{}': {}",
                        output_dir.display(),
                        source
                    ),
                )
            })?;
        let file_name = output.file_name().ok_or_else(|| {
            ValdError::input_validation(
                "INPUT.TURBO_OUTPUT",
                format!("output path '{}' has no file name", output.display()),
            )
        })?;
        let staged_output = scratch.path().join(file_name);

        debug!(
            tool = %self.executable.display(),
            input = %input.display(),
            output = %output.display(),
            "running Turbospectrum reformatter"
        );

        let mut child = Command::new(&executable)
            .current_dir(working_dir(&executable))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                ValdError::external_tool(
                    "TURBO.SPAWN",
                    format!("failed to start '{}': {}", self.executable.display(), source),
                )
            })?;

        let script = format!("{}\n{}\nend\n", input.display(), staged_output.display());
        if let Some(mut stdin) = child.stdin.take() {
            // A tool that exits early closes the pipe; its exit status is reported below.
            match stdin.write_all(script.as_bytes()) {
                Ok(()) => {}
                Err(source) if source.kind() == std::io::ErrorKind::BrokenPipe => {}
                Err(source) => {
                    return Err(ValdError::external_tool(
                        "TURBO.STDIN",
                        format!(
                            "failed to send file names to '{}': {}",
                            self.executable.display(),
                            source
                        ),
                    ));
                }
            }
        }

        let result = child.wait_with_output().map_err(|source| {
            ValdError::external_tool(
                "TURBO.WAIT",
                format!("failed to wait for '{}': {}", self.executable.display(), source),
            )
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ValdError::external_tool(
                "TURBO.EXIT_STATUS",
                format!(
                    "'{}' failed on '{}' with {}: {}",
                    self.executable.display(),
                    input.display(),
                    result.status,
                    stderr.trim()
                ),
            ));
        }

        if !staged_output.is_file() {
            return Err(ValdError::external_tool(
                "TURBO.MISSING_OUTPUT",
                format!(
                    "'{}' exited successfully but wrote no output for '{}'",
                    self.executable.display(),
                    input.display()
                ),
            ));
        }

        std::fs::rename(&staged_output, &output).map_err(|source| {
            ValdError::io_system(
                "IO.OUTPUT_RENAME",
                format!(
                    "failed to move finished output into '{}': {}",
                    output.display(),
                    source
                ),
            )
        })
    }
}

/// `<stem>_TS.lst` inside `output_dir`.
pub fn turbo_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "linelist".to_string());
    output_dir.join(format!("{stem}{TURBO_OUTPUT_SUFFIX}"))
}

pub fn vald_to_turbo(
    reformatter: &dyn LineListReformatter,
    input: &Path,
    output: &Path,
) -> ValdResult<()> {
    reformatter.reformat(input, output)?;
    info!(input = %input.display(), output = %output.display(), "converted to Turbospectrum format");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub outputs: Vec<PathBuf>,
}

/// Converts every matching file of `input_dir` into `output_dir`, one tool run per file.
pub fn vald_to_turbo_batch(
    reformatter: &dyn LineListReformatter,
    input_dir: &Path,
    pattern: &str,
    output_dir: &Path,
) -> ValdResult<BatchReport> {
    let inputs = list_input_files(input_dir, pattern)?;
    ensure_directory(output_dir)?;

    let mut outputs = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let output = turbo_output_path(input, output_dir);
        vald_to_turbo(reformatter, input, &output)?;
        outputs.push(output);
    }

    info!(
        input_dir = %input_dir.display(),
        converted = outputs.len(),
        "batch Turbospectrum conversion finished"
    );
    Ok(BatchReport { outputs })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurboSortReport {
    pub input_files: usize,
    pub policy: MergePolicy,
    #[serde(flatten)]
    pub summary: MergeSummary,
}

/// Merges the Turbospectrum tables of every matching file in `input_dir` into `output`.
pub fn turbo_sort(
    input_dir: &Path,
    pattern: &str,
    output: &Path,
    policy: MergePolicy,
) -> ValdResult<TurboSortReport> {
    let inputs = list_input_files(input_dir, pattern)?;
    let mut tables = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let source = read_text_input(input)?;
        let blocks =
            parse_turbo_table(&source).map_err(|error| error.with_context(input.display()))?;
        tables.push(blocks);
    }

    let (blocks, summary) = merge_species_blocks(tables, policy);
    write_text_atomically(output, &render_turbo_table(&blocks))?;

    info!(
        output = %output.display(),
        species = summary.species_blocks,
        lines = summary.lines,
        dropped = summary.dropped_duplicates,
        "merged Turbospectrum tables"
    );
    Ok(TurboSortReport {
        input_files: inputs.len(),
        policy,
        summary,
    })
}

/// Converts a folder through the reformatter into a scratch directory and merges the results.
pub fn vald_to_sorted_turbo(
    reformatter: &dyn LineListReformatter,
    input_dir: &Path,
    pattern: &str,
    output: &Path,
    policy: MergePolicy,
) -> ValdResult<TurboSortReport> {
    let scratch = tempfile::Builder::new()
        .prefix("vald-turbo-batch-")
        .tempdir()
        .map_err(|source| {
            ValdError::io_system(
                "IO.OUTPUT_STAGING",
                format!("failed to create scratch directory: {source}"),
            )
        })?;

    vald_to_turbo_batch(reformatter, input_dir, pattern, scratch.path())?;
    let report = turbo_sort(scratch.path(), "*", output, policy)?;

    scratch.close().map_err(|source| {
        ValdError::io_system(
            "IO.SCRATCH_CLEANUP",
            format!("failed to remove scratch directory: {source}"),
        )
    })?;
    Ok(report)
}
