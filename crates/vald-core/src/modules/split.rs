use crate::domain::{ByteSize, ParserResult, ValdError, ValdResult};
use crate::modules::linelist::{LineListFile, LineListWriter, read_line_list};
use crate::modules::serialization::{persist_staged, stage_text};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extension of split chunks, matching what the Turbospectrum helpers expect.
pub const SPLIT_EXTENSION: &str = "cut";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitReport {
    pub max_bytes: u64,
    pub records: usize,
    pub outputs: Vec<PathBuf>,
}

/// Partitions records into chunks of at most `max_bytes`, each repeating the header.
/// The trailer travels with the final chunk.
pub fn split_parsed(file: &LineListFile, max_bytes: u64) -> ParserResult<Vec<String>> {
    let header_bytes = file.header_byte_len() as u64;
    let trailer_bytes = file.trailer_byte_len() as u64;
    let record_count = file.records.len();

    if record_count == 0 {
        if header_bytes + trailer_bytes > max_bytes {
            return Err(ValdError::size_constraint(
                "SPLIT.HEADER_TOO_LARGE",
                format!(
                    "header and footer need {} bytes, above the {} byte limit",
                    header_bytes + trailer_bytes,
                    max_bytes
                ),
            ));
        }
        return Ok(vec![file.to_text()]);
    }

    let mut chunks = Vec::new();
    let mut current = new_chunk(file);
    let mut current_records = 0_usize;

    for (index, record) in file.records.iter().enumerate() {
        let is_last = index + 1 == record_count;
        let cost = record.byte_len() as u64 + if is_last { trailer_bytes } else { 0 };

        if header_bytes + cost > max_bytes {
            return Err(ValdError::size_constraint(
                "SPLIT.RECORD_TOO_LARGE",
                format!(
                    "record at line {} needs {} bytes with the header, above the {} byte limit",
                    record.first_line_number(),
                    header_bytes + cost,
                    max_bytes
                ),
            ));
        }

        if current_records > 0 && current.len() as u64 + cost > max_bytes {
            debug!(records = current_records, bytes = current.len(), "flushing chunk");
            chunks.push(current.finish());
            current = new_chunk(file);
            current_records = 0;
        }

        current.push_record(record);
        current_records += 1;
    }

    current.push_lines(&file.trailer);
    chunks.push(current.finish());
    Ok(chunks)
}

fn new_chunk(file: &LineListFile) -> LineListWriter {
    let mut writer = LineListWriter::default();
    writer.push_lines(&file.header);
    writer
}

pub fn chunk_path(input: &Path, output_dir: &Path, index: usize) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "linelist".to_string());
    output_dir.join(format!("{stem}_{index}.{SPLIT_EXTENSION}"))
}

/// Removes `<stem>_<n>.cut` files left by an earlier split into more chunks.
fn remove_stale_chunks(input: &Path, output_dir: &Path, first_stale: usize) -> ValdResult<()> {
    let mut index = first_stale;
    loop {
        let path = chunk_path(input, output_dir, index);
        if !path.is_file() {
            return Ok(());
        }
        fs::remove_file(&path).map_err(|source| {
            ValdError::io_system(
                "IO.OUTPUT_REMOVE",
                format!("failed to remove stale chunk '{}': {}", path.display(), source),
            )
        })?;
        debug!(path = %path.display(), "removed stale chunk");
        index += 1;
    }
}

/// Splits `input` into `<stem>_<n>.cut` files in `output_dir` (default: next to the input).
pub fn split_line_list(
    input: &Path,
    max_size: ByteSize,
    output_dir: Option<&Path>,
) -> ValdResult<SplitReport> {
    let file = read_line_list(input)?;
    let chunks = split_parsed(&file, max_size.bytes())
        .map_err(|error| error.with_context(input.display()))?;

    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    // Every chunk is staged before the first one replaces an existing file.
    let mut staged = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let path = chunk_path(input, &output_dir, index + 1);
        staged.push((stage_text(&path, chunk)?, path));
    }

    let mut outputs = Vec::with_capacity(staged.len());
    for (file, path) in staged {
        persist_staged(file, &path)?;
        outputs.push(path);
    }
    remove_stale_chunks(input, &output_dir, outputs.len() + 1)?;

    info!(
        input = %input.display(),
        chunks = outputs.len(),
        records = file.records.len(),
        "split line list"
    );

    Ok(SplitReport {
        max_bytes: max_size.bytes(),
        records: file.records.len(),
        outputs,
    })
}
