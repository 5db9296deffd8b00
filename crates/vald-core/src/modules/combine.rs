use crate::domain::{ParserResult, ValdError, ValdResult};
use crate::modules::linelist::{LineListFile, read_line_list, rewrite_record};
use crate::modules::serialization::write_text_atomically;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    /// Records are copied verbatim.
    NoFormat,
    /// Every reference line is rewritten into canonical form.
    Format,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombineReport {
    pub mode: CombineMode,
    pub input_files: usize,
    pub records: usize,
    pub rewritten_records: usize,
    pub output_bytes: usize,
}

/// Rewrites every reference line of one file; returns the file and how many records changed.
pub fn rewrite_file(file: &LineListFile) -> ParserResult<(LineListFile, usize)> {
    let mut rewritten_records = 0;
    let mut records = Vec::with_capacity(file.records.len());
    for record in &file.records {
        let rewritten = rewrite_record(record)?;
        if rewritten != *record {
            rewritten_records += 1;
        }
        records.push(rewritten);
    }
    let rewritten = LineListFile {
        header: file.header.clone(),
        records,
        trailer: file.trailer.clone(),
    };
    Ok((rewritten, rewritten_records))
}

/// Concatenates parsed files: first header, all records in order, last trailer.
pub fn combine_parsed(
    files: &[LineListFile],
    mode: CombineMode,
) -> ParserResult<(LineListFile, usize)> {
    let mut combined = LineListFile::default();
    let mut rewritten_records = 0;

    if let Some(first) = files.first() {
        combined.header = first.header.clone();
    }
    if let Some(last) = files.last() {
        combined.trailer = last.trailer.clone();
    }

    for file in files {
        match mode {
            CombineMode::NoFormat => combined.records.extend(file.records.iter().cloned()),
            CombineMode::Format => {
                let (rewritten, count) = rewrite_file(file)?;
                rewritten_records += count;
                combined.records.extend(rewritten.records);
            }
        }
    }

    Ok((combined, rewritten_records))
}

pub fn combine_line_lists(
    inputs: &[PathBuf],
    output: &Path,
    mode: CombineMode,
) -> ValdResult<CombineReport> {
    if inputs.is_empty() {
        return Err(ValdError::input_validation(
            "INPUT.COMBINE_EMPTY",
            "at least one input line list is required",
        ));
    }

    // Records are rewritten per input so a bad record is reported against its own file.
    let mut files = Vec::with_capacity(inputs.len());
    let mut rewritten_records = 0;
    for input in inputs {
        let mut file = read_line_list(input)?;
        info!(input = %input.display(), records = file.records.len(), "read line list");
        if mode == CombineMode::Format {
            let (rewritten, count) =
                rewrite_file(&file).map_err(|error| error.with_context(input.display()))?;
            file = rewritten;
            rewritten_records += count;
        }
        files.push(file);
    }

    let (combined, _) = combine_parsed(&files, CombineMode::NoFormat)?;
    let text = combined.to_text();
    write_text_atomically(output, &text)?;

    info!(
        output = %output.display(),
        records = combined.records.len(),
        rewritten = rewritten_records,
        "combined line lists"
    );

    Ok(CombineReport {
        mode,
        input_files: inputs.len(),
        records: combined.records.len(),
        rewritten_records,
        output_bytes: text.len(),
    })
}

pub fn combine_no_format(inputs: &[PathBuf], output: &Path) -> ValdResult<CombineReport> {
    combine_line_lists(inputs, output, CombineMode::NoFormat)
}

pub fn combine_format(inputs: &[PathBuf], output: &Path) -> ValdResult<CombineReport> {
    combine_line_lists(inputs, output, CombineMode::Format)
}

/// Rewrites the reference lines of a single file.
pub fn format_file(input: &Path, output: &Path) -> ValdResult<CombineReport> {
    combine_line_lists(&[input.to_path_buf()], output, CombineMode::Format)
}

#[cfg(test)]
mod tests {
    use super::{CombineMode, combine_format, combine_no_format, combine_parsed, format_file};
    use crate::domain::ValdErrorCategory;
    use crate::modules::linelist::{canonical_reference_line, parse_line_list};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const HEADER_A: &str = " 5000.00000, 5001.00000, 2, 2, 1.0, Wavelength region\n";
    const HEADER_B: &str = " 5001.00000, 5002.00000, 1, 1, 1.0, Wavelength region\n";

    fn record(wavelength: &str, reference: &str) -> String {
        format!(
            "'Fe 1',       {wavelength},  -3.123,  3.3960,  3.0,  5.8750,  4.0,\n'  LS  a5F'\n'  LS  z5D*'\n{reference}\n"
        )
    }

    fn stage(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).expect("fixture should be staged");
        path
    }

    #[test]
    fn no_format_preserves_order_and_first_header() {
        let temp = TempDir::new().expect("tempdir should be created");
        let a = stage(
            temp.path(),
            "a.lst",
            &format!(
                "{HEADER_A}{}{}* footer A\n",
                record("5000.1000", "'K14 wl:K14 (56)Fe'"),
                record("5000.2000", "'K14 wl:K14 (54)Fe'")
            ),
        );
        let b = stage(
            temp.path(),
            "b.lst",
            &format!("{HEADER_B}{}* footer B\n", record("5001.5000", "'K14 wl:K14 Fe'")),
        );
        let output = temp.path().join("out/combined.lst");

        let report = combine_no_format(&[a.clone(), b.clone()], &output).expect("combine succeeds");
        assert_eq!(report.records, 3);
        assert_eq!(report.rewritten_records, 0);

        let combined = fs::read_to_string(&output).expect("output exists");
        assert_eq!(
            combined,
            format!(
                "{HEADER_A}{}{}{}* footer B\n",
                record("5000.1000", "'K14 wl:K14 (56)Fe'"),
                record("5000.2000", "'K14 wl:K14 (54)Fe'"),
                record("5001.5000", "'K14 wl:K14 Fe'")
            )
        );
    }

    #[test]
    fn format_mode_rewrites_raw_and_keeps_canonical_records() {
        let canonical = canonical_reference_line("Fe");
        let raw = parse_line_list(&format!("{HEADER_A}{}", record("5000.1000", "'K14 wl:K14 (56)Fe'")))
            .expect("raw parses");
        let formatted = parse_line_list(&format!("{HEADER_B}{}", record("5001.5000", &canonical)))
            .expect("formatted parses");

        let (combined, rewritten) =
            combine_parsed(&[raw, formatted.clone()], CombineMode::Format).expect("combine");

        assert_eq!(rewritten, 1);
        assert!(combined
            .records
            .iter()
            .all(|record| record.reference_line() == canonical));
        assert_eq!(combined.records[1], formatted.records[0]);
    }

    #[test]
    fn format_file_rewrites_single_input() {
        let temp = TempDir::new().expect("tempdir should be created");
        let input = stage(
            temp.path(),
            "in.lst",
            &format!("{HEADER_A}{}", record("5000.1000", "'K14 wl:K14 (12)C(16)O'")),
        );
        let output = temp.path().join("in_formatted.lst");

        let report = format_file(&input, &output).expect("format succeeds");
        assert_eq!(report.rewritten_records, 1);
        let text = fs::read_to_string(&output).expect("output exists");
        assert!(text.ends_with(&format!("{}\n", canonical_reference_line("CO"))));
    }

    #[test]
    fn malformed_input_leaves_no_output() {
        let temp = TempDir::new().expect("tempdir should be created");
        let good = stage(
            temp.path(),
            "good.lst",
            &format!("{HEADER_A}{}", record("5000.1000", "'K14 wl:K14 Fe'")),
        );
        let full = record("5001.1000", "'K14 wl:K14 Fe'");
        let partial: String = full.lines().take(2).map(|line| format!("{line}\n")).collect();
        let bad = stage(temp.path(), "bad.lst", &format!("{HEADER_B}{partial}"));
        let output = temp.path().join("combined.lst");

        let error = combine_format(&[good, bad], &output).expect_err("partial record should fail");
        assert_eq!(error.category(), ValdErrorCategory::MalformedRecord);
        assert!(error.message().contains("bad.lst"));
        assert!(!output.exists());
    }

    #[test]
    fn bad_reference_line_names_the_offending_input() {
        let temp = TempDir::new().expect("tempdir should be created");
        let good = stage(
            temp.path(),
            "good.lst",
            &format!("{HEADER_A}{}", record("5000.1000", "'K14 wl:K14 Fe'")),
        );
        let bad = stage(
            temp.path(),
            "bad.lst",
            &format!("{HEADER_B}{}", record("5001.1000", "'K14 wl:K14 Fe")),
        );
        let output = temp.path().join("combined.lst");

        let error = combine_format(&[good, bad.clone()], &output).expect_err("unquoted reference");

        assert_eq!(error.code(), "PARSE.REFERENCE_QUOTES");
        assert!(
            error.message().starts_with(&format!("{}: ", bad.display())),
            "message: {}",
            error.message()
        );
        assert!(!error.message().contains("combined.lst"));
        assert!(!output.exists());
    }

    #[test]
    fn empty_input_list_is_rejected() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = combine_no_format(&[], &temp.path().join("out.lst"))
            .expect_err("no inputs should fail");
        assert_eq!(error.category(), ValdErrorCategory::InputValidation);
    }
}
