use super::RECORD_LINE_COUNT;
use super::model::{LineListFile, LineListRecord};
use crate::domain::{ParserResult, ValdError};
use crate::modules::serialization::read_text_input;
use std::path::Path;
use tracing::debug;

fn is_record_line(line: &str) -> bool {
    line.starts_with('\'')
}

/// Parses a VALD long-format export into header, records and trailer.
pub fn parse_line_list(source: &str) -> ParserResult<LineListFile> {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let mut file = LineListFile::default();

    let mut index = 0;
    while index < lines.len() && !is_record_line(lines[index]) {
        file.header.push(lines[index].to_string());
        index += 1;
    }

    while index < lines.len() && is_record_line(lines[index]) {
        let start = index;
        let available = lines[start..]
            .iter()
            .take(RECORD_LINE_COUNT)
            .take_while(|line| is_record_line(line))
            .count();
        if available < RECORD_LINE_COUNT {
            return Err(ValdError::malformed_record(
                "PARSE.RECORD_INCOMPLETE",
                format!(
                    "record starting at line {} has {} of {} lines",
                    start + 1,
                    available,
                    RECORD_LINE_COUNT
                ),
            ));
        }

        let record_lines: [String; RECORD_LINE_COUNT] =
            std::array::from_fn(|offset| lines[start + offset].to_string());
        file.records.push(LineListRecord::new(record_lines, start + 1)?);
        index += RECORD_LINE_COUNT;
    }

    let trailer_start = index;
    for (offset, line) in lines[trailer_start..].iter().enumerate() {
        if is_record_line(line) {
            return Err(ValdError::malformed_record(
                "PARSE.RECORD_AFTER_FOOTER",
                format!(
                    "record line {} follows the footer that starts at line {}",
                    trailer_start + offset + 1,
                    trailer_start + 1
                ),
            ));
        }
        file.trailer.push((*line).to_string());
    }

    debug!(
        header_lines = file.header.len(),
        records = file.records.len(),
        trailer_lines = file.trailer.len(),
        "parsed line list"
    );
    Ok(file)
}

pub fn read_line_list(path: &Path) -> ParserResult<LineListFile> {
    let source = read_text_input(path)?;
    parse_line_list(&source).map_err(|error| error.with_context(path.display()))
}
