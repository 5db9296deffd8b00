use super::RECORD_LINE_COUNT;
use crate::domain::{ParserResult, ValdError};

/// Strips the line terminator (`\n` or `\r\n`) from a stored line.
pub(crate) fn line_content(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

pub(crate) fn line_terminator(line: &str) -> &str {
    &line[line_content(line).len()..]
}

/// Species identifier of a record, e.g. `Fe 1` for neutral iron.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Species {
    pub symbol: String,
    pub ion_stage: String,
}

/// One 4-line VALD transition entry. Lines keep their original terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineListRecord {
    lines: [String; RECORD_LINE_COUNT],
    first_line_number: usize,
}

impl LineListRecord {
    /// Builds a record after checking that the first line carries a species and a wavelength.
    pub fn new(lines: [String; RECORD_LINE_COUNT], first_line_number: usize) -> ParserResult<Self> {
        let record = Self {
            lines,
            first_line_number,
        };
        record.species()?;
        record.wavelength()?;
        Ok(record)
    }

    pub fn lines(&self) -> &[String; RECORD_LINE_COUNT] {
        &self.lines
    }

    /// 1-based line number of the record's first line in its source file.
    pub fn first_line_number(&self) -> usize {
        self.first_line_number
    }

    pub fn reference_line(&self) -> &str {
        line_content(&self.lines[RECORD_LINE_COUNT - 1])
    }

    pub fn byte_len(&self) -> usize {
        self.lines.iter().map(String::len).sum()
    }

    /// Comma-separated fields of the first line, untrimmed.
    pub fn fields(&self) -> Vec<&str> {
        line_content(&self.lines[0]).split(',').collect()
    }

    pub fn species(&self) -> ParserResult<Species> {
        let first = line_content(&self.lines[0]);
        let quoted = first
            .strip_prefix('\'')
            .and_then(|rest| rest.split_once('\''))
            .map(|(inside, _)| inside.trim())
            .ok_or_else(|| self.malformed("PARSE.SPECIES", "missing quoted species identifier"))?;

        let mut parts = quoted.split_whitespace();
        let symbol = parts
            .next()
            .ok_or_else(|| self.malformed("PARSE.SPECIES", "empty species identifier"))?;
        let ion_stage = parts.next().unwrap_or("1");

        Ok(Species {
            symbol: symbol.to_string(),
            ion_stage: ion_stage.to_string(),
        })
    }

    pub fn wavelength_field(&self) -> ParserResult<&str> {
        self.fields()
            .get(1)
            .map(|field| field.trim())
            .filter(|field| !field.is_empty())
            .ok_or_else(|| self.malformed("PARSE.WAVELENGTH", "missing wavelength field"))
    }

    pub fn wavelength(&self) -> ParserResult<f64> {
        let field = self.wavelength_field()?;
        field.parse::<f64>().map_err(|_| {
            self.malformed(
                "PARSE.WAVELENGTH",
                format!("wavelength field '{field}' is not numeric"),
            )
        })
    }

    /// Returns a copy with the reference line replaced, keeping its terminator.
    pub fn with_reference_line(&self, content: &str) -> Self {
        let mut lines = self.lines.clone();
        let terminator = line_terminator(&lines[RECORD_LINE_COUNT - 1]).to_string();
        lines[RECORD_LINE_COUNT - 1] = format!("{content}{terminator}");
        Self {
            lines,
            first_line_number: self.first_line_number,
        }
    }

    pub(crate) fn malformed(&self, code: &'static str, detail: impl Into<String>) -> ValdError {
        ValdError::malformed_record(
            code,
            format!(
                "record at line {}: {}",
                self.first_line_number,
                detail.into()
            ),
        )
    }
}

/// A VALD export: header block, records and the trailing footer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineListFile {
    pub header: Vec<String>,
    pub records: Vec<LineListRecord>,
    pub trailer: Vec<String>,
}

impl LineListFile {
    pub fn header_byte_len(&self) -> usize {
        self.header.iter().map(String::len).sum()
    }

    pub fn trailer_byte_len(&self) -> usize {
        self.trailer.iter().map(String::len).sum()
    }

    pub fn to_text(&self) -> String {
        let mut writer = LineListWriter::default();
        writer.push_lines(&self.header);
        for record in &self.records {
            writer.push_record(record);
        }
        writer.push_lines(&self.trailer);
        writer.finish()
    }
}

/// Accumulates line-list text, inserting a newline only where two
/// sources would otherwise run together.
#[derive(Debug, Default)]
pub struct LineListWriter {
    buffer: String,
}

impl LineListWriter {
    pub fn push_line(&mut self, line: &str) {
        if !self.buffer.is_empty() && !self.buffer.ends_with('\n') {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);
    }

    pub fn push_lines(&mut self, lines: &[String]) {
        for line in lines {
            self.push_line(line);
        }
    }

    pub fn push_record(&mut self, record: &LineListRecord) {
        self.push_lines(record.lines());
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}
