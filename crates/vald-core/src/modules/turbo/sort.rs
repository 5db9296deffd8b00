//! Merging of Turbospectrum atomic line tables.
//!
//! A table is a sequence of species blocks:
//!
//! ```text
//! '  26.000000             '    1        3
//! 'Fe 1 '
//!   5000.200  3.396 -3.123 ...
//! ```
//!
//! The header carries the species code, the ion stage and the number of
//! data lines that follow the quoted species name.

use crate::domain::{ParserResult, ValdError};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Every data line is kept, duplicates included.
    #[default]
    KeepAll,
    /// Byte-identical data lines within a species block are kept once.
    DropExactDuplicates,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesBlock {
    pub header: String,
    pub name: String,
    pub species_code: f64,
    pub ion_stage: i64,
    pub lines: Vec<String>,
}

impl SpeciesBlock {
    fn order(&self, other: &Self) -> Ordering {
        self.species_code
            .total_cmp(&other.species_code)
            .then(self.ion_stage.cmp(&other.ion_stage))
            .then_with(|| self.name.cmp(&other.name))
    }

    /// Header with the line count replaced, right-aligned in the original count field.
    pub fn header_with_count(&self) -> String {
        let content = self.header.trim_end();
        let prefix = content
            .rsplit_once(char::is_whitespace)
            .map_or("", |(prefix, _)| prefix)
            .trim_end();
        let count = self.lines.len().to_string();
        let width = content[prefix.len()..].chars().count().max(count.len() + 1);
        format!("{prefix}{count:>width$}")
    }
}

fn malformed(line_number: usize, detail: impl Into<String>) -> ValdError {
    ValdError::malformed_record(
        "PARSE.TURBO_BLOCK",
        format!("Turbospectrum table line {}: {}", line_number, detail.into()),
    )
}

fn parse_block_header(line: &str, line_number: usize) -> ParserResult<(f64, i64, usize)> {
    let (code, rest) = line
        .trim_start()
        .strip_prefix('\'')
        .and_then(|rest| rest.split_once('\''))
        .ok_or_else(|| malformed(line_number, "expected a quoted species code"))?;

    let species_code = code
        .trim()
        .parse::<f64>()
        .map_err(|_| malformed(line_number, format!("species code '{}' is not numeric", code.trim())))?;

    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let (Some(ion), Some(count)) = (tokens.first(), tokens.last()) else {
        return Err(malformed(line_number, "missing ion stage and line count"));
    };
    if tokens.len() < 2 {
        return Err(malformed(line_number, "missing ion stage and line count"));
    }

    let ion_stage = ion
        .parse::<i64>()
        .map_err(|_| malformed(line_number, format!("ion stage '{ion}' is not an integer")))?;
    let count = count
        .parse::<usize>()
        .map_err(|_| malformed(line_number, format!("line count '{count}' is not an integer")))?;

    Ok((species_code, ion_stage, count))
}

fn line_wavelength(line: &str) -> Option<f64> {
    line.split_whitespace().next()?.parse::<f64>().ok()
}

pub fn parse_turbo_table(source: &str) -> ParserResult<Vec<SpeciesBlock>> {
    let lines: Vec<&str> = source.lines().collect();
    let mut blocks = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        if lines[index].trim().is_empty() {
            index += 1;
            continue;
        }

        let header_number = index + 1;
        let (species_code, ion_stage, count) = parse_block_header(lines[index], header_number)?;
        let name = lines
            .get(index + 1)
            .filter(|line| line.trim_start().starts_with('\''))
            .ok_or_else(|| malformed(header_number + 1, "expected a quoted species name"))?;

        let data_start = index + 2;
        let data_end = data_start
            .checked_add(count)
            .filter(|end| *end <= lines.len())
            .ok_or_else(|| {
                malformed(
                    header_number,
                    format!(
                        "block declares {} lines but only {} remain",
                        count,
                        lines.len().saturating_sub(data_start)
                    ),
                )
            })?;

        let mut data = Vec::with_capacity(count);
        for (offset, line) in lines[data_start..data_end].iter().enumerate() {
            if line_wavelength(line).is_none() {
                return Err(malformed(
                    data_start + offset + 1,
                    "data line does not start with a wavelength",
                ));
            }
            data.push(line.trim_end().to_string());
        }

        blocks.push(SpeciesBlock {
            header: lines[index].trim_end().to_string(),
            name: name.trim_end().to_string(),
            species_code,
            ion_stage,
            lines: data,
        });
        index = data_end;
    }

    Ok(blocks)
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MergeSummary {
    pub species_blocks: usize,
    pub lines: usize,
    pub dropped_duplicates: usize,
}

/// Merges blocks sharing a species name, then orders blocks by species code and
/// ion stage and lines by wavelength. Sorting is stable, so equal wavelengths keep input order.
pub fn merge_species_blocks(
    tables: Vec<Vec<SpeciesBlock>>,
    policy: MergePolicy,
) -> (Vec<SpeciesBlock>, MergeSummary) {
    let mut merged: BTreeMap<String, SpeciesBlock> = BTreeMap::new();
    for block in tables.into_iter().flatten() {
        match merged.get_mut(&block.name) {
            Some(existing) => existing.lines.extend(block.lines),
            None => {
                merged.insert(block.name.clone(), block);
            }
        }
    }

    let mut summary = MergeSummary::default();
    let mut blocks: Vec<SpeciesBlock> = merged.into_values().collect();
    for block in &mut blocks {
        block.lines.sort_by(|left, right| {
            let left_wavelength = line_wavelength(left).unwrap_or(f64::INFINITY);
            let right_wavelength = line_wavelength(right).unwrap_or(f64::INFINITY);
            left_wavelength.total_cmp(&right_wavelength)
        });

        if policy == MergePolicy::DropExactDuplicates {
            let before = block.lines.len();
            let mut seen = std::collections::HashSet::new();
            block.lines.retain(|line| seen.insert(line.clone()));
            summary.dropped_duplicates += before - block.lines.len();
        }
        summary.lines += block.lines.len();
    }
    blocks.sort_by(SpeciesBlock::order);
    summary.species_blocks = blocks.len();

    (blocks, summary)
}

pub fn render_turbo_table(blocks: &[SpeciesBlock]) -> String {
    let mut output = String::new();
    for block in blocks {
        output.push_str(&block.header_with_count());
        output.push('\n');
        output.push_str(&block.name);
        output.push('\n');
        for line in &block.lines {
            output.push_str(line);
            output.push('\n');
        }
    }
    output
}
