//! Rewrites VALD reference lines into the form `vald3line-BPz-freeformat` accepts.
//!
//! An "extract all" reference line lists the bibliography keys (`wl:K14`,
//! `gf:K14`, ...) and ends with the isotopic species, e.g. `(12)C(14)N`.
//! The converter only needs the bare species, so the line becomes
//! `'_` + 29 spaces + species + 5 spaces + `'`.

use super::model::LineListRecord;
use crate::domain::ParserResult;

const CANONICAL_PREFIX: &str = "'_";
const CANONICAL_LEAD_WIDTH: usize = 29;
const CANONICAL_TAIL_WIDTH: usize = 5;

/// Raw reference lines carry `key:source` pairs; the canonical form never does.
pub fn needs_rewrite(reference_line: &str) -> bool {
    reference_line.contains(':')
}

pub fn canonical_reference_line(species: &str) -> String {
    format!(
        "{CANONICAL_PREFIX}{:lead$}{species}{:tail$}'",
        "",
        "",
        lead = CANONICAL_LEAD_WIDTH,
        tail = CANONICAL_TAIL_WIDTH
    )
}

/// Drops parenthesised isotope mass numbers: `(12)C(16)O` becomes `CO`.
pub fn strip_isotope_masses(token: &str) -> String {
    let mut stripped = String::with_capacity(token.len());
    let mut depth = 0_usize;
    for ch in token.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(ch),
            _ => {}
        }
    }
    stripped
}

/// Returns the record with its reference line in canonical form.
/// Records already in canonical form come back unchanged.
pub fn rewrite_record(record: &LineListRecord) -> ParserResult<LineListRecord> {
    let reference = record.reference_line();
    if !needs_rewrite(reference) {
        return Ok(record.clone());
    }

    let inner = reference
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .ok_or_else(|| {
            record.malformed(
                "PARSE.REFERENCE_QUOTES",
                "reference line is not enclosed in single quotes",
            )
        })?;

    let token = inner.split_whitespace().last().ok_or_else(|| {
        record.malformed("PARSE.REFERENCE_SPECIES", "reference line has no species token")
    })?;

    let species = strip_isotope_masses(token);
    if species.is_empty() {
        return Err(record.malformed(
            "PARSE.REFERENCE_SPECIES",
            format!("species token '{token}' has no element symbols"),
        ));
    }

    Ok(record.with_reference_line(&canonical_reference_line(&species)))
}
