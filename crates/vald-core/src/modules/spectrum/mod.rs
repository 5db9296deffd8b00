//! VALD to SPECTRUM line-list conversion.
//!
//! SPECTRUM columns: wavelength, species code, optional mass number, lower and
//! upper energy (cm^-1), log gf, fudge factor, transition type and source.

mod model;

pub use model::{EV_PER_WAVENUMBER, EnergyUnit, SpectrumLine, spectrum_species_code};

use crate::domain::{ParserResult, ValdError, ValdResult};
use crate::modules::linelist::{LineListFile, LineListRecord, read_line_list};
use crate::modules::serialization::write_text_atomically;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Minimum first-line fields: species, wavelength, log gf, E_low, J_low, E_up.
const REQUIRED_FIELDS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpectrumOptions {
    pub energy_unit: EnergyUnit,
    /// Adds the mass-number column used by SPECTRUM's isotope mode.
    pub isotope_column: bool,
    /// Fails on the first unsupported species instead of skipping it.
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SpectrumReport {
    pub converted: usize,
    pub skipped_unsupported: usize,
    /// Skipped record counts keyed by VALD species, e.g. `Es 1`.
    pub skipped_species: BTreeMap<String, usize>,
}

/// Maps one record to a SPECTRUM line; `None` when SPECTRUM does not model the species.
pub fn convert_record(record: &LineListRecord, options: &SpectrumOptions) -> ParserResult<Option<String>> {
    let species = record.species()?;
    let Some(species_code) = spectrum_species_code(&species) else {
        return Ok(None);
    };

    let fields = record.fields();
    if fields.len() < REQUIRED_FIELDS {
        return Err(record.malformed(
            "PARSE.SPECTRUM_FIELDS",
            format!(
                "expected at least {} comma-separated fields, found {}",
                REQUIRED_FIELDS,
                fields.len()
            ),
        ));
    }

    let energy = |index: usize, label: &str| -> ParserResult<i64> {
        let raw = fields[index].trim();
        raw.parse::<f64>()
            .ok()
            .and_then(|value| options.energy_unit.to_wavenumber(value))
            .ok_or_else(|| {
                record.malformed(
                    "PARSE.SPECTRUM_ENERGY",
                    format!("{label} energy '{raw}' is not a finite number"),
                )
            })
    };

    let line = SpectrumLine {
        wavelength: record.wavelength_field()?.to_string(),
        species_code,
        lower_energy: energy(3, "lower")?,
        upper_energy: energy(5, "upper")?,
        log_gf: fields[2].trim().to_string(),
    };
    Ok(Some(line.render(options.isotope_column)))
}

pub fn convert_parsed(
    file: &LineListFile,
    options: &SpectrumOptions,
) -> ValdResult<(String, SpectrumReport)> {
    let mut output = String::new();
    let mut report = SpectrumReport::default();

    for record in &file.records {
        match convert_record(record, options)? {
            Some(line) => {
                output.push_str(&line);
                output.push('\n');
                report.converted += 1;
            }
            None => {
                let species = record.species()?;
                let key = format!("{} {}", species.symbol, species.ion_stage);
                if options.strict {
                    return Err(ValdError::unsupported_species(
                        "CONVERT.SPECTRUM_SPECIES",
                        format!(
                            "record at line {}: SPECTRUM has no species code for '{}'",
                            record.first_line_number(),
                            key
                        ),
                    ));
                }
                report.skipped_unsupported += 1;
                *report.skipped_species.entry(key).or_default() += 1;
            }
        }
    }

    Ok((output, report))
}

pub fn vald_to_spectrum(
    input: &Path,
    output: &Path,
    options: &SpectrumOptions,
) -> ValdResult<SpectrumReport> {
    let file = read_line_list(input)?;
    let (text, report) =
        convert_parsed(&file, options).map_err(|error| error.with_context(input.display()))?;
    write_text_atomically(output, &text)?;

    if report.skipped_unsupported > 0 {
        warn!(
            skipped = report.skipped_unsupported,
            species = ?report.skipped_species,
            "skipped records with species SPECTRUM does not model"
        );
    }
    info!(
        input = %input.display(),
        output = %output.display(),
        converted = report.converted,
        "converted line list to SPECTRUM format"
    );
    Ok(report)
}
