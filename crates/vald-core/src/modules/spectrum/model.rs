use crate::common::elements::{atomic_number_for_symbol, molecule_code};
use crate::modules::linelist::Species;
use crate::modules::serialization::format_left;
use serde::Serialize;

/// eV per cm^-1.
pub const EV_PER_WAVENUMBER: f64 = 1.23981e-4;
pub const MAX_ION_STAGE: usize = 10;

const FUDGE_FACTOR: &str = "1.000";
const TRANSITION_TYPE: &str = "99";
const SOURCE_TAG: &str = "VALD";
const ISOTOPE_MASS_NUMBER: &str = "0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyUnit {
    /// VALD energies are in eV and get converted to cm^-1.
    #[default]
    ElectronVolt,
    /// VALD energies are already in cm^-1.
    Wavenumber,
}

impl EnergyUnit {
    /// Integer cm^-1, or `None` when the value is not finite or does not fit an `i64`.
    pub fn to_wavenumber(self, value: f64) -> Option<i64> {
        let wavenumber = match self {
            Self::ElectronVolt => value / EV_PER_WAVENUMBER,
            Self::Wavenumber => value,
        }
        .trunc();
        (wavenumber.is_finite() && wavenumber.abs() < i64::MAX as f64).then_some(wavenumber as i64)
    }
}

/// SPECTRUM species code: `Z.(ion-1)` for atoms, the fixed code for molecules.
pub fn spectrum_species_code(species: &Species) -> Option<String> {
    if let Some(atomic_number) = atomic_number_for_symbol(&species.symbol) {
        let ion_stage = species.ion_stage.parse::<usize>().ok()?;
        if !(1..=MAX_ION_STAGE).contains(&ion_stage) {
            return None;
        }
        return Some(format!("{}.{}", atomic_number, ion_stage - 1));
    }

    molecule_code(&species.symbol).map(str::to_string)
}

/// One line of a SPECTRUM v2.76 line list.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumLine {
    pub wavelength: String,
    pub species_code: String,
    pub lower_energy: i64,
    pub upper_energy: i64,
    pub log_gf: String,
}

impl SpectrumLine {
    pub fn render(&self, isotope_column: bool) -> String {
        let mut line = String::with_capacity(96);
        line.push_str(&format_left(&self.wavelength, 12));
        line.push_str(&format_left(&self.species_code, 8));
        if isotope_column {
            line.push_str(&format_left(ISOTOPE_MASS_NUMBER, 4));
        }
        line.push_str(&format_left(&self.lower_energy.to_string(), 12));
        line.push_str(&format_left(&self.upper_energy.to_string(), 12));
        line.push_str(&format_left(&self.log_gf, 12));
        line.push_str(&format_left(FUDGE_FACTOR, 10));
        line.push_str(&format_left(TRANSITION_TYPE, 4));
        line.push_str(&format_left(SOURCE_TAG, 8));
        line
    }
}
