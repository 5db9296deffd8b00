pub mod errors;

pub use errors::{ParserResult, ValdError, ValdErrorCategory, ValdResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// VALD3 servers that accept extraction requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValdServer {
    #[default]
    Uppsala,
    Montpellier,
    Moscow,
}

impl ValdServer {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uppsala => "uppsala",
            Self::Montpellier => "montpellier",
            Self::Moscow => "moscow",
        }
    }

    /// Address the server sends extraction notifications from.
    pub const fn sender_address(self) -> &'static str {
        match self {
            Self::Uppsala => "vald@physics.uu.se",
            Self::Montpellier => "vald@vald.lupm.univ-montp2.fr",
            Self::Moscow => "vald3@inasan.ru",
        }
    }
}

impl Display for ValdServer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for ValdServer {
    type Err = ValdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "uppsala" => Ok(Self::Uppsala),
            "montpellier" => Ok(Self::Montpellier),
            "moscow" => Ok(Self::Moscow),
            other => Err(ValdError::input_validation(
                "INPUT.SERVER",
                format!("unknown VALD server '{other}'; expected uppsala, montpellier or moscow"),
            )),
        }
    }
}

/// Closed wavelength interval in angstroms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthRange {
    pub start: f64,
    pub end: f64,
}

impl WavelengthRange {
    pub fn new(start: f64, end: f64) -> ValdResult<Self> {
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end <= start {
            return Err(ValdError::input_validation(
                "INPUT.WAVELENGTH_RANGE",
                format!("invalid wavelength range [{start}, {end}]"),
            ));
        }
        Ok(Self { start, end })
    }
}

impl Display for WavelengthRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}] A", self.start, self.end)
    }
}

/// A byte threshold written as `<value><unit>` with decimal units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ByteSize(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ByteSizeError {
    #[error("byte size is empty")]
    Empty,
    #[error("invalid byte size value '{value}'")]
    InvalidValue { value: String },
    #[error("unknown byte size unit '{unit}'; expected b, kb, mb or gb")]
    UnknownUnit { unit: String },
}

impl ByteSize {
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = ByteSizeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ByteSizeError::Empty);
        }

        let split_at = trimmed
            .find(|ch: char| ch.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split_at);
        let number = number.trim();
        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1.0,
            "kb" => 1e3,
            "mb" => 1e6,
            "gb" => 1e9,
            other => {
                return Err(ByteSizeError::UnknownUnit {
                    unit: other.to_string(),
                });
            }
        };

        let parsed = number
            .parse::<f64>()
            .ok()
            .filter(|parsed| parsed.is_finite() && *parsed > 0.0)
            .ok_or_else(|| ByteSizeError::InvalidValue {
                value: number.to_string(),
            })?;

        Ok(Self((parsed * multiplier).floor() as u64))
    }
}

impl Display for ByteSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} b", self.0)
    }
}
