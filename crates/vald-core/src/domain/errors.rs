use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ValdResult<T> = Result<T, ValdError>;
pub type ParserResult<T> = ValdResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValdErrorCategory {
    Success,
    InputValidation,
    IoSystem,
    MalformedRecord,
    UnsupportedSpecies,
    SizeConstraintViolation,
    AcquisitionTimeout,
    ExternalToolFailure,
    Internal,
}

impl ValdErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::InputValidation => 2,
            Self::IoSystem => 3,
            Self::MalformedRecord => 4,
            Self::UnsupportedSpecies => 5,
            Self::SizeConstraintViolation => 6,
            Self::AcquisitionTimeout => 7,
            Self::ExternalToolFailure => 8,
            Self::Internal => 9,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::InputValidation => "InputValidation",
            Self::IoSystem => "IoSystem",
            Self::MalformedRecord => "MalformedRecord",
            Self::UnsupportedSpecies => "UnsupportedSpecies",
            Self::SizeConstraintViolation => "SizeConstraintViolation",
            Self::AcquisitionTimeout => "AcquisitionTimeout",
            Self::ExternalToolFailure => "ExternalToolFailure",
            Self::Internal => "Internal",
        }
    }

    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Success)
    }
}

impl Display for ValdErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValdError {
    category: ValdErrorCategory,
    code: &'static str,
    message: String,
}

impl ValdError {
    pub fn new(category: ValdErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn input_validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ValdErrorCategory::InputValidation, code, message)
    }

    pub fn io_system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ValdErrorCategory::IoSystem, code, message)
    }

    pub fn malformed_record(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ValdErrorCategory::MalformedRecord, code, message)
    }

    pub fn unsupported_species(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ValdErrorCategory::UnsupportedSpecies, code, message)
    }

    pub fn size_constraint(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ValdErrorCategory::SizeConstraintViolation, code, message)
    }

    pub fn acquisition_timeout(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ValdErrorCategory::AcquisitionTimeout, code, message)
    }

    pub fn external_tool(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ValdErrorCategory::ExternalToolFailure, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ValdErrorCategory::Internal, code, message)
    }

    pub const fn category(&self) -> ValdErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// Prefixes the message with extra context, keeping category and code.
    pub fn with_context(mut self, context: impl Display) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    pub fn diagnostic_line(&self) -> String {
        let severity = if self.category.is_fatal() {
            "ERROR"
        } else {
            "INFO"
        };
        format!("{}: [{}] {}", severity, self.code, self.message)
    }

    pub fn fatal_exit_line(&self) -> Option<String> {
        self.category
            .is_fatal()
            .then(|| format!("FATAL EXIT CODE: {}", self.exit_code()))
    }
}

impl Display for ValdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.category, self.code, self.message)
    }
}

impl Error for ValdError {}
