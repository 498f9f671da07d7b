use thiserror::Error;

#[derive(Error, Debug)]
pub enum CcdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unresolvable region or technique. Fatal to the whole run.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No usable frames left for a combination. Fatal to the group only.
    #[error("No usable frames to combine: {0}")]
    EmptyInput(String),

    /// No compatible master flat could be found.
    #[error("No compatible master flat for {0}")]
    Compatibility(String),

    #[error("External tool error: {0}")]
    ExternalTool(String),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("Invalid image section '{0}'")]
    InvalidSection(String),

    #[error("Missing header keyword {0}")]
    MissingKeyword(&'static str),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("Invalid night manifest: {0}")]
    Manifest(String),
}

impl CcdError {
    /// Configuration errors abort the run; everything else is handled at
    /// group or frame granularity.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, CcdError>;
