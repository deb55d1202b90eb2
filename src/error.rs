use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a linearize run.
///
/// Orphan blocks and running out of input files are not errors and never
/// show up here.
#[derive(Error, Debug)]
pub enum LinearizeError {
    #[error("config error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("missing output file / directory (set `output` or `output_file`)")]
    MissingOutput,

    #[error("cannot read hash list {}: {source}", path.display())]
    HashList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("sanity hash {0} not found in hash list")]
    SanityHashMissing(String),

    #[error("{0}")]
    Scrypt(#[from] scrypt::errors::InvalidParams),

    #[error("invalid magic in {}: got {found}, expected {expected}", file.display())]
    BadMagic {
        file: PathBuf,
        found: String,
        expected: String,
    },

    #[error("truncated block in {}: wanted {wanted} bytes, got {got}", file.display())]
    TruncatedBlock {
        file: PathBuf,
        wanted: usize,
        got: usize,
    },

    #[error("block in {} is {len} bytes, shorter than a block header", file.display())]
    ShortBlock { file: PathBuf, len: usize },

    #[error("out of order block: expected {expected}, got {actual}")]
    OutOfOrder { expected: String, actual: String },

    #[error("canonical hash list exhausted at position {position}, got {actual}")]
    CanonicalExhausted { position: u64, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse grouping used for reporting at the process boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Config,
    Framing,
    OrderViolation,
    Io,
}

impl LinearizeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            LinearizeError::Settings(_)
            | LinearizeError::InvalidSetting { .. }
            | LinearizeError::MissingOutput
            | LinearizeError::HashList { .. }
            | LinearizeError::SanityHashMissing(_)
            | LinearizeError::Scrypt(_) => ErrorClass::Config,
            LinearizeError::BadMagic { .. }
            | LinearizeError::TruncatedBlock { .. }
            | LinearizeError::ShortBlock { .. } => ErrorClass::Framing,
            LinearizeError::OutOfOrder { .. } | LinearizeError::CanonicalExhausted { .. } => {
                ErrorClass::OrderViolation
            }
            LinearizeError::Io(_) => ErrorClass::Io,
        }
    }
}
