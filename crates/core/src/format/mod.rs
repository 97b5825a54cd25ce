//! Format model shared by the engine and both server services.

mod types;

pub use types::{FormatFamily, MediaFormat, OperationKind};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Unknown format: {0}")]
    Unknown(String),
}
