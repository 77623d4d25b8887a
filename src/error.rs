use thiserror::Error;

/// Errors of the recoverable operations of the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while writing a dump.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation needs a built, non-empty light tree.
    #[error("the light tree is empty")]
    EmptyTree,

    /// Invalid settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

/// Result type of the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
