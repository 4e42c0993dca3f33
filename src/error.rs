use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing command line argument
    #[error("argument error: {0}")]
    Args(#[from] pico_args::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Parameters that cannot describe a cache
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// Recognized operation with an unusable address
    #[error("trace line {line}: {reason}")]
    Trace { line: usize, reason: String },
}
