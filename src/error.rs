use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdError {
    #[error("unable to allocate {len} values")]
    Allocation { len: usize },

    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("invalid alpha {0}")]
    InvalidAlpha(f64),

    #[error("no data has been loaded")]
    NoData,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{what} has {got} values, expected at least {expected}")]
    DataLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("line {line}: {msg}")]
    Parse { line: usize, msg: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CdError>;
