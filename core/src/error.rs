use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Bit string length {0} is not a multiple of 8")]
    MalformedLength(usize),

    #[error("Invalid bit character: {0:?}")]
    InvalidBit(char),

    #[error("Unsupported symbol: {0:?}")]
    UnsupportedSymbol(char),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output line lock poisoned")]
    LinePoisoned,

    #[error("Transmission cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, LinkError>;
