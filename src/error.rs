use thiserror::Error;

#[derive(Error, Debug)]
pub enum HamegError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),

    #[error("Invalid byte code in frame: {0:?}")]
    InvalidByteCode(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, HamegError>;
