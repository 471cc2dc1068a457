use std::fmt;

use tracing::trace;

use crate::error::{HamegError, Result};

/// Separator between byte codes in a raw frame.
pub const DELIMITER: char = ',';

/// Byte codes captured from the instrument for one transaction, kept as a
/// comma separated list of decimal values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawFrame {
    codes: String,
}

impl RawFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.codes
    }

    /// Append the bytes of one read pass. Successive passes stay separable
    /// because a delimiter is inserted before every batch but the first.
    pub fn push_batch(&mut self, batch: &[u8]) {
        if batch.is_empty() {
            return;
        }
        if !self.codes.is_empty() {
            self.codes.push(DELIMITER);
        }
        let delimited = batch
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.codes.push_str(&delimited);
    }

    pub fn decode(&self) -> Result<String> {
        decode(&self.codes)
    }
}

impl From<&str> for RawFrame {
    fn from(codes: &str) -> Self {
        Self {
            codes: codes.to_string(),
        }
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turn a delimited list of byte codes back into the instrument's reply.
///
/// The last token is the packet terminator and is dropped. Control
/// characters (XON/XOFF flow control, CR) are not part of the readable text
/// and are skipped. A token that is not a decimal byte value is rejected.
pub fn decode(codes: &str) -> Result<String> {
    let mut tokens: Vec<&str> = codes.split(DELIMITER).collect();
    tokens.pop();

    let mut text = String::with_capacity(tokens.len());
    for token in tokens {
        let code = token
            .trim()
            .parse::<u8>()
            .map_err(|_| HamegError::InvalidByteCode(token.to_string()))?;
        let c = char::from(code);
        if c.is_ascii_control() {
            trace!("Skipping control code {} in frame", code);
            continue;
        }
        text.push(c);
    }
    Ok(text)
}
