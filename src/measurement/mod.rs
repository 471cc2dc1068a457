pub mod data;

use tracing::trace;

use crate::error::{HamegError, Result};
pub use data::{MeasurementRecord, VersionRecord};

/// Length of the exponent marker ("E+0") closing every value.
const EXPONENT_SUFFIX_LEN: usize = 3;

/// Parse a reply like `U=229.2E+0 I=7.52E+0 Watt=1726E+0`.
///
/// Fields are positional: Volts, Amps, Watts. Key names are not checked.
pub fn parse_measurement(text: &str) -> Result<MeasurementRecord> {
    let fields: Vec<&str> = text.split(' ').collect();
    let [volts, amps, watts] = fields.as_slice() else {
        return Err(HamegError::ParseError(format!(
            "expected 3 fields, got {} in {:?}",
            fields.len(),
            text
        )));
    };

    Ok(MeasurementRecord {
        volts: split_metric(volts)?,
        amps: split_metric(amps)?,
        watts: split_metric(watts)?,
    })
}

/// Take the value of a `KEY=VALUE` field and drop its exponent suffix.
pub fn split_metric(field: &str) -> Result<String> {
    let (key, value) = field
        .split_once('=')
        .filter(|(_, value)| !value.contains('='))
        .ok_or_else(|| HamegError::ParseError(format!("malformed field {:?}", field)))?;

    let cut = value
        .char_indices()
        .rev()
        .nth(EXPONENT_SUFFIX_LEN - 1)
        .map(|(i, _)| i)
        .ok_or_else(|| {
            HamegError::ParseError(format!("value of {:?} is shorter than its exponent", key))
        })?;

    trace!("Field {} = {}", key, &value[..cut]);
    Ok(value[..cut].to_string())
}
