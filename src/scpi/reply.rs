//! Reply parsing and argument checks shared by every driver.

use std::str::FromStr;

use crate::error::{AppResult, InstrumentError};

/// Parse a numeric reply such as `+1.234E-03`.
pub fn parse_f64(command: &str, reply: &str) -> AppResult<f64> {
    reply
        .trim()
        .parse::<f64>()
        .map_err(|_| InstrumentError::parse(command, reply))
}

/// Parse an integer reply, tolerating a leading `+`.
pub fn parse_int<T: FromStr>(command: &str, reply: &str) -> AppResult<T> {
    let trimmed = reply.trim();
    trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .parse::<T>()
        .map_err(|_| InstrumentError::parse(command, reply))
}

/// Parse an on/off reply: `ON`/`1` and `OFF`/`0`.
pub fn parse_switch(command: &str, reply: &str) -> AppResult<bool> {
    match reply.trim().to_ascii_uppercase().as_str() {
        "ON" | "1" | "+1" => Ok(true),
        "OFF" | "0" | "+0" => Ok(false),
        _ => Err(InstrumentError::parse(command, reply)),
    }
}

/// Token for a boolean setting.
pub fn switch(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

/// Pass `value` through if it can be written as a number.
///
/// NaN and infinities would reach the instrument as `NaN`/`inf`, which no SCPI parser accepts.
pub fn finite(setting: &str, value: f64) -> AppResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InstrumentError::Configuration(format!(
            "{setting} must be a finite number, got {value}"
        )))
    }
}

/// [`finite`] for every value that is set.
pub fn finite_all(values: &[(&str, Option<f64>)]) -> AppResult<()> {
    for &(setting, value) in values {
        if let Some(value) = value {
            finite(setting, value)?;
        }
    }
    Ok(())
}

/// Strip one level of double or single quotes, e.g. `"VOLT"` becomes `VOLT`.
pub fn unquote(reply: &str) -> &str {
    let trimmed = reply.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_replies() {
        assert_eq!(parse_f64("READ?", "+1.234E-03\r").unwrap(), 1.234e-3);
        assert!(matches!(
            parse_f64("READ?", "OVLD"),
            Err(InstrumentError::Parse { .. })
        ));
        assert_eq!(parse_int::<u8>("*STB?", "+64").unwrap(), 64);
    }

    #[test]
    fn switch_replies() {
        assert!(parse_switch("CHAN1:STAT?", "ON").unwrap());
        assert!(parse_switch("OUTP? (@1)", "1").unwrap());
        assert!(!parse_switch("MEAS1?", "off").unwrap());
        assert!(parse_switch("MEAS1?", "maybe").is_err());
        assert_eq!(switch(true), "ON");
    }

    #[test]
    fn non_finite_arguments_are_rejected() {
        assert_eq!(finite("voltage", -2.5).unwrap(), -2.5);
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = finite("voltage", value).unwrap_err();
            assert!(matches!(
                err,
                InstrumentError::Configuration(ref msg) if msg.contains("voltage")
            ));
            assert!(err.is_validation());
        }
        assert!(finite_all(&[("scale", Some(1.0)), ("range", None)]).is_ok());
        assert!(finite_all(&[("scale", None), ("range", Some(f64::NAN))]).is_err());
    }

    #[test]
    fn quotes_are_stripped() {
        assert_eq!(unquote("\"VOLT\""), "VOLT");
        assert_eq!(unquote("'C1W1+C2W1'"), "C1W1+C2W1");
        assert_eq!(unquote("VOLT"), "VOLT");
    }
}
