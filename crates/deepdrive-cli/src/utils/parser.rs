use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE (e.g., 'resource.cpus=8').")]
    InvalidAssignment(String),

    #[error("Key cannot be empty in assignment '{0}'.")]
    EmptyKey(String),

    #[error("Invalid {expected} value for '{key}': '{value}'")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Splits a `KEY=VALUE` assignment at the first `=`. Surrounding whitespace is ignored; the value
/// itself may contain further `=` characters.
pub fn parse_assignment(raw: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| ParseError::InvalidAssignment(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ParseError::EmptyKey(raw.to_string()));
    }
    Ok((key, value.trim()))
}

pub fn parse_value<T: FromStr>(key: &str, value: &str, expected: &'static str) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_assignment_splits_at_first_equals_sign() {
        assert_eq!(parse_assignment("resource.cpus=8"), Ok(("resource.cpus", "8")));
        assert_eq!(
            parse_assignment(" environment.python = /opt/py=3/bin/python "),
            Ok(("environment.python", "/opt/py=3/bin/python"))
        );
        assert_eq!(parse_assignment("seeding.replicas="), Ok(("seeding.replicas", "")));
    }

    #[test]
    fn parse_assignment_rejects_malformed_input() {
        assert_eq!(
            parse_assignment("resource.cpus"),
            Err(ParseError::InvalidAssignment("resource.cpus".to_string()))
        );
        assert_eq!(
            parse_assignment("=8"),
            Err(ParseError::EmptyKey("=8".to_string()))
        );
    }

    #[test]
    fn parse_value_reports_key_and_expected_type() {
        assert_eq!(parse_value::<usize>("max-iterations", "4", "integer"), Ok(4));
        let err = parse_value::<usize>("max-iterations", "four", "integer").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid integer value for 'max-iterations': 'four'"
        );
    }
}
