//! Typed environment variable lookups
//!
//! Unset or blank variables fall back to the caller's default. A variable
//! that is set but does not parse is an error rather than a silent
//! fallback, so a typo in `DISCOGS_BATCH_SIZE=1OO` stops the job early.

use std::str::FromStr;

use crate::error::{CommonError, Result};

/// Read a variable as a trimmed string, treating blank values as unset
pub fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable, `None` when unset
pub fn parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| CommonError::invalid_value(name, raw, e)),
        None => Ok(None),
    }
}

/// Read and parse a variable, falling back to `default` when unset
pub fn parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse(name)?.unwrap_or(default))
}

/// Read a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`)
pub fn flag_or(name: &str, default: bool) -> Result<bool> {
    match var(name) {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(CommonError::invalid_value(name, raw, "expected a boolean")),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    // Each test uses its own variable name so they can run in parallel.

    #[test]
    fn test_unset_falls_back_to_default() {
        assert_eq!(parse_or("DISCOGS_COMMON_TEST_UNSET", 7usize).unwrap(), 7);
        assert!(flag_or("DISCOGS_COMMON_TEST_UNSET_FLAG", true).unwrap());
    }

    #[test]
    fn test_blank_is_unset() {
        std::env::set_var("DISCOGS_COMMON_TEST_BLANK", "   ");
        assert_eq!(var("DISCOGS_COMMON_TEST_BLANK"), None);
        assert_eq!(parse_or("DISCOGS_COMMON_TEST_BLANK", 3u32).unwrap(), 3);
    }

    #[test]
    fn test_parse_valid_value() {
        std::env::set_var("DISCOGS_COMMON_TEST_NUMBER", " 250 ");
        assert_eq!(parse::<usize>("DISCOGS_COMMON_TEST_NUMBER").unwrap(), Some(250));
    }

    #[test]
    fn test_parse_invalid_value_is_error() {
        std::env::set_var("DISCOGS_COMMON_TEST_BAD_NUMBER", "1OO");
        let err = parse::<usize>("DISCOGS_COMMON_TEST_BAD_NUMBER").unwrap_err();
        match err {
            CommonError::InvalidValue { name, value, .. } => {
                assert_eq!(name, "DISCOGS_COMMON_TEST_BAD_NUMBER");
                assert_eq!(value, "1OO");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_flag_values() {
        std::env::set_var("DISCOGS_COMMON_TEST_FLAG_ON", "Yes");
        std::env::set_var("DISCOGS_COMMON_TEST_FLAG_OFF", "0");
        std::env::set_var("DISCOGS_COMMON_TEST_FLAG_BAD", "maybe");
        assert!(flag_or("DISCOGS_COMMON_TEST_FLAG_ON", false).unwrap());
        assert!(!flag_or("DISCOGS_COMMON_TEST_FLAG_OFF", true).unwrap());
        assert!(flag_or("DISCOGS_COMMON_TEST_FLAG_BAD", true).is_err());
    }
}
