//! Numeric parsing of textual attribute values.
//!
//! Multi-valued DICOM attributes are rendered as text with the values
//! separated by a backslash, e.g. `"1\0\0\0\1\0"` for an orientation.
//! Parsing is strict: every token must be a finite number once the
//! space padding allowed by the Decimal String VR is removed.

use crate::error::SeriesError;

pub const VALUE_DELIMITER: char = '\\';

/// Parse one numeric token.
pub fn parse_single_float(text: &str) -> Result<f64, SeriesError> {
    let token = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(SeriesError::InvalidNumber {
            token: text.to_string(),
        }),
    }
}

/// Parse a backslash delimited list of numbers.
///
/// The result has one entry per token; callers check the arity they need.
pub fn parse_float_vector(text: &str) -> Result<Vec<f64>, SeriesError> {
    text.split(VALUE_DELIMITER).map(parse_single_float).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_float() {
        assert_eq!(parse_single_float("2.5").unwrap(), 2.5);
        assert_eq!(parse_single_float(" -10 ").unwrap(), -10.0);
        assert_eq!(parse_single_float("1e2").unwrap(), 100.0);
    }

    #[test]
    fn test_single_float_rejects_garbage() {
        assert!(matches!(
            parse_single_float("abc"),
            Err(SeriesError::InvalidNumber { .. })
        ));
        assert!(parse_single_float("").is_err());
        assert!(parse_single_float("NaN").is_err());
        assert!(parse_single_float("inf").is_err());
    }

    #[test]
    fn test_vector_keeps_token_count() {
        let values = parse_float_vector("1\\0\\0\\0\\1\\0").unwrap();
        assert_eq!(values, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);

        let values = parse_float_vector("-125.5\\ 80 \\12.25").unwrap();
        assert_eq!(values, vec![-125.5, 80.0, 12.25]);

        assert_eq!(parse_float_vector("7").unwrap(), vec![7.0]);
    }

    #[test]
    fn test_vector_rejects_bad_token() {
        assert!(parse_float_vector("0\\x\\0").is_err());
        assert!(parse_float_vector("0\\0\\").is_err());
    }

    #[test]
    fn test_trailing_null_padding() {
        assert_eq!(parse_float_vector("0\\0\\5\0").unwrap(), vec![0.0, 0.0, 5.0]);
    }
}
