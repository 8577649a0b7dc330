use thiserror::Error;

/// Errors returned by the detector and its configuration.
///
/// Nothing in this crate catches or retries these; they always travel back
/// to the immediate caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectorError {
    /// A construction parameter is outside its valid range. Fatal for the
    /// instance being built.
    #[error("invalid configuration: {parameter} = {value} (expected {expected})")]
    InvalidConfiguration {
        parameter: &'static str,
        value: f64,
        expected: &'static str,
    },

    /// A single observation could not be used. Recoverable per value.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),
}

/// Why an incoming observation was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    /// NaN or an infinity reached `process`.
    #[error("non-finite value {0}")]
    NonFinite(f64),
    /// A finite value too far from the running mean for the statistics to
    /// stay finite.
    #[error("value {0} overflows the running statistics")]
    Overflow(f64),
    /// The source produced text that is not a number.
    #[error("unparsable value {0:?}")]
    Unparsable(String),
}

pub type Result<T> = std::result::Result<T, DetectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_parameter() {
        let err = DetectorError::InvalidConfiguration {
            parameter: "alpha",
            value: 1.0,
            expected: "0 < alpha < 1",
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration: alpha = 1 (expected 0 < alpha < 1)"
        );
    }

    #[test]
    fn test_invalid_input_converts() {
        let err: DetectorError = InvalidInput::Unparsable("abc".to_string()).into();
        assert!(matches!(err, DetectorError::InvalidInput(InvalidInput::Unparsable(_))));
        assert_eq!(err.to_string(), "invalid input: unparsable value \"abc\"");
    }
}
