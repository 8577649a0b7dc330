use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};

/// Detector parameters.
///
/// `alpha` weights the newest observation: larger values adapt faster and
/// smooth less. `z_threshold` is the decision boundary in standard
/// deviations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub alpha: f64,
    pub z_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            z_threshold: 2.5,
        }
    }
}

impl DetectorConfig {
    pub fn new(alpha: f64, z_threshold: f64) -> Self {
        Self { alpha, z_threshold }
    }

    /// Derive `alpha` from a half-life measured in observations: after
    /// `half_life` points an old value carries half its original weight.
    pub fn with_half_life(half_life: f64, z_threshold: f64) -> Result<Self> {
        if !half_life.is_finite() || half_life <= 0.0 {
            return Err(DetectorError::InvalidConfiguration {
                parameter: "half_life",
                value: half_life,
                expected: "a finite value > 0",
            });
        }
        let alpha = 1.0 - (-std::f64::consts::LN_2 / half_life).exp();
        let config = Self::new(alpha, z_threshold);
        config.validate()?;
        Ok(config)
    }

    /// Check `0 < alpha < 1` and `z_threshold > 0`. NaN fails both.
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(DetectorError::InvalidConfiguration {
                parameter: "alpha",
                value: self.alpha,
                expected: "0 < alpha < 1",
            });
        }
        if !(self.z_threshold > 0.0 && self.z_threshold.is_finite()) {
            return Err(DetectorError::InvalidConfiguration {
                parameter: "z_threshold",
                value: self.z_threshold,
                expected: "a finite value > 0",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DetectorConfig::default();
        assert_eq!(config.alpha, 0.1);
        assert_eq!(config.z_threshold, 2.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range() {
        for (alpha, z) in [(0.0, 2.0), (1.0, 2.0), (0.1, 0.0), (0.1, -1.0)] {
            let err = DetectorConfig::new(alpha, z).validate().unwrap_err();
            assert!(
                matches!(err, DetectorError::InvalidConfiguration { .. }),
                "({alpha}, {z}) should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_nan_and_infinite() {
        assert!(DetectorConfig::new(f64::NAN, 2.0).validate().is_err());
        assert!(DetectorConfig::new(0.1, f64::NAN).validate().is_err());
        assert!(DetectorConfig::new(0.1, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_half_life() {
        let config = DetectorConfig::with_half_life(1.0, 2.5).unwrap();
        assert!((config.alpha - 0.5).abs() < 1e-12);

        // Longer half-life means slower adaptation
        let slow = DetectorConfig::with_half_life(20.0, 2.5).unwrap();
        assert!(slow.alpha < config.alpha);

        let err = DetectorConfig::with_half_life(0.0, 2.5).unwrap_err();
        assert!(matches!(
            err,
            DetectorError::InvalidConfiguration { parameter: "half_life", .. }
        ));
        assert!(DetectorConfig::with_half_life(10.0, -1.0).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DetectorConfig = serde_json::from_str(r#"{"z_threshold": 3.0}"#).unwrap();
        assert_eq!(config.alpha, 0.1);
        assert_eq!(config.z_threshold, 3.0);
    }
}
