use crate::config::DetectorConfig;
use crate::error::{DetectorError, InvalidInput, Result};
use crate::observation::Observation;
use serde::{Deserialize, Serialize};

/// EWMA mean + EWMA variance z-score detector.
///
/// State is a fixed handful of scalars regardless of stream length. The variance term
/// is the weighted squared residual against the *updated* mean, not the
/// textbook EWMVar recurrence over the pre-update deviation.
///
/// One instance per stream; `process` calls must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct EwmaAnomalyDetector {
    alpha: f64,
    z_threshold: f64,
    mean: Option<f64>,
    variance: f64,
    count: u64,
}

/// Plain copy of the running statistics for hosts that want to record them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorSnapshot {
    pub alpha: f64,
    pub z_threshold: f64,
    pub mean: Option<f64>,
    pub variance: f64,
    pub count: u64,
}

impl EwmaAnomalyDetector {
    /// Fails with [`DetectorError::InvalidConfiguration`] unless
    /// `0 < alpha < 1` and `z_threshold > 0`.
    pub fn new(alpha: f64, z_threshold: f64) -> Result<Self> {
        Self::from_config(DetectorConfig::new(alpha, z_threshold))
    }

    pub fn from_config(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            alpha: config.alpha,
            z_threshold: config.z_threshold,
            mean: None,
            variance: 0.0,
            count: 0,
        })
    }

    /// Fold one value into the running statistics and classify it.
    ///
    /// Non-finite values, and finite values extreme enough to overflow the
    /// running statistics, are rejected with `InvalidInput` and leave the
    /// state exactly as it was.
    pub fn process(&mut self, value: f64) -> Result<Observation> {
        if !value.is_finite() {
            return Err(DetectorError::InvalidInput(InvalidInput::NonFinite(value)));
        }

        let Some(prev_mean) = self.mean else {
            // First point: nothing to deviate from yet
            self.mean = Some(value);
            self.variance = 0.0;
            self.count = 1;
            return Ok(Observation {
                index: self.count,
                value,
                is_anomaly: false,
                z_score: 0.0,
                ewma: value,
                std_dev: 0.0,
            });
        };

        // alpha*value + (1-alpha)*mean in increment form, so a repeated value
        // reproduces the mean exactly instead of drifting by an ulp
        let new_mean = prev_mean + self.alpha * (value - prev_mean);
        let residual = value - new_mean;
        let new_variance = self.alpha * residual * residual + (1.0 - self.alpha) * self.variance;
        if !new_mean.is_finite() || !new_variance.is_finite() {
            return Err(DetectorError::InvalidInput(InvalidInput::Overflow(value)));
        }
        // Rounding guard only; NaN never reaches this point
        let new_variance = if new_variance < 0.0 { 0.0 } else { new_variance };
        let std_dev = new_variance.sqrt();

        let z_score = if std_dev == 0.0 {
            0.0
        } else {
            residual.abs() / std_dev
        };
        let is_anomaly = z_score > self.z_threshold;

        self.mean = Some(new_mean);
        self.variance = new_variance;
        self.count += 1;

        Ok(Observation {
            index: self.count,
            value,
            is_anomaly,
            z_score,
            ewma: new_mean,
            std_dev,
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn z_threshold(&self) -> f64 {
        self.z_threshold
    }

    pub fn config(&self) -> DetectorConfig {
        DetectorConfig::new(self.alpha, self.z_threshold)
    }

    /// `None` until the first value has been processed.
    pub fn mean(&self) -> Option<f64> {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.variance
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn snapshot(&self) -> DetectorSnapshot {
        DetectorSnapshot {
            alpha: self.alpha,
            z_threshold: self.z_threshold,
            mean: self.mean,
            variance: self.variance,
            count: self.count,
        }
    }
}
