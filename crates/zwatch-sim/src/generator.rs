//! Synthetic stream generator
//!
//! Produces a slowly trending noisy signal with periodic spike injection.
//! Every sample carries ground truth (`injected`) so detector output can be
//! scored against it.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zwatch_core::{InvalidInput, ValueSource};

/// Shape of the generated signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamProfile {
    pub base_value: f64,
    /// Added per second of stream time
    pub trend: f64,
    /// Std-dev of the Gaussian noise around the trend line
    pub noise_level: f64,
    /// `None` for an endless stream
    pub duration_secs: Option<f64>,
    pub interval_secs: f64,
    /// Spike on every whole second divisible by this; 0 disables spikes
    pub spike_every_secs: u64,
    pub spike_mean: f64,
    pub spike_std: f64,
}

impl Default for StreamProfile {
    fn default() -> Self {
        Self {
            base_value: 10.0,
            trend: 0.05,
            noise_level: 2.0,
            duration_secs: Some(60.0),
            interval_secs: 0.5,
            spike_every_secs: 15,
            spike_mean: 15.0,
            spike_std: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
}

impl StreamProfile {
    pub fn validate(&self) -> Result<(), ProfileError> {
        let checks = [
            ("base_value", self.base_value, self.base_value.is_finite(), "finite"),
            ("trend", self.trend, self.trend.is_finite(), "finite"),
            (
                "noise_level",
                self.noise_level,
                self.noise_level.is_finite() && self.noise_level >= 0.0,
                "finite and >= 0",
            ),
            (
                "interval_secs",
                self.interval_secs,
                self.interval_secs.is_finite() && self.interval_secs > 0.0,
                "finite and > 0",
            ),
            (
                "spike_mean",
                self.spike_mean,
                self.spike_mean.is_finite(),
                "finite",
            ),
            (
                "spike_std",
                self.spike_std,
                self.spike_std.is_finite() && self.spike_std >= 0.0,
                "finite and >= 0",
            ),
        ];
        for (field, value, ok, expected) in checks {
            if !ok {
                return Err(ProfileError::OutOfRange {
                    field,
                    value,
                    expected,
                });
            }
        }
        if let Some(duration) = self.duration_secs {
            if !(duration.is_finite() && duration >= 0.0) {
                return Err(ProfileError::OutOfRange {
                    field: "duration_secs",
                    value: duration,
                    expected: "finite and >= 0",
                });
            }
        }
        Ok(())
    }

    /// Number of samples a finite profile produces.
    pub fn expected_samples(&self) -> Option<u64> {
        self.duration_secs
            .map(|d| (d / self.interval_secs).ceil() as u64)
    }
}

/// One generated point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t_secs: f64,
    pub value: f64,
    /// Ground truth: a spike was added to this point
    pub injected: bool,
}

pub struct SyntheticStream {
    profile: StreamProfile,
    rng: StdRng,
    noise: Normal<f64>,
    spike: Normal<f64>,
    step: u64,
    last: Option<Sample>,
}

impl SyntheticStream {
    /// Seeded stream: identical seeds give identical samples.
    pub fn with_seed(profile: StreamProfile, seed: u64) -> Result<Self, ProfileError> {
        Self::build(profile, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(profile: StreamProfile) -> Result<Self, ProfileError> {
        Self::build(profile, StdRng::from_os_rng())
    }

    fn build(profile: StreamProfile, rng: StdRng) -> Result<Self, ProfileError> {
        profile.validate()?;
        let noise = normal(0.0, profile.noise_level, "noise_level")?;
        let spike = normal(profile.spike_mean, profile.spike_std, "spike_std")?;
        Ok(Self {
            profile,
            rng,
            noise,
            spike,
            step: 0,
            last: None,
        })
    }

    pub fn profile(&self) -> &StreamProfile {
        &self.profile
    }

    /// The most recently generated sample.
    pub fn last_sample(&self) -> Option<Sample> {
        self.last
    }

    fn is_spike_time(&self, t_secs: f64) -> bool {
        let every = self.profile.spike_every_secs;
        every > 0 && t_secs > 0.0 && (t_secs.floor() as u64) % every == 0
    }
}

fn normal(mean: f64, std_dev: f64, field: &'static str) -> Result<Normal<f64>, ProfileError> {
    Normal::new(mean, std_dev).map_err(|_| ProfileError::OutOfRange {
        field,
        value: std_dev,
        expected: "finite and >= 0",
    })
}

impl Iterator for SyntheticStream {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        // Multiply rather than accumulate so long runs don't drift
        let t_secs = self.step as f64 * self.profile.interval_secs;
        if self.profile.duration_secs.is_some_and(|d| t_secs >= d) {
            return None;
        }

        let mut value =
            self.profile.base_value + self.profile.trend * t_secs + self.noise.sample(&mut self.rng);
        let injected = self.is_spike_time(t_secs);
        if injected {
            value += self.spike.sample(&mut self.rng);
        }

        self.step += 1;
        let sample = Sample {
            t_secs,
            value,
            injected,
        };
        self.last = Some(sample);
        Some(sample)
    }
}

impl ValueSource for SyntheticStream {
    fn next_value(&mut self) -> Option<Result<f64, InvalidInput>> {
        self.next().map(|s| Ok(s.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_length() {
        let profile = StreamProfile::default();
        assert_eq!(profile.expected_samples(), Some(120));

        let stream = SyntheticStream::with_seed(profile, 7).unwrap();
        assert_eq!(stream.count(), 120);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a: Vec<Sample> = SyntheticStream::with_seed(StreamProfile::default(), 42)
            .unwrap()
            .collect();
        let b: Vec<Sample> = SyntheticStream::with_seed(StreamProfile::default(), 42)
            .unwrap()
            .collect();
        assert_eq!(a, b);

        let c: Vec<Sample> = SyntheticStream::with_seed(StreamProfile::default(), 43)
            .unwrap()
            .collect();
        assert_ne!(a, c);
    }

    #[test]
    fn test_spike_schedule() {
        let samples: Vec<Sample> = SyntheticStream::with_seed(StreamProfile::default(), 1)
            .unwrap()
            .collect();

        let injected: Vec<f64> = samples
            .iter()
            .filter(|s| s.injected)
            .map(|s| s.t_secs)
            .collect();
        // Whole seconds 15, 30, 45 at 0.5s spacing: two samples each
        assert_eq!(injected, vec![15.0, 15.5, 30.0, 30.5, 45.0, 45.5]);
        assert!(!samples[0].injected, "t = 0 is never a spike");
    }

    #[test]
    fn test_noiseless_signal_follows_trend() {
        let profile = StreamProfile {
            noise_level: 0.0,
            spike_every_secs: 0,
            duration_secs: Some(10.0),
            interval_secs: 1.0,
            ..StreamProfile::default()
        };
        let values: Vec<f64> = SyntheticStream::with_seed(profile, 0)
            .unwrap()
            .map(|s| s.value)
            .collect();
        assert_eq!(values.len(), 10);
        for (i, v) in values.iter().enumerate() {
            assert!((v - (10.0 + 0.05 * i as f64)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_endless_stream() {
        let profile = StreamProfile {
            duration_secs: None,
            ..StreamProfile::default()
        };
        assert_eq!(profile.expected_samples(), None);
        let mut stream = SyntheticStream::with_seed(profile, 3).unwrap();
        assert_eq!(stream.by_ref().take(10_000).count(), 10_000);
        assert!(stream.next_value().is_some());
    }

    #[test]
    fn test_last_sample_tracks_value_source() {
        let mut stream = SyntheticStream::with_seed(StreamProfile::default(), 9).unwrap();
        assert!(stream.last_sample().is_none());
        let value = stream.next_value().unwrap().unwrap();
        assert_eq!(stream.last_sample().map(|s| s.value), Some(value));
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let profile = StreamProfile {
            interval_secs: 0.0,
            ..StreamProfile::default()
        };
        let err = SyntheticStream::with_seed(profile, 0).err().unwrap();
        assert!(matches!(
            err,
            ProfileError::OutOfRange { field: "interval_secs", .. }
        ));

        let profile = StreamProfile {
            noise_level: -1.0,
            ..StreamProfile::default()
        };
        assert!(SyntheticStream::with_seed(profile, 0).is_err());
    }
}
