//! Producer/consumer seams around the detector.
//!
//! A [`ValueSource`] yields observations in arrival order, a [`Monitor`]
//! feeds them through one [`EwmaAnomalyDetector`], and every resulting
//! [`Observation`] is pushed to an [`ObservationSink`]. Pacing, rendering and
//! storage all belong to implementations of these traits.

use crate::config::DetectorConfig;
use crate::detector::EwmaAnomalyDetector;
use crate::error::{DetectorError, InvalidInput, Result};
use crate::observation::Observation;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lazy sequence of observations, finite or infinite.
pub trait ValueSource {
    /// `None` once the source is exhausted. A bad value is reported as
    /// `Some(Err(_))` so the host can decide whether to skip it or stop.
    fn next_value(&mut self) -> Option<std::result::Result<f64, InvalidInput>>;
}

impl<S: ValueSource + ?Sized> ValueSource for &mut S {
    fn next_value(&mut self) -> Option<std::result::Result<f64, InvalidInput>> {
        (**self).next_value()
    }
}

impl<S: ValueSource + ?Sized> ValueSource for Box<S> {
    fn next_value(&mut self) -> Option<std::result::Result<f64, InvalidInput>> {
        (**self).next_value()
    }
}

/// Adapts any `f64` iterator into a [`ValueSource`].
#[derive(Debug, Clone)]
pub struct IterSource<I> {
    inner: I,
}

impl<I: Iterator<Item = f64>> IterSource<I> {
    pub fn new(inner: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            inner: inner.into_iter(),
        }
    }
}

impl<I: Iterator<Item = f64>> ValueSource for IterSource<I> {
    fn next_value(&mut self) -> Option<std::result::Result<f64, InvalidInput>> {
        self.inner.next().map(Ok)
    }
}

/// Receives every processed observation, in order.
pub trait ObservationSink {
    fn record(&mut self, observation: &Observation);

    /// Called once when the stream ends.
    fn finish(&mut self) {}
}

impl<S: ObservationSink + ?Sized> ObservationSink for &mut S {
    fn record(&mut self, observation: &Observation) {
        (**self).record(observation)
    }

    fn finish(&mut self) {
        (**self).finish()
    }
}

impl<S: ObservationSink + ?Sized> ObservationSink for Box<S> {
    fn record(&mut self, observation: &Observation) {
        (**self).record(observation)
    }

    fn finish(&mut self) {
        (**self).finish()
    }
}

/// Collects observations in memory.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    pub observations: Vec<Observation>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter().filter(|o| o.is_anomaly)
    }
}

impl ObservationSink for VecSink {
    fn record(&mut self, observation: &Observation) {
        self.observations.push(*observation);
    }
}

/// What to do when a source hands over a value the detector cannot use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidInputPolicy {
    /// Drop the value, log it, keep going
    #[default]
    Skip,
    /// Stop the stream and return the error
    Halt,
}

/// Outcome of pulling one value through the monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Observed(Observation),
    Skipped(InvalidInput),
    Exhausted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: u64,
    pub anomalies: u64,
    pub skipped: u64,
}

/// Drives one detector from a source into a sink.
#[derive(Debug, Clone)]
pub struct Monitor {
    detector: EwmaAnomalyDetector,
    policy: InvalidInputPolicy,
    summary: RunSummary,
}

impl Monitor {
    pub fn new(detector: EwmaAnomalyDetector, policy: InvalidInputPolicy) -> Self {
        Self {
            detector,
            policy,
            summary: RunSummary::default(),
        }
    }

    pub fn from_config(config: DetectorConfig, policy: InvalidInputPolicy) -> Result<Self> {
        Ok(Self::new(EwmaAnomalyDetector::from_config(config)?, policy))
    }

    pub fn detector(&self) -> &EwmaAnomalyDetector {
        &self.detector
    }

    pub fn policy(&self) -> InvalidInputPolicy {
        self.policy
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Pull at most one value from `source`.
    ///
    /// Under [`InvalidInputPolicy::Halt`] a bad value comes back as
    /// `Err(DetectorError::InvalidInput)`; under `Skip` it is counted and
    /// reported as [`Step::Skipped`].
    pub fn step<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<Step>
    where
        S: ValueSource + ?Sized,
        K: ObservationSink + ?Sized,
    {
        match source.next_value() {
            None => Ok(Step::Exhausted),
            Some(item) => self.feed(item, sink),
        }
    }

    /// Process one value the host already holds, e.g. one received from a
    /// reader thread. Same policy handling as [`Monitor::step`]; never
    /// returns [`Step::Exhausted`].
    pub fn feed<K>(
        &mut self,
        item: std::result::Result<f64, InvalidInput>,
        sink: &mut K,
    ) -> Result<Step>
    where
        K: ObservationSink + ?Sized,
    {
        let outcome = match item {
            Ok(value) => self.detector.process(value),
            Err(invalid) => Err(DetectorError::InvalidInput(invalid)),
        };

        match outcome {
            Ok(observation) => {
                self.summary.processed += 1;
                if observation.is_anomaly {
                    self.summary.anomalies += 1;
                }
                sink.record(&observation);
                Ok(Step::Observed(observation))
            }
            Err(DetectorError::InvalidInput(invalid)) => match self.policy {
                InvalidInputPolicy::Skip => {
                    self.summary.skipped += 1;
                    warn!(error = %invalid, "Skipping invalid observation.");
                    Ok(Step::Skipped(invalid))
                }
                InvalidInputPolicy::Halt => Err(DetectorError::InvalidInput(invalid)),
            },
            Err(other) => Err(other),
        }
    }

    /// Run until the source is exhausted, then finish the sink.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> Result<RunSummary>
    where
        S: ValueSource + ?Sized,
        K: ObservationSink + ?Sized,
    {
        self.run_limited(source, sink, None)
    }

    /// Like [`Monitor::run`] but stops after `max_points` observations when
    /// set, for sources that never end on their own.
    pub fn run_limited<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        max_points: Option<u64>,
    ) -> Result<RunSummary>
    where
        S: ValueSource + ?Sized,
        K: ObservationSink + ?Sized,
    {
        let start = self.summary.processed;
        let result = loop {
            if max_points.is_some_and(|max| self.summary.processed - start >= max) {
                break Ok(self.summary);
            }
            match self.step(source, sink) {
                Ok(Step::Exhausted) => break Ok(self.summary),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        sink.finish();
        result
    }
}
