//! # zwatch-core - Streaming EWMA Anomaly Detection
//!
//! Single-pass, constant-memory anomaly detection over a stream of scalar
//! observations. Each value updates an exponentially weighted mean and an
//! exponentially weighted variance; the resulting z-score is compared to a
//! fixed threshold.
//!
//! ```text
//!   ValueSource ──next_value()──▶ Monitor ──process()──▶ EwmaAnomalyDetector
//!                                    │
//!                                    └──record(&Observation)──▶ ObservationSink
//! ```
//!
//! The detector is pure computation: no I/O, no logging, no locking. One
//! instance per stream, driven by one caller. Everything that paces, renders
//! or persists lives on the other side of the [`ValueSource`] and
//! [`ObservationSink`] traits.
//!
//! ## Quick Start
//!
//! ```rust
//! use zwatch_core::EwmaAnomalyDetector;
//!
//! let mut detector = EwmaAnomalyDetector::new(0.1, 2.5).unwrap();
//! for v in [10.0, 10.0, 10.0, 10.0] {
//!     assert!(!detector.process(v).unwrap().is_anomaly);
//! }
//! assert!(detector.process(50.0).unwrap().is_anomaly);
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod observation;
pub mod stream;

pub use config::DetectorConfig;
pub use detector::{DetectorSnapshot, EwmaAnomalyDetector};
pub use error::{DetectorError, InvalidInput, Result};
pub use observation::Observation;
pub use stream::{
    InvalidInputPolicy, IterSource, Monitor, ObservationSink, RunSummary, Step, ValueSource,
    VecSink,
};
