//! # zwatch-sim - Host Side of the Detector
//!
//! Everything around the detector that the core deliberately leaves out:
//!
//! - **generator**: synthetic trending signal with spike injection and
//!   ground truth
//! - **reader**: numbers from stdin or a file, one per line
//! - **feed**: reader thread and sample task feeding the async host loop
//! - **sinks**: log, JSON lines and rolling-window renderers
//! - **scoring**: precision / recall / F1 against ground truth
//! - **settings**: JSON run configuration
//!
//! ```rust
//! use zwatch_core::{InvalidInputPolicy, Monitor, VecSink};
//! use zwatch_sim::{StreamProfile, SyntheticStream};
//!
//! let mut stream = SyntheticStream::with_seed(StreamProfile::default(), 7).unwrap();
//! let mut sink = VecSink::new();
//! let mut monitor = Monitor::from_config(Default::default(), InvalidInputPolicy::Skip).unwrap();
//! let summary = monitor.run(&mut stream, &mut sink).unwrap();
//! assert_eq!(summary.processed, 120);
//! ```

pub mod feed;
pub mod generator;
pub mod reader;
pub mod scoring;
pub mod settings;
pub mod sinks;

pub use feed::{DEFAULT_FEED_CAPACITY, LineFeed, spawn_lines, spawn_samples};
pub use generator::{ProfileError, Sample, StreamProfile, SyntheticStream};
pub use reader::LineSource;
pub use scoring::{DetectionMetrics, GroundTruthScorer};
pub use settings::{OutputFormat, OutputSettings, Settings, SettingsError};
pub use sinks::{JsonLinesSink, LogSink, WindowSink};
