//! Run settings loaded from a JSON file.
//!
//! Every section is optional; missing fields fall back to defaults. CLI
//! flags are applied on top by the binary.

use crate::generator::{ProfileError, StreamProfile};
use crate::sinks::DEFAULT_WINDOW_SIZE;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zwatch_core::{DetectorConfig, DetectorError, InvalidInputPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Anomaly log lines plus a rolling strip chart
    #[default]
    Pretty,
    /// One JSON object per observation on stdout
    JsonLines,
    /// Summary only
    Quiet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
    pub window_size: usize,
    pub on_invalid: InvalidInputPolicy,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            window_size: DEFAULT_WINDOW_SIZE,
            on_invalid: InvalidInputPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub detector: DetectorConfig,
    pub stream: StreamProfile,
    pub output: OutputSettings,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error("stream profile: {0}")]
    Stream(#[from] ProfileError),
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults when `path` is `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.detector.validate()?;
        self.stream.validate()?;
        Ok(())
    }
}
