//! Solver control dictionary and executor settings.
//!
//! The host framework hands every linear solver a dictionary of controls.
//! Only four entries matter for executor selection; all of them are
//! optional and fall back to defaults.

use std::num::NonZeroUsize;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ExecutorError, Result};

pub const EXECUTOR_KEY: &str = "executor";
pub const VERBOSE_KEY: &str = "verbose";
pub const RANKS_PER_GPU_KEY: &str = "ranksPerGPU";
pub const FORCE_HOST_BUFFER_KEY: &str = "forceHostBuffer";

/// Key-value store of solver controls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolverControls {
    entries: Map<String, Value>,
}

impl SolverControls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object, e.g. the `solvers.p` sub-dictionary.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|err| ExecutorError::InvalidSetting {
            key: "<dictionary>".to_string(),
            reason: err.to_string(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| ExecutorError::InvalidSetting {
            key: "<dictionary>".to_string(),
            reason: format!("{}: {err}", path.display()),
        })?;
        Self::from_json_str(&text)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Value of `key`, or `default` when the key is absent.
    ///
    /// A present entry of the wrong type is an error, not a silent default.
    pub fn lookup_or_default<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.entries.get(key) {
            None => Ok(default),
            Some(value) => {
                T::deserialize(value).map_err(|err| ExecutorError::InvalidSetting {
                    key: key.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }
}

/// Executor-related entries of a solver dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorSettings {
    /// Backend name, kept as configured
    pub executor: String,
    /// Verbosity level
    pub verbose: i64,
    /// Ranks sharing one device index; zero is rejected when parsed
    #[serde(rename = "ranksPerGPU")]
    pub ranks_per_gpu: NonZeroUsize,
    /// Stage collective transfers through host memory
    pub force_host_buffer: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            executor: "reference".to_string(),
            verbose: 0,
            ranks_per_gpu: NonZeroUsize::MIN,
            force_host_buffer: false,
        }
    }
}

impl ExecutorSettings {
    /// Read the settings, applying defaults for missing keys.
    pub fn from_controls(controls: &SolverControls) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            executor: controls.lookup_or_default(EXECUTOR_KEY, defaults.executor)?,
            verbose: controls.lookup_or_default(VERBOSE_KEY, defaults.verbose)?,
            ranks_per_gpu: controls.lookup_or_default(RANKS_PER_GPU_KEY, defaults.ranks_per_gpu)?,
            force_host_buffer: controls
                .lookup_or_default(FORCE_HOST_BUFFER_KEY, defaults.force_host_buffer)?,
        })
    }
}
