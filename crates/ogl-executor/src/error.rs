//! Error types for ogl-executor

use thiserror::Error;

use crate::backend::BackendKind;

pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Configuration failures raised while selecting or building an executor.
///
/// Every variant is a startup-time misconfiguration. None of them is
/// retryable; the top-level caller decides how to terminate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("unsupported executor: {name}. Valid choices are: cuda, hip, dpcpp, omp, or reference")]
    UnsupportedBackend { name: String },

    #[error(
        "{} backend was not compiled. Recompile with {} backend enabled.",
        .backend.label(),
        .backend.label()
    )]
    BackendNotAvailable { backend: BackendKind },

    #[error("{} backend is compiled but the runtime reports no devices", .backend.label())]
    NoDevices { backend: BackendKind },

    #[error("invalid solver setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },
}

impl ExecutorError {
    /// All executor errors abort the run; there is no recoverable variant.
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// Backend named by the error, if the error is tied to one.
    pub fn backend(&self) -> Option<BackendKind> {
        match self {
            ExecutorError::BackendNotAvailable { backend } | ExecutorError::NoDevices { backend } => {
                Some(*backend)
            }
            ExecutorError::UnsupportedBackend { .. } | ExecutorError::InvalidSetting { .. } => None,
        }
    }
}
