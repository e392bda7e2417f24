//! Compute backend abstraction layer.
//!
//! This module names the backends an executor can target and describes, per
//! backend, what the accelerator runtime must provide before an executor can
//! be built on it. The actual device work is done by whatever
//! [`ExecutorRuntime`] the caller passes in.
//!
//! # Backends
//!
//! - **reference**: single-threaded host executor. Always available and the
//!   host master of every device executor.
//! - **omp** (`--features omp`): multi-threaded host executor.
//! - **cuda** / **hip** / **dpcpp** (`--features cuda|hip|dpcpp`): device
//!   executors bound to one accelerator and backed by a reference master.
//!
//! # Dispatch
//!
//! ```text
//! "cuda" ──FromStr──▶ BackendKind::Cuda ──spec()──▶ BackendSpec
//!                                                    │ label      "CUDA"
//!                                                    │ requires   compiled capability
//!                                                    ▼ placement  Device
//!                                        ExecutorRuntime::create_executor
//! ```
//!
//! Adding a backend means adding a variant and its `spec()` arm; the
//! compiler rejects a missing arm.

pub mod runtime;
pub mod traits;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExecutorError;

pub use runtime::StaticRuntime;
pub use traits::*;

/// Compute backends understood by the executor factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Cuda,
    Hip,
    Dpcpp,
    Omp,
    Reference,
}

/// Where an executor of a given backend lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Host-only executor, no device index.
    Host,
    /// Accelerator executor bound to a device index and a host master.
    Device,
}

/// Dispatch-table entry for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendSpec {
    /// Name used in user-facing messages ("CUDA", "SYCL", ...)
    pub label: &'static str,
    /// Whether the backend must be compiled into the runtime
    pub requires_capability: bool,
    /// Host or device executor
    pub placement: Placement,
}

impl BackendKind {
    /// Every backend, in the order they are listed to users.
    pub const ALL: [BackendKind; 5] = [
        BackendKind::Cuda,
        BackendKind::Hip,
        BackendKind::Dpcpp,
        BackendKind::Omp,
        BackendKind::Reference,
    ];

    /// Configuration name of this backend.
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Cuda => "cuda",
            BackendKind::Hip => "hip",
            BackendKind::Dpcpp => "dpcpp",
            BackendKind::Omp => "omp",
            BackendKind::Reference => "reference",
        }
    }

    /// Dispatch-table entry for this backend.
    pub fn spec(&self) -> BackendSpec {
        match self {
            BackendKind::Cuda => BackendSpec {
                label: "CUDA",
                requires_capability: true,
                placement: Placement::Device,
            },
            BackendKind::Hip => BackendSpec {
                label: "HIP",
                requires_capability: true,
                placement: Placement::Device,
            },
            BackendKind::Dpcpp => BackendSpec {
                label: "SYCL",
                requires_capability: true,
                placement: Placement::Device,
            },
            BackendKind::Omp => BackendSpec {
                label: "OMP",
                requires_capability: true,
                placement: Placement::Host,
            },
            BackendKind::Reference => BackendSpec {
                label: "Reference",
                requires_capability: false,
                placement: Placement::Host,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        self.spec().label
    }

    pub fn is_device(&self) -> bool {
        self.spec().placement == Placement::Device
    }

    /// Comma-separated vocabulary, e.g. for usage text.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(BackendKind::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = ExecutorError;

    /// Exact, case-sensitive match against the backend vocabulary.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ExecutorError::UnsupportedBackend {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names_round_trip() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.name().parse::<BackendKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        let err = "CUDA".parse::<BackendKind>().unwrap_err();
        assert_eq!(
            err,
            ExecutorError::UnsupportedBackend {
                name: "CUDA".to_string()
            }
        );
        assert!("Reference".parse::<BackendKind>().is_err());
        assert!("".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_dispatch_table() {
        assert_eq!(BackendKind::Cuda.label(), "CUDA");
        assert_eq!(BackendKind::Dpcpp.label(), "SYCL");
        assert!(BackendKind::Hip.is_device());
        assert!(!BackendKind::Omp.is_device());
        assert!(BackendKind::Omp.spec().requires_capability);
        assert!(!BackendKind::Reference.spec().requires_capability);
    }

    #[test]
    fn test_valid_names_order() {
        assert_eq!(BackendKind::valid_names(), "cuda, hip, dpcpp, omp, reference");
    }
}
