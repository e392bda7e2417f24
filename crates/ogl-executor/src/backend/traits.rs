//! Runtime trait and handle types for compute executors.
//!
//! The accelerator library itself is out of reach of this crate. These types
//! capture the part of it the executor factory relies on: which backends
//! were compiled in, how many devices each one sees, and how to construct an
//! executor handle bound to a device.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::BackendKind;

/// Version tag the accelerator library reports for a backend that is not
/// part of the build.
pub const NOT_COMPILED_TAG: &str = "not compiled";

/// Version of one backend module of the accelerator library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Build tag, or [`NOT_COMPILED_TAG`]
    pub tag: String,
}

impl ModuleVersion {
    pub fn compiled(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            tag: "release".to_string(),
        }
    }

    pub fn not_compiled() -> Self {
        Self {
            major: 0,
            minor: 0,
            patch: 0,
            tag: NOT_COMPILED_TAG.to_string(),
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.tag != NOT_COMPILED_TAG
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_compiled() {
            write!(f, "{}.{}.{} ({})", self.major, self.minor, self.patch, self.tag)
        } else {
            f.write_str(NOT_COMPILED_TAG)
        }
    }
}

/// Per-backend version report of the accelerator library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    modules: BTreeMap<BackendKind, ModuleVersion>,
}

impl VersionInfo {
    /// Report where only the reference module is compiled.
    pub fn reference_only(version: ModuleVersion) -> Self {
        let modules = BackendKind::ALL
            .into_iter()
            .map(|kind| {
                let v = if kind == BackendKind::Reference {
                    version.clone()
                } else {
                    ModuleVersion::not_compiled()
                };
                (kind, v)
            })
            .collect();
        Self { modules }
    }

    pub fn with_module(mut self, kind: BackendKind, version: ModuleVersion) -> Self {
        self.modules.insert(kind, version);
        self
    }

    pub fn module(&self, kind: BackendKind) -> Option<&ModuleVersion> {
        self.modules.get(&kind)
    }

    /// Whether the backend's module is part of the build.
    ///
    /// The reference backend needs no capability and is always reported as
    /// compiled.
    pub fn is_compiled(&self, kind: BackendKind) -> bool {
        if !kind.spec().requires_capability {
            return true;
        }
        self.module(kind).is_some_and(ModuleVersion::is_compiled)
    }
}

/// Opaque compute-backend context.
///
/// Executors are immutable once built and shared through `Arc`. A device
/// executor carries the host executor that stages its data; host executors
/// are their own master.
#[derive(Debug)]
pub struct Executor {
    kind: BackendKind,
    device_id: Option<usize>,
    master: Option<Arc<Executor>>,
}

impl Executor {
    /// Single-threaded host executor.
    pub fn reference() -> Self {
        Self {
            kind: BackendKind::Reference,
            device_id: None,
            master: None,
        }
    }

    /// Multi-threaded host executor.
    pub fn omp() -> Self {
        Self {
            kind: BackendKind::Omp,
            device_id: None,
            master: None,
        }
    }

    /// Accelerator executor on `device_id`, staged through `master`.
    pub fn device(kind: BackendKind, device_id: usize, master: Arc<Executor>) -> Self {
        Self {
            kind,
            device_id: Some(device_id),
            master: Some(master),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Device index for accelerator executors, `None` on the host.
    pub fn device_id(&self) -> Option<usize> {
        self.device_id
    }

    /// Host executor backing this one. Host executors return themselves.
    pub fn master(self: &Arc<Self>) -> Arc<Executor> {
        match &self.master {
            Some(master) => Arc::clone(master),
            None => Arc::clone(self),
        }
    }
}

impl fmt::Display for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device_id {
            Some(id) => write!(f, "{}:{}", self.kind, id),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Capabilities of the accelerator runtime the factory builds on.
pub trait ExecutorRuntime: Send + Sync {
    /// Compiled-in backends and their versions.
    fn version_info(&self) -> &VersionInfo;

    /// Number of devices the runtime sees for `kind`.
    ///
    /// For `dpcpp` this counts GPU devices only. Host backends report 0.
    fn num_devices(&self, kind: BackendKind) -> usize;

    /// Build the host reference executor.
    fn create_reference(&self) -> Arc<Executor> {
        Arc::new(Executor::reference())
    }

    /// Build an executor of `kind`.
    ///
    /// Device backends receive a wrapped device index and the host master;
    /// host backends ignore both.
    fn create_executor(
        &self,
        kind: BackendKind,
        device_id: usize,
        master: Arc<Executor>,
    ) -> Arc<Executor> {
        match kind {
            BackendKind::Reference => master,
            BackendKind::Omp => Arc::new(Executor::omp()),
            BackendKind::Cuda | BackendKind::Hip | BackendKind::Dpcpp => {
                Arc::new(Executor::device(kind, device_id, master))
            }
        }
    }
}
