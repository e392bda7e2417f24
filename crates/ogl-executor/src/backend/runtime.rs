//! Runtime whose capabilities are fixed at construction.
//!
//! `StaticRuntime::from_build()` mirrors what the binary was built with: a
//! backend is compiled when its cargo feature is enabled. Device counts are
//! not discoverable without the vendor runtimes, so they default to one
//! device per compiled accelerator backend and can be overridden.

use std::collections::BTreeMap;

use super::traits::{ExecutorRuntime, ModuleVersion, VersionInfo};
use super::BackendKind;

const LIBRARY_VERSION: (u32, u32, u32) = (1, 8, 0);

#[derive(Debug, Clone)]
pub struct StaticRuntime {
    version: VersionInfo,
    devices: BTreeMap<BackendKind, usize>,
}

fn compiled_module() -> ModuleVersion {
    let (major, minor, patch) = LIBRARY_VERSION;
    ModuleVersion::compiled(major, minor, patch)
}

impl StaticRuntime {
    /// Runtime with only the reference backend.
    pub fn reference_only() -> Self {
        Self {
            version: VersionInfo::reference_only(compiled_module()),
            devices: BTreeMap::new(),
        }
    }

    /// Runtime matching the enabled cargo features.
    pub fn from_build() -> Self {
        let compiled = [
            (BackendKind::Cuda, cfg!(feature = "cuda")),
            (BackendKind::Hip, cfg!(feature = "hip")),
            (BackendKind::Dpcpp, cfg!(feature = "dpcpp")),
            (BackendKind::Omp, cfg!(feature = "omp")),
        ];
        compiled
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .fold(Self::reference_only(), |rt, (kind, _)| {
                let devices = if kind.is_device() { 1 } else { 0 };
                rt.with_backend(kind, devices)
            })
    }

    /// Mark `kind` as compiled and visible with `num_devices` devices.
    pub fn with_backend(mut self, kind: BackendKind, num_devices: usize) -> Self {
        self.version = self.version.with_module(kind, compiled_module());
        self.devices.insert(kind, num_devices);
        self
    }

    /// Override the device count of an already compiled backend.
    ///
    /// Has no effect on backends that are not compiled.
    pub fn with_devices(mut self, kind: BackendKind, num_devices: usize) -> Self {
        if self.version.is_compiled(kind) && kind.is_device() {
            self.devices.insert(kind, num_devices);
        }
        self
    }

    /// Runtime with every backend compiled and `num_devices` per accelerator.
    pub fn all_backends(num_devices: usize) -> Self {
        BackendKind::ALL
            .into_iter()
            .filter(|kind| kind.spec().requires_capability)
            .fold(Self::reference_only(), |rt, kind| {
                let devices = if kind.is_device() { num_devices } else { 0 };
                rt.with_backend(kind, devices)
            })
    }
}

impl Default for StaticRuntime {
    fn default() -> Self {
        Self::from_build()
    }
}

impl ExecutorRuntime for StaticRuntime {
    fn version_info(&self) -> &VersionInfo {
        &self.version
    }

    fn num_devices(&self, kind: BackendKind) -> usize {
        if !kind.is_device() {
            return 0;
        }
        self.devices.get(&kind).copied().unwrap_or(0)
    }
}
