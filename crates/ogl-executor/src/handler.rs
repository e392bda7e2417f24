//! Executor factory and the per-field executor handle solvers hold.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, info};

use crate::backend::{BackendKind, Executor, ExecutorRuntime, Placement};
use crate::comm::{Communicator, ProcessGroup};
use crate::config::{ExecutorSettings, SolverControls};
use crate::device::DeviceAssignment;
use crate::error::{ExecutorError, Result};
use crate::persistent::{Persistent, PersistentFactory};
use crate::registry::ObjectRegistry;

/// Process environment an executor is built in.
#[derive(Clone)]
pub struct ExecutionContext {
    pub group: Arc<dyn ProcessGroup>,
    pub runtime: Arc<dyn ExecutorRuntime>,
}

impl ExecutionContext {
    pub fn new(group: Arc<dyn ProcessGroup>, runtime: Arc<dyn ExecutorRuntime>) -> Self {
        Self { group, runtime }
    }
}

/// Builds the executor for one (backend, field) pair.
pub struct ExecutorInitFunctor {
    comm: Option<Arc<Communicator>>,
    assignment: DeviceAssignment,
    executor_name: String,
    field_name: String,
    verbose: i64,
    runtime: Arc<dyn ExecutorRuntime>,
}

impl ExecutorInitFunctor {
    /// In a distributed run this builds a communicator right away, so every
    /// rank must construct the functor.
    pub fn new(
        executor_name: &str,
        field_name: &str,
        verbose: i64,
        gpus_per_rank: NonZeroUsize,
        force_host_buffer: bool,
        ctx: &ExecutionContext,
    ) -> Self {
        let comm = if ctx.group.par_run() {
            Some(ctx.group.communicator(force_host_buffer))
        } else {
            None
        };
        Self {
            comm,
            assignment: DeviceAssignment::for_group(ctx.group.as_ref(), gpus_per_rank),
            executor_name: executor_name.to_string(),
            field_name: field_name.to_string(),
            verbose,
            runtime: Arc::clone(&ctx.runtime),
        }
    }

    pub fn device_assignment(&self) -> DeviceAssignment {
        self.assignment
    }

    pub fn communicator(&self) -> Option<&Arc<Communicator>> {
        self.comm.as_ref()
    }

    pub fn executor_name(&self) -> &str {
        &self.executor_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn verbose(&self) -> i64 {
        self.verbose
    }
}

impl PersistentFactory for ExecutorInitFunctor {
    type Object = Executor;
    type Error = ExecutorError;

    fn init(&self) -> Result<Arc<Executor>> {
        let host = self.runtime.create_reference();
        let kind: BackendKind = self.executor_name.parse()?;
        let spec = kind.spec();

        if spec.requires_capability && !self.runtime.version_info().is_compiled(kind) {
            return Err(ExecutorError::BackendNotAvailable { backend: kind });
        }

        let device_id = match spec.placement {
            Placement::Host => 0,
            Placement::Device => self
                .assignment
                .wrap(self.runtime.num_devices(kind))
                .ok_or(ExecutorError::NoDevices { backend: kind })?,
        };

        let exec = self.runtime.create_executor(kind, device_id, host);
        if self.verbose > 0 {
            info!(field = %self.field_name, rank = self.assignment.rank, %exec, "created executor");
        } else {
            debug!(field = %self.field_name, rank = self.assignment.rank, %exec, "created executor");
        }
        Ok(exec)
    }

    /// Executors are immutable; a cached one never needs refreshing.
    fn update(&self, _object: &Arc<Executor>) {}
}

/// Cached executor and communicators for one solver field.
///
/// Handlers are cheap to rebuild on every solver call: the executor lives in
/// the registry under `"<executor>_<field>"` and is built only once.
pub struct ExecutorHandler {
    persistent: Persistent<ExecutorInitFunctor>,
    force_host_buffer: bool,
    // Built per handler, not cached with the executor.
    device_comm: Option<Arc<Communicator>>,
    device_executor_name: String,
    group: Arc<dyn ProcessGroup>,
}

pub type PersistentExecutor = ExecutorHandler;

impl ExecutorHandler {
    pub fn new(
        registry: &Arc<ObjectRegistry>,
        solver_controls: &SolverControls,
        field_name: &str,
        ctx: &ExecutionContext,
    ) -> Result<Self> {
        let settings = ExecutorSettings::from_controls(solver_controls)?;
        Self::from_settings(registry, &settings, field_name, ctx)
    }

    pub fn from_settings(
        registry: &Arc<ObjectRegistry>,
        settings: &ExecutorSettings,
        field_name: &str,
        ctx: &ExecutionContext,
    ) -> Result<Self> {
        settings.executor.parse::<BackendKind>()?;

        let key = format!("{}_{}", settings.executor, field_name);
        let functor = ExecutorInitFunctor::new(
            &settings.executor,
            field_name,
            settings.verbose,
            settings.ranks_per_gpu,
            settings.force_host_buffer,
            ctx,
        );
        let persistent = Persistent::new(key, Arc::clone(registry), functor, true, settings.verbose)?;

        let device_comm = if ctx.group.par_run() {
            Some(ctx.group.communicator(settings.force_host_buffer))
        } else {
            None
        };

        Ok(Self {
            persistent,
            force_host_buffer: settings.force_host_buffer,
            device_comm,
            device_executor_name: settings.executor.clone(),
            group: Arc::clone(&ctx.group),
        })
    }

    pub fn force_host_buffer(&self) -> bool {
        self.force_host_buffer
    }

    /// Registry key of the cached executor.
    pub fn key(&self) -> &str {
        self.persistent.key()
    }

    pub fn field_name(&self) -> &str {
        self.persistent.factory().field_name()
    }

    pub fn device_assignment(&self) -> DeviceAssignment {
        self.persistent.factory().device_assignment()
    }

    /// Executor for this field, built on first use.
    pub fn device_executor(&self) -> Result<Arc<Executor>> {
        self.persistent.get_persistent_object()
    }

    /// Host executor backing the device executor.
    pub fn host_executor(&self) -> Result<Arc<Executor>> {
        Ok(self.device_executor()?.master())
    }

    /// Backend name as configured.
    pub fn backend_name(&self) -> &str {
        &self.device_executor_name
    }

    /// A new host-staged communicator on every call; `None` in serial runs.
    pub fn host_buffer_communicator(&self) -> Option<Arc<Communicator>> {
        if !self.group.par_run() {
            return None;
        }
        Some(self.group.communicator(self.force_host_buffer))
    }

    /// The communicator built with this handler.
    pub fn device_communicator(&self) -> Option<Arc<Communicator>> {
        self.device_comm.clone()
    }
}
