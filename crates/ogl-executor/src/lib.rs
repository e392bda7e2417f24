//! Executor selection and caching for accelerated linear solvers.
//!
//! Solvers running inside a host simulation call into this crate once per
//! solve to obtain the compute executor for their field:
//!
//! - **configuration**: `executor`, `verbose`, `ranksPerGPU` and
//!   `forceHostBuffer` are read from the solver dictionary with defaults
//! - **device mapping**: the process rank selects a device index, wrapped
//!   around the devices the runtime reports
//! - **caching**: one executor per `"<executor>_<field>"` key lives in an
//!   explicit [`ObjectRegistry`] and is shared by every later solver call
//! - **communicators**: a host-staged communicator on demand and a
//!   device communicator built with each handler
//!
//! ```
//! use std::sync::Arc;
//! use ogl_executor::{
//!     BackendKind, ExecutionContext, ExecutorHandler, ObjectRegistry, SerialGroup,
//!     SolverControls, StaticRuntime,
//! };
//!
//! let registry = Arc::new(ObjectRegistry::new());
//! let ctx = ExecutionContext::new(Arc::new(SerialGroup), Arc::new(StaticRuntime::reference_only()));
//! let controls = SolverControls::new().with("executor", "reference");
//!
//! let handler = ExecutorHandler::new(&registry, &controls, "p", &ctx).unwrap();
//! let exec = handler.device_executor().unwrap();
//! assert_eq!(exec.kind(), BackendKind::Reference);
//! ```

pub mod backend;
pub mod comm;
pub mod config;
pub mod device;
pub mod error;
pub mod handler;
pub mod persistent;
pub mod registry;

pub use backend::{
    BackendKind, BackendSpec, Executor, ExecutorRuntime, ModuleVersion, NOT_COMPILED_TAG,
    Placement, StaticRuntime, VersionInfo,
};
pub use comm::{Communicator, ProcessGroup, SerialGroup, StaticGroup};
pub use config::{ExecutorSettings, SolverControls};
pub use device::DeviceAssignment;
pub use error::{ExecutorError, Result};
pub use handler::{ExecutionContext, ExecutorHandler, ExecutorInitFunctor, PersistentExecutor};
pub use persistent::{Persistent, PersistentFactory};
pub use registry::ObjectRegistry;
