//! Process group and collective communicator handles.
//!
//! The MPI environment is represented by a [`ProcessGroup`]: it knows whether
//! the run is distributed, the rank of this process, and how to build a
//! communicator over the global group. Communicator construction is a
//! collective operation; every rank has to take the same construction path
//! or the group hangs.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::trace;

static NEXT_COMMUNICATOR_ID: AtomicU64 = AtomicU64::new(0);

/// Collective-communication context over the global process group.
///
/// `force_host_buffer` stages data through host memory before each
/// collective transfer. Without it, device buffers are exchanged directly
/// where the transport supports it.
#[derive(Debug, PartialEq, Eq)]
pub struct Communicator {
    id: u64,
    rank: usize,
    size: usize,
    force_host_buffer: bool,
}

impl Communicator {
    pub fn new(rank: usize, size: usize, force_host_buffer: bool) -> Self {
        Self {
            id: NEXT_COMMUNICATOR_ID.fetch_add(1, Ordering::Relaxed),
            rank,
            size,
            force_host_buffer,
        }
    }

    /// Process-unique identifier of this communicator instance.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn force_host_buffer(&self) -> bool {
        self.force_host_buffer
    }
}

impl fmt::Display for Communicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "comm#{} (rank {}/{}, {})",
            self.id,
            self.rank,
            self.size,
            if self.force_host_buffer { "host buffer" } else { "device buffer" }
        )
    }
}

/// The distributed environment this process runs in.
pub trait ProcessGroup: Send + Sync {
    /// Whether the run was launched in parallel mode, possibly on one rank.
    fn par_run(&self) -> bool;

    /// Rank of this process. 0 for serial runs.
    fn rank(&self) -> usize;

    /// Number of processes in the global group.
    fn size(&self) -> usize;

    /// Build a communicator over the global group.
    fn communicator(&self, force_host_buffer: bool) -> Arc<Communicator>;
}

/// Non-distributed run.
///
/// The executor handler never builds communicators in a serial run;
/// `communicator` exists only to satisfy [`ProcessGroup`] and returns a
/// single-rank context.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialGroup;

impl ProcessGroup for SerialGroup {
    fn par_run(&self) -> bool {
        false
    }

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn communicator(&self, force_host_buffer: bool) -> Arc<Communicator> {
        Arc::new(Communicator::new(0, 1, force_host_buffer))
    }
}

/// Distributed run with a fixed rank and size.
///
/// A group is parallel by default, including a single-rank group launched
/// in parallel mode. Counts the communicators it hands out, which makes the
/// collective construction paths observable.
#[derive(Debug)]
pub struct StaticGroup {
    rank: usize,
    size: usize,
    parallel: bool,
    created: AtomicUsize,
}

impl StaticGroup {
    /// Group of `size` ranks seen from `rank`.
    ///
    /// Returns `None` when `rank` is outside the group.
    pub fn new(rank: usize, size: usize) -> Option<Self> {
        if rank >= size {
            return None;
        }
        Some(Self {
            rank,
            size,
            parallel: true,
            created: AtomicUsize::new(0),
        })
    }

    /// Set whether the run counts as distributed.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Number of communicators built so far.
    pub fn communicators_created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

impl ProcessGroup for StaticGroup {
    fn par_run(&self) -> bool {
        self.parallel
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn communicator(&self, force_host_buffer: bool) -> Arc<Communicator> {
        self.created.fetch_add(1, Ordering::Relaxed);
        let comm = Arc::new(Communicator::new(self.rank, self.size, force_host_buffer));
        trace!(%comm, "created communicator");
        comm
    }
}
