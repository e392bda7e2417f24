//! Rank to accelerator mapping.
//!
//! Consecutive ranks are packed onto one device index `gpus_per_rank` at a
//! time (the setting is read from `ranksPerGPU`). The resulting index is
//! wrapped around the number of devices the runtime reports, so more ranks
//! than devices share devices round-robin instead of failing.

use std::num::NonZeroUsize;

use crate::comm::ProcessGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAssignment {
    pub rank: usize,
    pub gpus_per_rank: NonZeroUsize,
    /// Unwrapped device index, `rank / gpus_per_rank`
    pub device_index: usize,
}

impl DeviceAssignment {
    /// Assignment for a process at `rank`.
    ///
    /// Serial runs always get device index 0.
    pub fn new(rank: usize, gpus_per_rank: NonZeroUsize, distributed: bool) -> Self {
        let device_index = if distributed {
            rank / gpus_per_rank
        } else {
            0
        };
        Self {
            rank,
            gpus_per_rank,
            device_index,
        }
    }

    /// Assignment for this process within `group`.
    pub fn for_group(group: &dyn ProcessGroup, gpus_per_rank: NonZeroUsize) -> Self {
        let distributed = group.par_run();
        let rank = if distributed { group.rank() } else { 0 };
        Self::new(rank, gpus_per_rank, distributed)
    }

    /// Physical device among `num_devices`, or `None` without devices.
    pub fn wrap(&self, num_devices: usize) -> Option<usize> {
        if num_devices == 0 {
            return None;
        }
        Some(self.device_index % num_devices)
    }
}
