//! Process-group abstraction for metadata distribution.
//!
//! The reader needs exactly one collective: a root-to-all broadcast of a
//! length followed by a byte buffer. [`Communicator`] captures that surface;
//! [`NoComm`] is the serial default, [`LocalGroup`] links threads of one
//! process into a group for testing collective logic, and `MpiComm` (behind
//! the `mpi-support` feature) runs on a real MPI world.
//!
//! Wire convention: lengths travel as LE fixed-width u64.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::errors::{Error, Result};

/// Minimal group-collective interface.
pub trait Communicator: Send + Sync {
    /// Rank of this process (0..size-1).
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn size(&self) -> usize;

    /// Broadcast `buf` from `root` to every rank. All ranks must pass
    /// buffers of identical length.
    fn bcast_bytes(&self, buf: &mut [u8], root: usize) -> Result<()>;

    /// Broadcast a single u64 from `root` to every rank.
    fn bcast_u64(&self, value: &mut u64, root: usize) -> Result<()> {
        let mut bytes = value.to_le_bytes();
        self.bcast_bytes(&mut bytes, root)?;
        *value = u64::from_le_bytes(bytes);
        Ok(())
    }
}

/// Compile-time no-op comm for serial runs.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn bcast_bytes(&self, _buf: &mut [u8], _root: usize) -> Result<()> {
        Ok(())
    }
}

// --- LocalGroup: threads of one process acting as a rank group ---

#[derive(Default)]
struct GroupState {
    epoch: u64,
    data: Vec<u8>,
    consumed: usize,
}

struct GroupShared {
    state: Mutex<GroupState>,
    cv: Condvar,
    size: usize,
}

/// Thread-backed rank group. [`LocalGroup::split`] produces one communicator
/// per rank; each must be moved to its own thread. Broadcasts are matched by
/// call order, as in any collective API.
pub struct LocalGroup {
    rank: usize,
    shared: Arc<GroupShared>,
    seen: AtomicU64,
}

impl LocalGroup {
    /// Create a group of `size` linked communicators.
    pub fn split(size: usize) -> Vec<LocalGroup> {
        let shared = Arc::new(GroupShared {
            state: Mutex::new(GroupState {
                epoch: 0,
                data: Vec::new(),
                // the previous (nonexistent) round counts as fully consumed
                consumed: size.saturating_sub(1),
            }),
            cv: Condvar::new(),
            size,
        });
        (0..size)
            .map(|rank| LocalGroup {
                rank,
                shared: Arc::clone(&shared),
                seen: AtomicU64::new(0),
            })
            .collect()
    }
}

impl Communicator for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn bcast_bytes(&self, buf: &mut [u8], root: usize) -> Result<()> {
        if root >= self.shared.size {
            return Err(Error::BroadcastFailed {
                reason: format!("root {root} out of range for group of {}", self.shared.size),
            });
        }
        let mut state = self.shared.state.lock().expect("group state poisoned");
        if self.rank == root {
            while state.consumed + 1 < self.shared.size {
                state = self.shared.cv.wait(state).expect("group state poisoned");
            }
            state.data = buf.to_vec();
            state.epoch += 1;
            state.consumed = 0;
            self.seen.store(state.epoch, Ordering::Relaxed);
            self.shared.cv.notify_all();
        } else {
            let seen = self.seen.load(Ordering::Relaxed);
            while state.epoch == seen {
                state = self.shared.cv.wait(state).expect("group state poisoned");
            }
            self.seen.store(state.epoch, Ordering::Relaxed);
            state.consumed += 1;
            let matched = state.data.len() == buf.len();
            if matched {
                buf.copy_from_slice(&state.data);
            }
            self.shared.cv.notify_all();
            if !matched {
                return Err(Error::BroadcastFailed {
                    reason: format!(
                        "rank {} expected {} bytes, root sent {}",
                        self.rank,
                        buf.len(),
                        state.data.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

// --- MPI backend ---

#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use mpi::collective::Root;
    use mpi::environment::Universe;
    use mpi::topology::{Communicator as _, SimpleCommunicator};

    use super::Communicator;
    use crate::errors::Result;

    /// Communicator over the MPI world. Holds the `Universe` so MPI stays
    /// initialized for the life of the group.
    pub struct MpiComm {
        _universe: Universe,
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl Default for MpiComm {
        fn default() -> Self {
            let universe = mpi::initialize().expect("MPI initialization failed");
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self {
                _universe: universe,
                world,
                rank,
                size,
            }
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn bcast_bytes(&self, buf: &mut [u8], root: usize) -> Result<()> {
            self.world.process_at_rank(root as i32).broadcast_into(buf);
            Ok(())
        }

        fn bcast_u64(&self, value: &mut u64, root: usize) -> Result<()> {
            self.world.process_at_rank(root as i32).broadcast_into(value);
            Ok(())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_comm_is_a_serial_group() {
        let comm = NoComm;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        let mut v = 42u64;
        comm.bcast_u64(&mut v, 0).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn local_group_broadcasts_from_highest_rank() {
        let size = 4;
        let root = size - 1;
        let comms = LocalGroup::split(size);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let mut len = if comm.rank() == root { 3u64 } else { 0 };
                    comm.bcast_u64(&mut len, root).unwrap();
                    let mut buf = if comm.rank() == root {
                        b"abc".to_vec()
                    } else {
                        vec![0u8; len as usize]
                    };
                    comm.bcast_bytes(&mut buf, root).unwrap();
                    buf
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), b"abc");
        }
    }

    #[test]
    fn local_group_supports_consecutive_rounds() {
        let comms = LocalGroup::split(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let mut out = Vec::new();
                    for round in 0..3u64 {
                        let mut v = if comm.rank() == 1 { round * 7 } else { 0 };
                        comm.bcast_u64(&mut v, 1).unwrap();
                        out.push(v);
                    }
                    out
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), [0, 7, 14]);
        }
    }
}
