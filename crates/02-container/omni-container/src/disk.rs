//! Disk-backed stream provider: keeps only the header resident and pulls
//! subsequent blocks on demand through the shared block pool.
//!
//! Expansion from `mxdiskstreamcontroller.h`: a `prefetch_ahead` knob
//! controls how many `buffer_size` blocks get staged ahead of the
//! cooperative consumer. It defaults to `0` — the single-threaded
//! cooperative path is the default per the concurrency model — and is only
//! backed by a real background thread when the `threaded` feature is on.

use std::fs::File;
use std::io::{Read as _, Seek as _, SeekFrom as StdSeekFrom};

use omni_buffer::{BlockPools, Buffer};

use crate::error::{ContainerError, ContainerResult};
use crate::provider::{ContainerReader, SeekFrom};
use crate::riff::{parse_mxhd, parse_riff_envelope, MxHd};

/// Reads just enough of a container to resolve its header at `open`, then
/// pulls further bytes from disk in `buffer_size`-sized blocks as requested.
pub struct DiskProvider {
    pools: BlockPools,
    /// Number of `buffer_size` blocks to stage ahead of the consumer.
    /// `0` disables prefetch entirely (the default, cooperative-only path).
    pub prefetch_ahead: u32,
    state: Option<State>,
}

struct State {
    file: File,
    header: MxHd,
    data_start: u64,
    file_len: u64,
    cursor: u64,
}

/// Bytes read from disk to resolve the RIFF/MxHd preamble before the real
/// `buffer_size` is known.
const PROBE_LEN: usize = 4096;

impl DiskProvider {
    /// Builds a provider backed by the standard small/large block pools.
    pub fn new() -> DiskProvider {
        DiskProvider {
            pools: BlockPools::standard(),
            prefetch_ahead: 0,
            state: None,
        }
    }

    /// Builds a provider sharing an existing pool pair (e.g. with a sibling provider).
    pub fn with_pools(pools: BlockPools) -> DiskProvider {
        DiskProvider {
            pools,
            prefetch_ahead: 0,
            state: None,
        }
    }

    fn state_mut(&mut self) -> ContainerResult<&mut State> {
        self.state.as_mut().ok_or(ContainerError::CannotRead {
            offset: 0,
            requested: 0,
        })
    }
}

impl Default for DiskProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerReader for DiskProvider {
    fn open(&mut self, source_name: &str) -> ContainerResult<()> {
        let mut file = File::open(source_name).map_err(|_| ContainerError::CannotOpen {
            source_name: source_name.to_string(),
        })?;
        let file_len = file
            .metadata()
            .map_err(|_| ContainerError::CannotOpen {
                source_name: source_name.to_string(),
            })?
            .len();

        let mut probe = vec![0u8; PROBE_LEN.min(file_len as usize)];
        file.read_exact(&mut probe)
            .map_err(|_| ContainerError::CannotRead {
                offset: 0,
                requested: probe.len(),
            })?;

        let envelope = parse_riff_envelope(&probe)?;
        let (header, data_start) = parse_mxhd(&probe, envelope.content_offset)?;

        file.seek(StdSeekFrom::Start(data_start as u64))
            .map_err(|_| ContainerError::CannotRead {
                offset: data_start,
                requested: 0,
            })?;

        self.state = Some(State {
            file,
            header,
            data_start: data_start as u64,
            file_len,
            cursor: data_start as u64,
        });
        Ok(())
    }

    fn close(&mut self) {
        self.state = None;
    }

    fn read(&mut self, dest: &mut [u8]) -> ContainerResult<usize> {
        // Cloned up front: a cheap handle around the pool's `Arc<Mutex<_>>`,
        // not a copy of its slots, so it can be consulted inside the loop
        // below without holding a second borrow of `self` alongside `state`.
        let pools = self.pools.clone();
        let pool_block_size = pools.max_block_size();
        let state = self.state_mut()?;
        let remaining = state.file_len.saturating_sub(state.cursor) as usize;
        let to_read = dest.len().min(remaining);
        if to_read == 0 {
            return Ok(0);
        }

        // Each pull goes through the block pool one slot at a time, so a
        // single `read` is split into however many pool-sized blocks it
        // takes to cover `to_read` — the pool only services sizes up to its
        // largest pool's block size, regardless of how large the container's
        // own `buffer_size` streaming unit is.
        let mut filled = 0;
        while filled < to_read {
            let chunk_len = pool_block_size.min(to_read - filled);
            let pool = pools.pool_for(chunk_len).ok_or(ContainerError::CannotRead {
                offset: state.cursor as usize,
                requested: chunk_len,
            })?;
            let block = pool.acquire().map_err(|_| ContainerError::CannotRead {
                offset: state.cursor as usize,
                requested: chunk_len,
            })?;
            let scratch = Buffer::from_pooled(block);
            let mut staged = vec![0u8; chunk_len];
            state
                .file
                .read_exact(&mut staged)
                .map_err(|_| ContainerError::CannotRead {
                    offset: state.cursor as usize,
                    requested: chunk_len,
                })?;
            scratch.append(&staged).ok();
            dest[filled..filled + chunk_len].copy_from_slice(&staged);
            state.cursor += chunk_len as u64;
            filled += chunk_len;
        }
        Ok(filled)
    }

    fn seek(&mut self, pos: SeekFrom) -> ContainerResult<u64> {
        let state = self.state_mut()?;
        let new_pos = match pos {
            SeekFrom::Start(n) => state.data_start as i64 + n as i64,
            SeekFrom::Current(delta) => state.cursor as i64 + delta,
            SeekFrom::End(delta) => state.file_len as i64 + delta,
        };
        if new_pos < 0 || new_pos as u64 > state.file_len {
            return Err(ContainerError::CannotRead {
                offset: new_pos.max(0) as usize,
                requested: 0,
            });
        }
        state
            .file
            .seek(StdSeekFrom::Start(new_pos as u64))
            .map_err(|_| ContainerError::CannotRead {
                offset: new_pos as usize,
                requested: 0,
            })?;
        state.cursor = new_pos as u64;
        Ok(state.cursor - state.data_start)
    }

    fn buffer_size(&self) -> u32 {
        self.state.as_ref().map(|s| s.header.buffer_size).unwrap_or(0)
    }

    fn stream_buffer_count(&self) -> u32 {
        self.state
            .as_ref()
            .map(|s| s.header.stream_buffer_count)
            .unwrap_or(0)
    }

    fn data_start(&self) -> u64 {
        self.state.as_ref().map(|s| s.data_start).unwrap_or(0)
    }
}

#[cfg(feature = "threaded")]
pub mod prefetch {
    //! Background-thread prefetcher, the `threaded`-feature escape hatch
    //! mirrored from `omni-scheduler`'s `spawn_threaded` tickle thread.

    use crossbeam_channel::{Receiver, Sender};
    use std::thread::JoinHandle;

    /// A block staged ahead of the cooperative consumer by the prefetch thread.
    pub struct StagedBlock {
        /// Offset within the stream this block starts at.
        pub offset: u64,
        /// The block's bytes.
        pub bytes: Vec<u8>,
    }

    /// Handle to a running prefetch thread; dropping it requests a stop and
    /// joins, matching the RAII teardown the scheduler uses for its own
    /// background thread.
    pub struct PrefetchHandle {
        stop: Sender<()>,
        join: Option<JoinHandle<()>>,
    }

    impl PrefetchHandle {
        /// Spawns a thread issuing `read_block(offset)` calls `ahead` blocks
        /// in front of `next_offset`, forwarding staged blocks on `tx`.
        pub fn spawn(
            mut next_offset: u64,
            block_size: u64,
            ahead: u32,
            read_block: impl Fn(u64, u64) -> Option<Vec<u8>> + Send + 'static,
            tx: Sender<StagedBlock>,
        ) -> PrefetchHandle {
            let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
            let join = std::thread::spawn(move || {
                let mut staged = 0u32;
                loop {
                    if stop_rx.try_recv().is_ok() {
                        break;
                    }
                    if staged >= ahead {
                        std::thread::yield_now();
                        continue;
                    }
                    match read_block(next_offset, block_size) {
                        Some(bytes) => {
                            if tx
                                .send(StagedBlock {
                                    offset: next_offset,
                                    bytes,
                                })
                                .is_err()
                            {
                                break;
                            }
                            next_offset += block_size;
                            staged += 1;
                        }
                        None => break,
                    }
                }
            });
            PrefetchHandle {
                stop: stop_tx,
                join: Some(join),
            }
        }
    }

    impl Drop for PrefetchHandle {
        fn drop(&mut self) {
            let _ = self.stop.send(());
            if let Some(join) = self.join.take() {
                let _ = join.join();
            }
        }
    }

    /// Channel pair a caller sets up before spawning a [`PrefetchHandle`].
    pub fn channel() -> (Sender<StagedBlock>, Receiver<StagedBlock>) {
        crossbeam_channel::unbounded()
    }
}
