//! Fixed-size block pools backing `BufferMode::Pooled` allocations.
//!
//! A pool hands out owned, fixed-size slots and takes them back on release.
//! A container block pool has a single owner per slot at a time and no
//! producer/consumer split, so one free-list guarded by a mutex is enough.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::{BufferError, BufferResult};

/// Shape of a block pool: every slot is `block_size` bytes, and `slot_count`
/// slots exist in total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockPoolConfig {
    /// Size in bytes of every slot in the pool.
    pub block_size: usize,
    /// Number of slots the pool manages.
    pub slot_count: u32,
}

impl BlockPoolConfig {
    /// The container format's small pool: 64-byte blocks, 22 slots.
    pub const fn small() -> Self {
        Self {
            block_size: 64,
            slot_count: 22,
        }
    }

    /// The container format's large pool: 128-byte blocks, 2 slots.
    pub const fn large() -> Self {
        Self {
            block_size: 128,
            slot_count: 2,
        }
    }
}

struct Inner {
    config: BlockPoolConfig,
    slots: Vec<Box<[u8]>>,
    free: Vec<u32>,
}

/// A fixed-size block pool shared by any number of providers.
///
/// Cloning a [`BlockPool`] shares the underlying slots (it is a thin handle
/// around an `Arc<Mutex<_>>`), not a copy of the guarded state.
#[derive(Clone)]
pub struct BlockPool {
    inner: Arc<Mutex<Inner>>,
}

/// A slot checked out of a [`BlockPool`]; returns itself to the pool on drop.
pub struct PooledBlock {
    pool: BlockPool,
    index: u32,
    data: Box<[u8]>,
}

impl PooledBlock {
    /// Index of this slot within its owning pool, useful for diagnostics.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Borrows the block's bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Borrows the block's bytes mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PooledBlock {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        self.pool.release(self.index, data);
    }
}

impl BlockPool {
    /// Creates a pool with `config.slot_count` slots of `config.block_size` bytes each.
    pub fn new(config: BlockPoolConfig) -> Self {
        let slots = (0..config.slot_count)
            .map(|_| vec![0u8; config.block_size].into_boxed_slice())
            .collect();
        let free = (0..config.slot_count).collect();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                config,
                slots,
                free,
            })),
        }
    }

    /// Configuration this pool was created with.
    pub fn config(&self) -> BlockPoolConfig {
        self.inner.lock().config
    }

    /// Attempts to check out a free slot. Returns `PoolExhausted` when none
    /// remain; the caller retries on the next tick.
    pub fn acquire(&self) -> BufferResult<PooledBlock> {
        let mut inner = self.inner.lock();
        let index = inner.free.pop().ok_or(BufferError::PoolExhausted {
            block_size: inner.config.block_size,
            slot_count: inner.config.slot_count,
        })?;
        // Slots are reused across acquisitions; swap out a zeroed placeholder so the
        // pool's Vec stays densely indexable while the checked-out slot travels with
        // its PooledBlock handle.
        let data = std::mem::replace(
            &mut inner.slots[index as usize],
            Vec::new().into_boxed_slice(),
        );
        drop(inner);
        Ok(PooledBlock {
            pool: self.clone(),
            index,
            data,
        })
    }

    /// Number of slots currently available.
    pub fn free_count(&self) -> usize {
        self.inner.lock().free.len()
    }

    fn release(&self, index: u32, mut data: Box<[u8]>) {
        let mut inner = self.inner.lock();
        if data.len() != inner.config.block_size {
            data = vec![0u8; inner.config.block_size].into_boxed_slice();
        }
        inner.slots[index as usize] = data;
        inner.free.push(index);
    }
}

/// The two fixed pools the container format calls for: a 64-byte pool and a
/// 128-byte pool, shared by every disk provider reading from it.
#[derive(Clone)]
pub struct BlockPools {
    /// Pool serving 64-byte allocations.
    pub small: BlockPool,
    /// Pool serving 128-byte allocations.
    pub large: BlockPool,
}

impl BlockPools {
    /// Builds the standard small/large pool pair using the default shapes.
    pub fn standard() -> Self {
        Self {
            small: BlockPool::new(BlockPoolConfig::small()),
            large: BlockPool::new(BlockPoolConfig::large()),
        }
    }

    /// Picks the smallest pool able to satisfy `size`, if any.
    pub fn pool_for(&self, size: usize) -> Option<&BlockPool> {
        if size <= self.small.config().block_size {
            Some(&self.small)
        } else if size <= self.large.config().block_size {
            Some(&self.large)
        } else {
            None
        }
    }

    /// The largest single pull either pool can service in one slot.
    pub fn max_block_size(&self) -> usize {
        self.small.config().block_size.max(self.large.config().block_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release_roundtrip() {
        let pool = BlockPool::new(BlockPoolConfig {
            block_size: 64,
            slot_count: 2,
        });
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(pool.acquire().is_err(), "pool should report exhaustion");
        drop(a);
        assert_eq!(pool.free_count(), 1);
        let c = pool.acquire().unwrap();
        drop(b);
        drop(c);
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn slots_are_right_sized() {
        let pool = BlockPool::new(BlockPoolConfig::small());
        let block = pool.acquire().unwrap();
        assert_eq!(block.as_slice().len(), 64);
    }
}
