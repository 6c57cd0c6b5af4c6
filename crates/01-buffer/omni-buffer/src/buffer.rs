//! Reference-counted byte buffers backing streamed chunks.
//!
//! The original stream format manually incremented and decremented a
//! reference count on raw buffers; here ownership is modeled the idiomatic
//! way instead, with `Arc` doing the counting and `Buffer::add_ref` /
//! `Buffer::release_ref` surviving only as thin, Clone/Drop-equivalent
//! wrappers for call sites ported from that accounting style.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::{BufferError, BufferResult};
use crate::pool::PooledBlock;

/// Where a buffer's bytes physically live.
pub enum BufferMode {
    /// Backed by a slot checked out of a [`crate::pool::BlockPool`].
    Pooled(PooledBlock),
    /// A plain heap allocation, grown as needed.
    Allocated(Vec<u8>),
    /// A fixed-capacity allocation that never resizes; append fails past capacity.
    Preallocated(Vec<u8>),
}

impl BufferMode {
    fn as_slice(&self) -> &[u8] {
        match self {
            BufferMode::Pooled(block) => block.as_slice(),
            BufferMode::Allocated(v) | BufferMode::Preallocated(v) => v.as_slice(),
        }
    }
}

/// Opaque per-buffer carry-over state, left for vendor/codec hooks.
/// Never interpreted by this crate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VendorState(pub [u8; 12]);

struct BufferData {
    mode: BufferMode,
    len: usize,
    vendor: VendorState,
}

/// Diagnostic counters tracking ref-count churn, used by property tests to
/// confirm every `add_ref` is eventually matched by a `release_ref`.
#[derive(Default)]
struct RefDiagnostics {
    added: AtomicU32,
    released: AtomicU32,
}

pub(crate) struct Shared {
    data: Mutex<BufferData>,
    diagnostics: RefDiagnostics,
}

/// A reference-counted, growable byte buffer.
///
/// Cloning a `Buffer` is cheap (an `Arc` bump) and shares the same backing
/// storage; `Buffer::ref_count` exposes the live `Arc` strong count so call
/// sites that used to track this by hand can assert on it directly.
#[derive(Clone)]
pub struct Buffer {
    shared: Arc<Shared>,
}

impl Buffer {
    fn from_mode(mode: BufferMode, len: usize) -> Buffer {
        let shared = Arc::new(Shared {
            data: Mutex::new(BufferData {
                mode,
                len,
                vendor: VendorState::default(),
            }),
            diagnostics: RefDiagnostics::default(),
        });
        Buffer { shared }
    }

    /// Wraps an owned, growable `Vec<u8>`.
    pub fn from_owned(bytes: Vec<u8>) -> Buffer {
        let len = bytes.len();
        Self::from_mode(BufferMode::Allocated(bytes), len)
    }

    /// Wraps a fixed-capacity `Vec<u8>` that will never be resized past `capacity`.
    pub fn preallocated(capacity: usize) -> Buffer {
        Self::from_mode(BufferMode::Preallocated(Vec::with_capacity(capacity)), 0)
    }

    /// Wraps a slot checked out of a [`crate::pool::BlockPool`].
    pub fn from_pooled(block: PooledBlock) -> Buffer {
        let len = block.as_slice().len();
        Self::from_mode(BufferMode::Pooled(block), len)
    }

    /// Current length in bytes of the buffer's contents.
    pub fn len(&self) -> usize {
        self.shared.data.lock().len
    }

    /// Whether the buffer currently holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes `f` with the buffer's current contents.
    pub fn with_slice<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.shared.data.lock();
        f(&guard.mode.as_slice()[..guard.len])
    }

    /// Appends `bytes` to the end of the buffer, returning the offset the
    /// write started at. Fails with `CapacityExceeded` for preallocated or
    /// pooled buffers with no room left.
    pub fn append(&self, bytes: &[u8]) -> BufferResult<usize> {
        let mut guard = self.shared.data.lock();
        let offset = guard.len;
        match &mut guard.mode {
            BufferMode::Allocated(v) => {
                v.truncate(offset);
                v.extend_from_slice(bytes);
            }
            BufferMode::Preallocated(v) => {
                if offset + bytes.len() > v.capacity() {
                    return Err(BufferError::CapacityExceeded {
                        additional: bytes.len(),
                        capacity: v.capacity(),
                    });
                }
                v.truncate(offset);
                v.extend_from_slice(bytes);
            }
            BufferMode::Pooled(block) => {
                let slice = block.as_mut_slice();
                if offset + bytes.len() > slice.len() {
                    return Err(BufferError::CapacityExceeded {
                        additional: bytes.len(),
                        capacity: slice.len(),
                    });
                }
                slice[offset..offset + bytes.len()].copy_from_slice(bytes);
            }
        }
        guard.len = offset + bytes.len();
        Ok(offset)
    }

    /// Opaque vendor carry-over state attached to this buffer.
    pub fn vendor_state(&self) -> VendorState {
        self.shared.data.lock().vendor
    }

    /// Replaces the buffer's vendor carry-over state.
    pub fn set_vendor_state(&self, state: VendorState) {
        self.shared.data.lock().vendor = state;
    }

    /// Number of live handles sharing this buffer's storage.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    /// Clones the handle and records the increment in the diagnostic counters.
    /// Semantically identical to `Clone::clone`; kept for call sites ported
    /// from explicit add-ref/release-ref accounting.
    pub fn add_ref(&self) -> Buffer {
        self.shared.diagnostics.added.fetch_add(1, Ordering::Relaxed);
        self.clone()
    }

    /// Drops a handle obtained from [`Buffer::add_ref`], recording the
    /// decrement in the diagnostic counters.
    pub fn release_ref(self) {
        self.shared
            .diagnostics
            .released
            .fetch_add(1, Ordering::Relaxed);
        drop(self);
    }

    /// Snapshot of (adds, releases) recorded via [`Buffer::add_ref`] /
    /// [`Buffer::release_ref`], used by refcount-conservation tests.
    pub fn ref_diagnostics(&self) -> (u32, u32) {
        (
            self.shared.diagnostics.added.load(Ordering::Relaxed),
            self.shared.diagnostics.released.load(Ordering::Relaxed),
        )
    }

    /// Identity pointer for the shared storage, used by tests to assert two
    /// buffers do or do not alias the same backing allocation.
    pub(crate) fn storage_ptr(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    /// Whether `a` and `b` share the same backing storage.
    pub fn ptr_eq(a: &Buffer, b: &Buffer) -> bool {
        Arc::ptr_eq(&a.shared, &b.shared)
    }
}
