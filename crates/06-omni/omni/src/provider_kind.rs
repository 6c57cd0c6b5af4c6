//! A provider chosen per-action between the two `omni-container` backends.
//!
//! Grounded on `omni-container`'s own `RamProvider`/`DiskProvider` pair: the
//! coordinator needs a single concrete type to hand `StreamController`, so
//! this enum dispatches to whichever backend an action's flags call for
//! rather than making every call site generic over `P: ContainerReader`.

use omni_action::ActionFlags;
use omni_container::{ContainerReader, ContainerResult, DiskProvider, RamProvider, SeekFrom};

/// Either of `omni-container`'s two [`ContainerReader`] implementations,
/// chosen per action by [`ProviderKind::for_action`].
pub enum ProviderKind {
    /// Backs actions that stream from memory.
    Ram(RamProvider),
    /// Backs actions that stream from disk.
    Disk(DiskProvider),
}

impl ProviderKind {
    /// Picks Disk for an action flagged [`ActionFlags::WORLD`], Ram otherwise.
    ///
    /// `WORLD` is the flag most plausibly tied to persistent world geometry
    /// worth streaming incrementally rather than loading whole, so it was
    /// chosen as the RAM-vs-Disk discriminator. Recorded in `DESIGN.md`.
    pub fn for_action(flags: ActionFlags) -> ProviderKind {
        if flags.contains(ActionFlags::WORLD) {
            ProviderKind::Disk(DiskProvider::new())
        } else {
            ProviderKind::Ram(RamProvider::new())
        }
    }
}

impl ContainerReader for ProviderKind {
    fn open(&mut self, source_name: &str) -> ContainerResult<()> {
        match self {
            ProviderKind::Ram(p) => p.open(source_name),
            ProviderKind::Disk(p) => p.open(source_name),
        }
    }

    fn close(&mut self) {
        match self {
            ProviderKind::Ram(p) => p.close(),
            ProviderKind::Disk(p) => p.close(),
        }
    }

    fn read(&mut self, dest: &mut [u8]) -> ContainerResult<usize> {
        match self {
            ProviderKind::Ram(p) => p.read(dest),
            ProviderKind::Disk(p) => p.read(dest),
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> ContainerResult<u64> {
        match self {
            ProviderKind::Ram(p) => p.seek(pos),
            ProviderKind::Disk(p) => p.seek(pos),
        }
    }

    fn buffer_size(&self) -> u32 {
        match self {
            ProviderKind::Ram(p) => p.buffer_size(),
            ProviderKind::Disk(p) => p.buffer_size(),
        }
    }

    fn stream_buffer_count(&self) -> u32 {
        match self {
            ProviderKind::Ram(p) => p.stream_buffer_count(),
            ProviderKind::Disk(p) => p.stream_buffer_count(),
        }
    }

    fn data_start(&self) -> u64 {
        match self {
            ProviderKind::Ram(p) => p.data_start(),
            ProviderKind::Disk(p) => p.data_start(),
        }
    }
}
