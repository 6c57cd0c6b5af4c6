//! RAM-resident stream provider: reads the whole source once at `open` and
//! serves subsequent reads/seeks as plain memory moves.

use std::fs;

use omni_buffer::Buffer;

use crate::error::{ContainerError, ContainerResult};
use crate::provider::{ContainerReader, SeekFrom};
use crate::riff::{parse_container, MxHd};

/// Reads an entire container into memory at `open`. Deterministic and
/// synchronous: every read/seek is a move over bytes already resident.
pub struct RamProvider {
    state: Option<State>,
}

struct State {
    buffer: Buffer,
    header: MxHd,
    cursor: usize,
}

impl RamProvider {
    /// Builds a provider with nothing open yet.
    pub fn new() -> RamProvider {
        RamProvider { state: None }
    }

    fn state(&self) -> ContainerResult<&State> {
        self.state.as_ref().ok_or(ContainerError::CannotRead {
            offset: 0,
            requested: 0,
        })
    }
}

impl Default for RamProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerReader for RamProvider {
    fn open(&mut self, source_name: &str) -> ContainerResult<()> {
        let bytes = fs::read(source_name).map_err(|_| ContainerError::CannotOpen {
            source_name: source_name.to_string(),
        })?;
        let index = parse_container(&bytes)?;
        self.state = Some(State {
            buffer: Buffer::from_owned(bytes),
            header: index.header,
            cursor: 0,
        });
        Ok(())
    }

    fn close(&mut self) {
        self.state = None;
    }

    fn read(&mut self, dest: &mut [u8]) -> ContainerResult<usize> {
        let state = self
            .state
            .as_mut()
            .ok_or(ContainerError::CannotRead {
                offset: 0,
                requested: dest.len(),
            })?;
        let available = state.buffer.len().saturating_sub(state.cursor);
        let to_copy = dest.len().min(available);
        if to_copy == 0 {
            return Ok(0);
        }
        let cursor = state.cursor;
        state
            .buffer
            .with_slice(|bytes| dest[..to_copy].copy_from_slice(&bytes[cursor..cursor + to_copy]));
        state.cursor += to_copy;
        Ok(to_copy)
    }

    fn seek(&mut self, pos: SeekFrom) -> ContainerResult<u64> {
        let state = self.state.as_mut().ok_or(ContainerError::CannotRead {
            offset: 0,
            requested: 0,
        })?;
        let len = state.buffer.len() as i64;
        let new_pos = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::Current(delta) => state.cursor as i64 + delta,
            SeekFrom::End(delta) => len + delta,
        };
        if new_pos < 0 || new_pos as usize > state.buffer.len() {
            return Err(ContainerError::CannotRead {
                offset: new_pos.max(0) as usize,
                requested: 0,
            });
        }
        state.cursor = new_pos as usize;
        Ok(state.cursor as u64)
    }

    fn buffer_size(&self) -> u32 {
        self.state().map(|s| s.header.buffer_size).unwrap_or(0)
    }

    fn stream_buffer_count(&self) -> u32 {
        self.state()
            .map(|s| s.header.stream_buffer_count)
            .unwrap_or(0)
    }

    fn data_start(&self) -> u64 {
        // The RAM provider's backing buffer holds the whole file verbatim,
        // so provider-relative offsets are already absolute file offsets.
        0
    }
}
