//! Stream controller: owns a provider, arbitrates chunks among subscribers,
//! and tracks an action's progress through the container.
//!
//! `tickle(budget)` drains at most `budget` chunks per call and returns a
//! small report describing what it did.

use std::collections::HashMap;

use omni_action::Action;
use omni_buffer::{Buffer, Chunk, ChunkFlags};
use omni_container::{ContainerReader, SeekFrom};
use smallvec::SmallVec;

use crate::error::{StreamError, StreamResult};
use crate::subscriber::Subscriber;

/// An action currently streaming: its descriptor plus bookkeeping the
/// controller needs to drive and eventually retire it.
struct InProgress {
    action: Action,
    start_offset: u64,
    end_of_stream_seen: bool,
}

/// One pass's outcome, returned by [`StreamController::tickle`].
#[derive(Debug, Default, Clone)]
pub struct TickleReport {
    /// Chunks successfully routed to at least one subscriber.
    pub routed: u32,
    /// Chunks dropped because no subscriber matched.
    pub dropped: u32,
    /// Object ids whose final (`EndOfStream`) chunk was routed this pass.
    pub ended: SmallVec<[u32; 4]>,
}

/// Owns one provider and every subscriber/action bookkeeping list riding on
/// top of it.
pub struct StreamController<P: ContainerReader> {
    provider: P,
    source_name: String,
    subscribers: Vec<Subscriber>,
    in_progress: Vec<InProgress>,
    pending: Vec<Action>,
    next_action_starts: HashMap<u32, u64>,
    split_halves: HashMap<(u32, u16), Vec<u8>>,
}

impl<P: ContainerReader> StreamController<P> {
    /// Builds a controller around an already-constructed (unopened) provider.
    ///
    /// The controller does not send notifications itself: it has no way to
    /// know which listener cares about a given action's object id. Callers
    /// drive `EndAction` delivery from [`TickleReport::ended`] and
    /// [`StreamController::end_action`]'s return, using their own
    /// object-id-to-listener registry.
    pub fn new(provider: P) -> StreamController<P> {
        StreamController {
            provider,
            source_name: String::new(),
            subscribers: Vec::new(),
            in_progress: Vec::new(),
            pending: Vec::new(),
            next_action_starts: HashMap::new(),
            split_halves: HashMap::new(),
        }
    }

    /// Opens the provider against `source_name`.
    pub fn open(&mut self, source_name: &str) -> StreamResult<()> {
        self.provider
            .open(source_name)
            .map_err(|_| StreamError::CannotOpen {
                source_name: source_name.to_string(),
            })?;
        self.source_name = source_name.to_string();
        Ok(())
    }

    /// Name of the source this controller was opened against.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Registers `subscriber`, participating in chunk routing from the next tickle.
    pub fn add_subscriber(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    /// Removes and returns every subscriber matching `(object_id, sub_id)`.
    pub fn remove_subscriber(&mut self, object_id: u32, sub_id: u16) -> Vec<Subscriber> {
        let (matched, kept): (Vec<_>, Vec<_>) = self
            .subscribers
            .drain(..)
            .partition(|s| s.matches(object_id, sub_id));
        self.subscribers = kept;
        matched
    }

    /// Moves `action` into `in_progress`, recording the provider's current
    /// position as its rewind point and triggering the first read.
    pub fn start_action(&mut self, action: Action) -> StreamResult<()> {
        let object_id = action.object_id;
        if self.in_progress.iter().any(|p| p.action.object_id == object_id) {
            return Err(StreamError::AlreadyRegistered { object_id });
        }
        let start_offset = self.provider.seek(SeekFrom::Current(0)).unwrap_or(0);
        self.next_action_starts.insert(object_id, start_offset);
        self.in_progress.push(InProgress {
            action,
            start_offset,
            end_of_stream_seen: false,
        });
        self.pending.retain(|a| a.object_id != object_id);
        Ok(())
    }

    /// Removes `object_id` from `in_progress` and tears down its subscribers.
    /// Callers are responsible for emitting the `EndAction` notification.
    pub fn end_action(&mut self, object_id: u32) -> StreamResult<()> {
        let index = self
            .in_progress
            .iter()
            .position(|p| p.action.object_id == object_id)
            .ok_or(StreamError::NotRegistered { object_id })?;
        self.in_progress.remove(index);
        for subscriber in self.subscribers.iter_mut().filter(|s| s.object_id() == object_id) {
            subscriber.destroy_all();
        }
        Ok(())
    }

    /// Byte offset at which the next chunk of `object_id`'s stream begins,
    /// as recorded when its action started (used to rewind on loop).
    pub fn next_action_data_start(&self, object_id: u32) -> Option<u64> {
        self.next_action_starts.get(&object_id).copied()
    }

    /// Seeks the provider back to `object_id`'s recorded start offset.
    pub fn rewind(&mut self, object_id: u32) -> StreamResult<()> {
        let offset = self
            .next_action_starts
            .get(&object_id)
            .copied()
            .ok_or(StreamError::NotRegistered { object_id })?;
        self.provider
            .seek(SeekFrom::Start(offset))
            .map_err(|_| StreamError::CannotRead {
                offset,
                requested: 0,
            })?;
        Ok(())
    }

    /// Seeks the underlying provider to an absolute data offset (relative to
    /// the provider's own data start, per [`ContainerReader::data_start`]).
    /// Used by the coordinator to position a freshly opened controller at
    /// the first stream chunk before any action starts.
    pub fn seek_to(&mut self, offset: u64) -> StreamResult<()> {
        self.provider
            .seek(SeekFrom::Start(offset))
            .map_err(|_| StreamError::CannotRead {
                offset,
                requested: 0,
            })?;
        Ok(())
    }

    /// Offset the provider's own data region begins at, used to translate an
    /// absolute file offset (as found by indexing the raw container bytes)
    /// into the provider-relative offset `seek_to` expects.
    pub fn provider_data_start(&self) -> u64 {
        self.provider.data_start()
    }

    /// Pops the next pending chunk for `(object_id, sub_id)`, if any
    /// subscriber matching that pair has one queued. Does not itself pull
    /// from the provider; callers drive delivery via `tickle` first.
    pub fn pop_chunk(&mut self, object_id: u32, sub_id: u16) -> Option<Chunk> {
        self.subscribers
            .iter_mut()
            .find(|s| s.matches(object_id, sub_id))
            .and_then(|s| s.pop())
    }

    /// Actions currently streaming.
    pub fn in_progress_object_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.in_progress.iter().map(|p| p.action.object_id)
    }

    fn pull_next_chunk(&mut self) -> StreamResult<Option<Chunk>> {
        let mut header = [0u8; 8];
        let n = self.provider.read(&mut header)?;
        if n == 0 {
            return Ok(None);
        }
        if n < header.len() {
            return Err(StreamError::CannotRead {
                offset: 0,
                requested: header.len(),
            });
        }
        let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let pad = (length & 1) as usize;
        let mut rest = vec![0u8; length as usize + pad];
        let read = self.provider.read(&mut rest)?;
        if read != rest.len() {
            return Err(StreamError::CannotRead {
                offset: 8,
                requested: rest.len(),
            });
        }

        let buf = Buffer::from_owned(Vec::with_capacity(header.len() + rest.len()));
        buf.append(&header)?;
        buf.append(&rest)?;
        Ok(Some(Chunk::read(&buf, 0)?))
    }

    /// Pulls and routes chunks until either `budget` chunks have been
    /// processed or no chunk is due / the provider is exhausted.
    pub fn tickle(&mut self, budget: usize) -> StreamResult<TickleReport> {
        let mut report = TickleReport::default();

        for _ in 0..budget {
            let chunk = match self.pull_next_chunk()? {
                Some(c) => c,
                None => break,
            };

            let key = (chunk.object_id(), chunk.sub_id());
            let routed_chunk = if chunk.flags().contains(ChunkFlags::SPLIT) {
                if let Some(first_half) = self.split_halves.remove(&key) {
                    let mut merged = first_half;
                    chunk.with_media(|bytes| merged.extend_from_slice(bytes));
                    let buf = Buffer::from_owned(merged);
                    let flags = chunk.flags();
                    let len = buf.len();
                    let framed = Buffer::from_owned(Vec::with_capacity(20 + len));
                    omni_buffer::append_chunk(&framed, chunk.object_id(), chunk.time(), chunk.sub_id(), flags, &buf.with_slice(|b| b.to_vec()))?;
                    Some(Chunk::read(&framed, 0)?)
                } else {
                    self.split_halves.insert(key, chunk.media_to_vec());
                    None
                }
            } else {
                Some(chunk.clone())
            };

            let Some(routed_chunk) = routed_chunk else {
                continue;
            };

            let matched: Vec<usize> = self
                .subscribers
                .iter()
                .enumerate()
                .filter(|(_, s)| s.matches(routed_chunk.object_id(), routed_chunk.sub_id()))
                .map(|(i, _)| i)
                .collect();

            if matched.is_empty() {
                tracing::debug!(object_id = routed_chunk.object_id(), "dropping chunk with no matching subscriber");
                report.dropped += 1;
            } else {
                for index in matched {
                    self.subscribers[index].add(routed_chunk.clone(), true);
                }
                report.routed += 1;
            }

            if routed_chunk.flags().contains(ChunkFlags::END_OF_STREAM) {
                if let Some(p) = self
                    .in_progress
                    .iter_mut()
                    .find(|p| p.action.object_id == routed_chunk.object_id())
                {
                    p.end_of_stream_seen = true;
                }
                report.ended.push(routed_chunk.object_id());
            }
        }

        Ok(report)
    }
}
