//! Subscriber: a per-`(object_id, sub_id)` pair of chunk queues feeding one
//! presenter, with separate pending and consumed lists so a chunk's refcount
//! lifecycle stays visible at every stage.

use std::collections::VecDeque;

use omni_buffer::{Buffer, Chunk};

/// A consumer of chunks for one `(object_id, sub_id)` channel.
///
/// Never keeps a chunk referenced beyond its own two lists: `add` bumps the
/// backing buffer's diagnostic refcount, and `free`/`destroy_all` release it
/// back. `pop` moving a chunk from `pending` to `consumed` does not change
/// the count.
/// A chunk together with the extra buffer handle taken out on its behalf
/// when it entered `pending`, released again when it is freed.
struct Held {
    chunk: Chunk,
    held_ref: Buffer,
}

pub struct Subscriber {
    object_id: u32,
    sub_id: u16,
    pending: VecDeque<Held>,
    consumed: VecDeque<Held>,
}

impl Subscriber {
    /// Creates an empty subscriber for `(object_id, sub_id)`.
    pub fn new(object_id: u32, sub_id: u16) -> Subscriber {
        Subscriber {
            object_id,
            sub_id,
            pending: VecDeque::new(),
            consumed: VecDeque::new(),
        }
    }

    /// Object id this subscriber matches chunks against.
    pub fn object_id(&self) -> u32 {
        self.object_id
    }

    /// Sub-channel id this subscriber matches chunks against.
    pub fn sub_id(&self) -> u16 {
        self.sub_id
    }

    /// Enqueues `chunk` on `pending`, at the back if `append` else the front,
    /// taking out an extra reference on the backing buffer on its behalf.
    /// Always succeeds; the chunk's view itself is allocated elsewhere.
    pub fn add(&mut self, chunk: Chunk, append: bool) {
        let held_ref = chunk.buffer().add_ref();
        let held = Held { chunk, held_ref };
        if append {
            self.pending.push_back(held);
        } else {
            self.pending.push_front(held);
        }
    }

    /// Moves `pending`'s head to `consumed`'s tail and returns it. The held
    /// reference travels with it; this does not change the refcount.
    pub fn pop(&mut self) -> Option<Chunk> {
        let held = self.pending.pop_front()?;
        let chunk = held.chunk.clone();
        self.consumed.push_back(held);
        Some(chunk)
    }

    /// Returns `pending`'s head without moving it.
    pub fn peek(&self) -> Option<&Chunk> {
        self.pending.front().map(|h| &h.chunk)
    }

    /// If `chunk` is present in `consumed`, detaches it and releases the
    /// backing buffer's refcount. Returns whether a matching chunk was found.
    pub fn free(&mut self, chunk: &Chunk) -> bool {
        if let Some(index) = self.consumed.iter().position(|h| {
            Buffer::ptr_eq(h.chunk.buffer(), chunk.buffer()) && h.chunk.header_offset() == chunk.header_offset()
        }) {
            let held = self.consumed.remove(index).expect("index just located");
            held.held_ref.release_ref();
            true
        } else {
            false
        }
    }

    /// Drops every pending and consumed chunk, releasing their refcounts.
    pub fn destroy_all(&mut self) {
        for held in self.pending.drain(..).chain(self.consumed.drain(..)) {
            held.held_ref.release_ref();
        }
    }

    /// Number of chunks awaiting delivery.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of chunks delivered but not yet freed.
    pub fn consumed_len(&self) -> usize {
        self.consumed.len()
    }

    /// Whether this subscriber matches a chunk carrying `object_id`/`sub_id`.
    pub fn matches(&self, object_id: u32, sub_id: u16) -> bool {
        self.object_id == object_id && self.sub_id == sub_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omni_buffer::{append_chunk, ChunkFlags};

    fn sample_chunk(buf: &Buffer, object_id: u32, time: i64, payload: &[u8]) -> Chunk {
        let offset = append_chunk(buf, object_id, time, 0, ChunkFlags::default(), payload).unwrap();
        Chunk::read(buf, offset).unwrap()
    }

    #[test]
    fn fifo_dequeues_in_enqueue_order() {
        let buf = Buffer::from_owned(Vec::new());
        let mut sub = Subscriber::new(1, 0);
        sub.add(sample_chunk(&buf, 1, 0, b"a"), true);
        sub.add(sample_chunk(&buf, 1, 1, b"b"), true);
        sub.add(sample_chunk(&buf, 1, 2, b"c"), true);

        assert_eq!(sub.pop().unwrap().media_to_vec(), b"a");
        assert_eq!(sub.pop().unwrap().media_to_vec(), b"b");
        assert_eq!(sub.pop().unwrap().media_to_vec(), b"c");
        assert!(sub.pop().is_none());
    }

    #[test]
    fn prepend_pushes_to_the_front() {
        let buf = Buffer::from_owned(Vec::new());
        let mut sub = Subscriber::new(1, 0);
        sub.add(sample_chunk(&buf, 1, 0, b"a"), true);
        sub.add(sample_chunk(&buf, 1, 1, b"b"), false);

        assert_eq!(sub.pop().unwrap().media_to_vec(), b"b");
        assert_eq!(sub.pop().unwrap().media_to_vec(), b"a");
    }

    #[test]
    fn pop_moves_chunk_to_consumed_without_changing_refcount() {
        let buf = Buffer::from_owned(Vec::new());
        let mut sub = Subscriber::new(1, 0);
        sub.add(sample_chunk(&buf, 1, 0, b"a"), true);
        let before = buf.ref_count();
        let popped = sub.pop().unwrap();
        assert_eq!(buf.ref_count(), before);
        assert_eq!(sub.consumed_len(), 1);
        assert!(sub.free(&popped));
        assert_eq!(sub.consumed_len(), 0);
    }

    #[test]
    fn destroy_all_clears_both_lists() {
        let buf = Buffer::from_owned(Vec::new());
        let mut sub = Subscriber::new(1, 0);
        sub.add(sample_chunk(&buf, 1, 0, b"a"), true);
        sub.add(sample_chunk(&buf, 1, 1, b"b"), true);
        sub.pop();
        sub.destroy_all();
        assert_eq!(sub.pending_len(), 0);
        assert_eq!(sub.consumed_len(), 0);
    }
}
