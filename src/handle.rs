//! Per-open file state (§4.E): a buffer plus the `here`/`end` cursors,
//! live between `open` and `release`.

use crate::buffer::Buffer;
use crate::table::{EntryId, Mode};

/// Handle identifiers are surfaced to the dispatcher as opaque `u64`
/// file handles.
pub type HandleId = u64;

pub struct OpenHandle {
    pub entry_id: EntryId,
    /// Subset of `{READ, WRITE, USER}` reflecting this particular open,
    /// not the entry's full mode.
    pub mode: Mode,
    pub buffer: Buffer,
    /// Read cursor.
    pub here: usize,
    /// Write frontier: the highest offset written, establishing the
    /// buffer's logical length independent of its allocated capacity.
    pub end: usize,
}

impl OpenHandle {
    pub fn new(entry_id: EntryId, mode: Mode, buffer: Buffer) -> Self {
        let end = buffer.len();
        OpenHandle { entry_id, mode, buffer, here: 0, end }
    }

    pub fn empty(entry_id: EntryId, mode: Mode) -> Self {
        OpenHandle { entry_id, mode, buffer: Buffer::new(), here: 0, end: 0 }
    }

    /// Copies `data` into the buffer at `offset`, growing as needed, and
    /// advances `end` to `max(end, offset + data.len())`. Any gap between
    /// the previous `end` and `offset` reads back as zero bytes (§9 open
    /// question, decided: zero-fill), per `Buffer::write_at`.
    pub fn write(&mut self, offset: usize, data: &[u8]) {
        self.buffer.write_at(offset, data);
        self.end = self.end.max(offset + data.len());
    }

    /// Returns up to `size` bytes starting at `offset`, bounded by `end`,
    /// or nothing if `offset` is at or past `end`.
    pub fn read(&self, offset: usize, size: usize) -> &[u8] {
        if offset >= self.end {
            return &[];
        }
        let capped = size.min(self.end - offset);
        self.buffer.read_at(offset, capped)
    }

    pub fn buffer_bytes(&self) -> &[u8] {
        &self.buffer.as_slice()[..self.end.min(self.buffer.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_advances_end_frontier() {
        let mut h = OpenHandle::empty(0, Mode::WRITE);
        h.write(0, b"hello");
        assert_eq!(h.end, 5);
        h.write(10, b"x");
        assert_eq!(h.end, 11);
    }

    #[test]
    fn read_is_bounded_by_end_not_capacity() {
        let mut h = OpenHandle::empty(0, Mode::READ | Mode::WRITE);
        h.write(0, b"abcdef");
        assert_eq!(h.read(0, 100), b"abcdef");
        assert_eq!(h.read(3, 2), b"de");
        assert_eq!(h.read(10, 5), &[] as &[u8]);
    }
}
