use std::ptr::{addr_of_mut, copy_nonoverlapping};
use std::sync::atomic::{AtomicU64, Ordering as MemOrd};

use super::arena::Arena;
use super::record::RecordHeader;
use crate::error::ProtocolError;
use crate::ffi::{Cursor, Metadata, PAGE_SIZE};

/// A record copied out of the ring-buffer.
pub(crate) struct RawRecord {
    pub header: RecordHeader,
    /// Everything after the header.
    pub body: Vec<u8>,
}

impl RawRecord {
    /// Bytes the record occupies in the ring-buffer.
    pub fn len(&self) -> u64 {
        self.header.size as _
    }
}

/// Consumer side of the data pages of an [`Arena`].
///
/// `pos` is the local copy of `data_tail`. Positions only grow, they are
/// masked into offsets when touching memory.
pub(crate) struct Rb<'a> {
    data: *const u8,
    size: u64,
    pos: u64,
    tail: &'a AtomicU64,
    head: &'a AtomicU64,
}

impl<'a> Rb<'a> {
    /// The arena must hold the metadata page plus a power of two data pages.
    pub fn new(arena: &'a Arena) -> Self {
        let metadata = arena.as_ptr() as *mut Metadata;
        let tail = unsafe { AtomicU64::from_ptr(addr_of_mut!((*metadata).data_tail)) };
        let head = unsafe { AtomicU64::from_ptr(addr_of_mut!((*metadata).data_head)) };

        // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L6212
        let data = unsafe { arena.as_ptr().add(*PAGE_SIZE) };
        let size = (arena.len() - *PAGE_SIZE) as u64;
        debug_assert!(size.is_power_of_two());

        // We are the only writer of the tail.
        let pos = tail.load(MemOrd::Relaxed);

        Self {
            data,
            size,
            pos,
            tail,
            head,
        }
    }

    pub fn has_pending(&self) -> bool {
        // About acquire:
        // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L720
        // https://github.com/torvalds/linux/blob/v6.13/kernel/events/ring_buffer.c#L99
        self.head.load(MemOrd::Acquire) != self.pos
    }

    /// Copies the record at the current position out of the ring-buffer.
    ///
    /// The position is not advanced, call [`commit`][Self::commit] for that.
    pub fn next_raw_record(&self) -> Result<Option<RawRecord>, ProtocolError> {
        let head = self.head.load(MemOrd::Acquire);
        let available = head.wrapping_sub(self.pos);
        if available == 0 {
            return Ok(None);
        }
        if available < RecordHeader::SIZE as u64 {
            return Err(ProtocolError::Truncated { available });
        }

        let header = self.copy_out(self.pos, RecordHeader::SIZE);
        let header = RecordHeader::from_cursor(&mut Cursor::new(&header))?;

        let size = header.size as u64;
        if size < RecordHeader::SIZE as u64 || size > available || size > self.size {
            return Err(ProtocolError::BadSize {
                size: header.size,
                available,
                capacity: self.size,
            });
        }

        let body_len = header.size as usize - RecordHeader::SIZE;
        let body = self.copy_out(self.pos + RecordHeader::SIZE as u64, body_len);

        Ok(Some(RawRecord { header, body }))
    }

    /// Hands `len` bytes back to the producer.
    pub fn commit(&mut self, len: u64) {
        self.pos += len;
        // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L723
        self.tail.store(self.pos, MemOrd::Release);
    }

    // `len` must not exceed `self.size`.
    fn copy_out(&self, pos: u64, len: usize) -> Vec<u8> {
        let offset = (pos & (self.size - 1)) as usize;
        let hi_len = len.min(self.size as usize - offset);
        let lo_len = len - hi_len;

        let mut buf = Vec::with_capacity(len);
        let buf_ptr = buf.as_mut_ptr();
        unsafe {
            let hi_part_ptr = self.data.add(offset);
            copy_nonoverlapping(hi_part_ptr, buf_ptr, hi_len);

            // Straddles the end, the rest starts over at the beginning.
            let lo_part_ptr = self.data;
            copy_nonoverlapping(lo_part_ptr, buf_ptr.add(hi_len), lo_len);
            buf.set_len(len);
        }
        buf
    }
}
