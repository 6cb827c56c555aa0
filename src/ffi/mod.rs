use std::sync::LazyLock;

use crate::error::ProtocolError;

pub mod bindings;
pub mod syscall;

/// Bounded reader over bytes already copied out of the ring-buffer.
///
/// Each read consumes the size of the value read, in native byte order,
/// the same way the kernel lays out records for the running host.
pub struct Cursor<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if len > self.remaining() {
            return Err(ProtocolError::ShortRecord {
                offset: self.offset,
                want: len,
                len: self.buf.len(),
            });
        }
        let bytes = &self.buf[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        self.bytes(len).map(|_| ())
    }

    pub fn u16(&mut self) -> Result<u16, ProtocolError> {
        let bytes = self.bytes(size_of::<u16>())?;
        Ok(u16::from_ne_bytes([bytes[0], bytes[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, ProtocolError> {
        let bytes = self.bytes(size_of::<u32>())?;
        let mut buf = [0; size_of::<u32>()];
        buf.copy_from_slice(bytes);
        Ok(u32::from_ne_bytes(buf))
    }

    pub fn u64(&mut self) -> Result<u64, ProtocolError> {
        let bytes = self.bytes(size_of::<u64>())?;
        let mut buf = [0; size_of::<u64>()];
        buf.copy_from_slice(bytes);
        Ok(u64::from_ne_bytes(buf))
    }

    /// Reads `len` consecutive `u64`s, checking the length before allocating
    /// so a corrupted count cannot trigger a huge allocation.
    pub fn u64s(&mut self, len: usize) -> Result<Vec<u64>, ProtocolError> {
        let want = len.checked_mul(size_of::<u64>()).unwrap_or(usize::MAX);
        let bytes = self.bytes(want)?;
        Ok(bytes
            .chunks_exact(size_of::<u64>())
            .map(|it| {
                let mut buf = [0; size_of::<u64>()];
                buf.copy_from_slice(it);
                u64::from_ne_bytes(buf)
            })
            .collect())
    }
}

pub static PAGE_SIZE: LazyLock<usize> = LazyLock::new(|| {
    let name = libc::_SC_PAGE_SIZE;
    let size = unsafe { libc::sysconf(name) };
    size as _
});

pub type Attr = bindings::perf_event_attr;
pub type Metadata = bindings::perf_event_mmap_page;
