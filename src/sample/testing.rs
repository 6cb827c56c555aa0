//! Test doubles for the kernel side of a sampler.

use std::ptr::{addr_of_mut, copy_nonoverlapping};
use std::sync::atomic::{AtomicU64, Ordering as MemOrd};

use super::arena::Arena;
use super::record::{Parser, RecordHeader};
use crate::config::{attr, Opts, Type};
use crate::event::raw::Raw;
use crate::event::Event;
use crate::ffi::{bindings as b, Metadata, PAGE_SIZE};

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Metadata page plus `2^exp` data pages.
pub fn arena(exp: u32) -> Arena {
    Arena::anonymous((1 + 2_usize.pow(exp)) * *PAGE_SIZE).unwrap()
}

pub fn parser(ty: Type, opts: &Opts) -> Parser {
    let event = Event::from(Raw::default());
    let attr = attr::from(&event.0, ty, opts).unwrap();
    Parser::from_attr(&attr)
}

/// Record body builder, native byte order.
#[derive(Clone, Default)]
pub struct Body(pub Vec<u8>);

impl Body {
    pub fn u64(mut self, val: u64) -> Self {
        self.0.extend_from_slice(&val.to_ne_bytes());
        self
    }

    pub fn u32(mut self, val: u32) -> Self {
        self.0.extend_from_slice(&val.to_ne_bytes());
        self
    }

    pub fn u16(mut self, val: u16) -> Self {
        self.0.extend_from_slice(&val.to_ne_bytes());
        self
    }
}

/// Writes records into an arena the way the kernel does.
///
/// Holds raw pointers so the arena can be moved into a sampler
/// while the producer keeps writing; it must not outlive the arena.
pub struct Producer {
    data: *mut u8,
    size: u64,
    head: *mut u64,
    tail: *mut u64,
    pos: u64,
    lost: u64,
}

impl Producer {
    pub fn new(arena: &Arena) -> Self {
        Self::at(arena, 0)
    }

    /// Starts both cursors at `pos`, as if `pos` bytes were already consumed.
    pub fn at(arena: &Arena, pos: u64) -> Self {
        let metadata = arena.as_ptr() as *mut Metadata;
        let head = unsafe { addr_of_mut!((*metadata).data_head) };
        let tail = unsafe { addr_of_mut!((*metadata).data_tail) };
        let this = Self {
            data: unsafe { arena.as_ptr().add(*PAGE_SIZE) },
            size: (arena.len() - *PAGE_SIZE) as u64,
            head,
            tail,
            pos,
            lost: 0,
        };
        this.head().store(pos, MemOrd::Release);
        this.tail().store(pos, MemOrd::Release);
        this
    }

    fn head(&self) -> &AtomicU64 {
        unsafe { AtomicU64::from_ptr(self.head) }
    }

    fn tail(&self) -> &AtomicU64 {
        unsafe { AtomicU64::from_ptr(self.tail) }
    }

    pub fn capacity(&self) -> u64 {
        self.size
    }

    /// Consumer position as last committed.
    pub fn consumed(&self) -> u64 {
        self.tail().load(MemOrd::Acquire)
    }

    fn fits(&self, len: usize) -> bool {
        let used = self.pos - self.consumed();
        self.size - used >= len as u64
    }

    /// Appends a record, or counts it as lost if there is no room.
    ///
    /// Pending losses are reported through a `PERF_RECORD_LOST` in front
    /// of the next record that fits.
    pub fn push(&mut self, ty: u32, misc: u16, body: &[u8]) -> bool {
        let len = RecordHeader::SIZE + body.len();

        if self.lost > 0 {
            let lost = Body::default().u64(0).u64(self.lost).0;
            if !self.fits(RecordHeader::SIZE + lost.len() + len) {
                self.lost += 1;
                return false;
            }
            self.write_record(b::PERF_RECORD_LOST, 0, &lost);
            self.lost = 0;
        } else if !self.fits(len) {
            self.lost += 1;
            return false;
        }

        self.write_record(ty, misc, body);
        self.publish();
        true
    }

    pub fn sample(&mut self, misc: u16, body: &Body) -> bool {
        self.push(b::PERF_RECORD_SAMPLE, misc, &body.0)
    }

    /// Writes bytes as they are and publishes them, no checks.
    pub fn push_raw(&mut self, bytes: &[u8]) {
        self.write(bytes);
        self.publish();
    }

    fn write_record(&mut self, ty: u32, misc: u16, body: &[u8]) {
        let size = (RecordHeader::SIZE + body.len()) as u16;
        let header = Body::default().u32(ty).u16(misc).u16(size).0;
        self.write(&header);
        self.write(body);
    }

    fn write(&mut self, bytes: &[u8]) {
        let offset = (self.pos & (self.size - 1)) as usize;
        let hi_len = bytes.len().min(self.size as usize - offset);
        unsafe {
            copy_nonoverlapping(bytes.as_ptr(), self.data.add(offset), hi_len);
            copy_nonoverlapping(bytes.as_ptr().add(hi_len), self.data, bytes.len() - hi_len);
        }
        self.pos += bytes.len() as u64;
    }

    fn publish(&self) {
        self.head().store(self.pos, MemOrd::Release);
    }
}
