use std::fs::File;
use std::io::Result;
use std::os::fd::AsRawFd;
use std::ptr::{null_mut, NonNull};

use crate::ffi::syscall::{mmap, munmap};

/// Memory mapped over a perf event: the `perf_event_mmap_page` header page
/// followed by the data pages.
pub(crate) struct Arena {
    ptr: NonNull<u8>,
    len: usize,
}

impl Arena {
    pub fn new(file: &File, len: usize) -> Result<Self> {
        let prot = libc::PROT_READ | libc::PROT_WRITE;
        // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L6582
        let flags = libc::MAP_SHARED;
        let fd = file.as_raw_fd();
        let ptr = unsafe { mmap::<u8>(null_mut(), len, prot, flags, fd, 0) }?;
        // mmap never returns null on success
        let ptr = NonNull::new(ptr).ok_or_else(|| std::io::Error::other("mmap returned null"))?;
        Ok(Self { ptr, len })
    }

    /// Zeroed shared memory with no kernel producer behind it.
    #[cfg(test)]
    pub fn anonymous(len: usize) -> Result<Self> {
        let prot = libc::PROT_READ | libc::PROT_WRITE;
        let flags = libc::MAP_SHARED | libc::MAP_ANONYMOUS;
        let ptr = unsafe { mmap::<u8>(null_mut(), len, prot, flags, -1, 0) }?;
        let ptr = NonNull::new(ptr).ok_or_else(|| std::io::Error::other("mmap returned null"))?;
        Ok(Self { ptr, len })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Err(e) = unsafe { munmap(self.ptr.as_ptr(), self.len) } {
            log::error!("failed to unmap ring-buffer: {}", e);
        }
    }
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L580
// struct perf_event_mmap_page {
//     u32 version;        /* version number of this structure */
//     u32 compat_version; /* lowest version this is compat with */
//
//     u32 lock;         /* seqlock for synchronization */
//     u32 index;        /* hardware event identifier */
//     s64 offset;       /* add to hardware event value */
//     u64 time_enabled; /* time event active */
//     u64 time_running; /* time event on CPU */
//     u64 capabilities;
//
//     u16 pmc_width;
//     u16 time_shift;
//     u32 time_mult;
//     u64 time_offset;
//     u64 time_zero;
//
//     u32 size;
//     u32 __reserved_1;
//
//     u64 time_cycles;
//     u64 time_mask;
//
//     u8 __reserved[116*8];
//
//     u64 data_head;   /* head in the data section */
//     u64 data_tail;   /* user-space written tail */
//     u64 data_offset; /* where the buffer starts */
//     u64 data_size;   /* data buffer size */
//     ...
// };
