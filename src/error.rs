use std::io;

use thiserror::Error;

use crate::sample::State;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`Sampler`][crate::sample::Sampler] lifecycle calls.
#[derive(Debug, Error)]
pub enum Error {
    /// The kernel refused to create the perf event
    /// (permission, unsupported event or resource exhaustion).
    #[error("failed to open perf event: {0}")]
    Open(#[source] io::Error),

    /// The perf event was created but its ring-buffer could not be mapped.
    #[error("failed to map ring-buffer: {0}")]
    Mmap(#[source] io::Error),

    /// An enable/disable ioctl on the perf event failed.
    #[error("failed to {op} perf event: {source}")]
    Control {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// The call is not valid in the current sampler state.
    #[error("cannot {op} a sampler in state {state:?}")]
    State { state: State, op: &'static str },

    /// The requested configuration can never be accepted.
    #[error("invalid sampler configuration: {0}")]
    InvalidConfig(&'static str),

    /// The ring-buffer contents are inconsistent, draining can not continue.
    #[error("ring-buffer protocol violation: {0}")]
    Protocol(#[from] ProtocolError),
}

impl Error {
    /// The OS error code captured when the failing system call returned.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Open(e) | Self::Mmap(e) | Self::Control { source: e, .. } => e.raw_os_error(),
            _ => None,
        }
    }
}

/// Inconsistencies found while reading raw records.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Fewer bytes than a record header were published by the producer.
    #[error("only {available} bytes published, record header needs 8")]
    Truncated { available: u64 },

    /// The declared record size does not fit what the producer published.
    #[error("record declares {size} bytes, {available} available (capacity {capacity})")]
    BadSize {
        size: u16,
        available: u64,
        capacity: u64,
    },

    /// A record body ended before all its sub-fields were read.
    #[error("record body too short: wanted {want} bytes at offset {offset}, record has {len}")]
    ShortRecord { offset: usize, want: usize, len: usize },

    /// A register dump carries an ABI tag the kernel does not define.
    #[error("unknown register ABI {0}")]
    UnknownAbi(u64),
}
