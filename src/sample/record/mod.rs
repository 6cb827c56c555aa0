//! Records read from the ring-buffer.

use lost::{LostRecords, LostSamples};
use sample::Sample;
use throttle::Throttle;

use crate::config::Type;
use crate::error::ProtocolError;
use crate::ffi::{bindings as b, Attr, Cursor};

pub mod data_source;
mod lost;
pub mod sample;
mod throttle;

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L824
// struct perf_event_header {
//     u32 type;
//     u16 misc;
//     u16 size;
// };
/// Header in front of every record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub ty: u32,
    pub misc: u16,
    /// Size of the whole record, header included.
    pub size: u16,
}

impl RecordHeader {
    pub const SIZE: usize = 8;

    pub(crate) fn from_cursor(cur: &mut Cursor<'_>) -> Result<Self, ProtocolError> {
        let ty = cur.u32()?;
        let misc = cur.u16()?;
        let size = cur.u16()?;
        Ok(Self { ty, misc, size })
    }
}

/// Privilege level the CPU was running at when the record was generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    Unknown,
    Kernel,
    User,
    Hypervisor,
    GuestKernel,
    GuestUser,
}

impl Mode {
    pub(crate) fn from_misc(misc: u16) -> Self {
        match misc & b::PERF_RECORD_MISC_CPUMODE_MASK {
            b::PERF_RECORD_MISC_KERNEL => Self::Kernel,
            b::PERF_RECORD_MISC_USER => Self::User,
            b::PERF_RECORD_MISC_HYPERVISOR => Self::Hypervisor,
            b::PERF_RECORD_MISC_GUEST_KERNEL => Self::GuestKernel,
            b::PERF_RECORD_MISC_GUEST_USER => Self::GuestUser,
            _ => Self::Unknown,
        }
    }
}

/// A decoded record.
///
/// Only the record types a sampler can produce are decoded,
/// everything else is reported as [`Unknown`][Self::Unknown].
#[derive(Clone, Debug)]
pub(crate) enum Record {
    Sample(Box<Sample>),
    Lost(LostRecords),
    LostSamples(LostSamples),
    Throttle(Throttle),
    Unthrottle(Throttle),
    Unknown(u32),
}

/// Decodes record bodies according to the attr the event was opened with.
#[derive(Clone, Debug)]
pub(crate) struct Parser {
    pub sample_type: Type,
    pub read_format: u64,
    pub user_regs: usize,
    pub intr_regs: usize,
    pub branch_sample_type: u64,
}

impl Parser {
    pub fn from_attr(attr: &Attr) -> Self {
        Self {
            sample_type: Type::from_bits_retain(attr.sample_type),
            read_format: attr.read_format,
            user_regs: attr.sample_regs_user.count_ones() as _,
            intr_regs: attr.sample_regs_intr.count_ones() as _,
            branch_sample_type: attr.branch_sample_type,
        }
    }

    /// Parses the body (the bytes after the header) of one record.
    pub fn parse(&self, header: &RecordHeader, body: &[u8]) -> Result<Record, ProtocolError> {
        let cur = &mut Cursor::new(body);

        let record = match header.ty {
            b::PERF_RECORD_SAMPLE => {
                let sample = Sample::from_cursor(cur, header.misc, self)?;
                Record::Sample(Box::new(sample))
            }
            b::PERF_RECORD_LOST => Record::Lost(LostRecords::from_cursor(cur)?),
            b::PERF_RECORD_LOST_SAMPLES => Record::LostSamples(LostSamples::from_cursor(cur)?),
            b::PERF_RECORD_THROTTLE => Record::Throttle(Throttle::from_cursor(cur)?),
            b::PERF_RECORD_UNTHROTTLE => Record::Unthrottle(Throttle::from_cursor(cur)?),
            ty => Record::Unknown(ty),
        };

        Ok(record)
    }
}
