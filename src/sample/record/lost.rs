use crate::error::ProtocolError;
use crate::ffi::Cursor;

// PERF_RECORD_LOST counts all lost records:
// Count lost when paused:
// https://github.com/torvalds/linux/blob/v6.13/kernel/events/ring_buffer.c#L178
// Count lost when no space:
// https://github.com/torvalds/linux/blob/v6.13/kernel/events/ring_buffer.c#L203
// Generate PERF_RECORD_LOST:
// https://github.com/torvalds/linux/blob/v6.13/kernel/events/ring_buffer.c#L189
/// Records the kernel dropped because the ring-buffer was full.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LostRecords {
    /// ID of the event the records belonged to.
    pub id: u64,
    pub lost: u64,
}

impl LostRecords {
    pub(crate) fn from_cursor(cur: &mut Cursor<'_>) -> Result<Self, ProtocolError> {
        // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L891
        // struct {
        //     struct perf_event_header header;
        //     u64 id;
        //     u64 lost;
        //     struct sample_id sample_id;
        // };
        let id = cur.u64()?;
        let lost = cur.u64()?;
        Ok(Self { id, lost })
    }
}

/// Samples the kernel dropped before they reached the ring-buffer
/// (e.g. filtered by hardware).
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LostSamples {
    pub lost: u64,
}

impl LostSamples {
    pub(crate) fn from_cursor(cur: &mut Cursor<'_>) -> Result<Self, ProtocolError> {
        // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1105
        // struct {
        //     struct perf_event_header header;
        //     u64 lost;
        //     struct sample_id sample_id;
        // };
        let lost = cur.u64()?;
        Ok(Self { lost })
    }
}
