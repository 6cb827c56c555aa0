use crate::error::ProtocolError;
use crate::ffi::Cursor;

/// Sampling was throttled (or unthrottled) because the event fired faster
/// than `perf_event_max_sample_rate` allows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Throttle {
    pub time: u64,
    pub id: u64,
    pub stream_id: u64,
}

impl Throttle {
    pub(crate) fn from_cursor(cur: &mut Cursor<'_>) -> Result<Self, ProtocolError> {
        // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L923
        // struct {
        //     struct perf_event_header header;
        //     u64 time;
        //     u64 id;
        //     u64 stream_id;
        //     struct sample_id sample_id;
        // };
        let time = cur.u64()?;
        let id = cur.u64()?;
        let stream_id = cur.u64()?;
        Ok(Self {
            time,
            id,
            stream_id,
        })
    }
}
