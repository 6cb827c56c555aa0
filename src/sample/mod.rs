use std::fs::File;
use std::io;
use std::ptr::addr_of_mut;
use std::sync::atomic::{AtomicU64, Ordering as MemOrd};

use arena::Arena;
use log::{debug, error, trace, warn};
use rb::Rb;
use record::sample::Sample;
use record::{Parser, Record};

use crate::config::{attr, Opts, Target, Type};
use crate::error::{Error, ProtocolError, Result};
use crate::event::{Event, EventConfig};
use crate::ffi::syscall::{ioctl, perf_event_open};
use crate::ffi::{bindings as b, Metadata, PAGE_SIZE};

mod arena;
mod rb;
pub mod record;
#[cfg(test)]
mod testing;

/// Lifecycle state of a [`Sampler`].
///
/// `Idle → Started → Stopped → Closed`, any failure to acquire the
/// kernel resources ends in `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Started,
    Stopped,
    Closed,
    Failed,
}

/// Event sampler.
///
/// Captures the context (time, addresses, memory hierarchy, latency,
/// branches, registers, call chain) every time the event overflows, similar
/// to the `perf record` command. The kernel writes the samples into a ring-buffer
/// on its own, [`result`][Self::result] drains and decodes them.
///
/// # Examples
///
/// ```rust,no_run
/// use perf_sampler::config::{Opts, SampleOn, SampleSkid, Target, Type};
/// use perf_sampler::event::raw::Raw;
/// use perf_sampler::sample::Sampler;
///
/// // MEM_TRANS_RETIRED.LOAD_LATENCY on Intel, loads slower than 3 cycles.
/// let event = Raw {
///     config: 0x1cd,
///     config1: 0x3,
///     ..Default::default()
/// };
/// let mut opts = Opts::default();
/// opts.sample_on = SampleOn::Count(1000);
/// opts.sample_skid = SampleSkid::Zero;
///
/// let ty = Type::TIME | Type::LOGICAL_MEM_ADDRESS | Type::DATA_SOURCE | Type::WEIGHT;
/// let mut sampler = Sampler::new(event, Target::default(), ty, opts);
///
/// sampler.start().unwrap();
/// // ... workload ...
/// sampler.stop().unwrap();
///
/// for sample in sampler.result().unwrap() {
///     let ds = sample.data_source().unwrap();
///     println!("{:?} {:?} l2={}", sample.time(), sample.weight(), ds.is_mem_l2());
/// }
/// let samples = sampler.close().unwrap();
/// println!("{} samples, {} lost", samples.len(), samples.lost());
/// ```
pub struct Sampler {
    event: EventConfig,
    target: Target,
    sample_type: Type,
    opts: Opts,

    state: State,
    session: Option<Session>,
    samples: Samples,
    poisoned: Option<ProtocolError>,
    last_error: Option<i32>,
}

impl Sampler {
    /// Creates an idle sampler, no kernel resource is acquired yet.
    pub fn new(
        event: impl Into<Event>,
        target: impl Into<Target>,
        sample_type: Type,
        opts: Opts,
    ) -> Self {
        Self {
            event: event.into().0,
            target: target.into(),
            sample_type,
            opts,
            state: State::Idle,
            session: None,
            samples: Samples::default(),
            poisoned: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn sample_type(&self) -> Type {
        self.sample_type
    }

    /// OS error code of the last failed system call.
    pub fn last_error(&self) -> Option<i32> {
        self.last_error
    }

    /// Samples the kernel reported as lost so far.
    pub fn lost(&self) -> u64 {
        self.samples.lost
    }

    /// Malformed sample records skipped so far.
    pub fn skipped(&self) -> u64 {
        self.samples.skipped
    }

    /// Opens the perf event, maps its ring-buffer and enables it.
    ///
    /// Only valid once, on an [`Idle`][State::Idle] sampler.
    pub fn start(&mut self) -> Result<()> {
        self.expect(&[State::Idle], "start")?;

        let session = match self.open() {
            Ok(session) => session,
            Err(e) => return Err(self.fail(e)),
        };
        self.begin(session)
    }

    fn open(&self) -> Result<Session> {
        let attr = attr::from(&self.event, self.sample_type, &self.opts)?;

        let Some(len) = 2_usize
            .checked_pow(self.opts.rb_exp as u32)
            .and_then(|n| n.checked_add(1))
            .and_then(|n| n.checked_mul(*PAGE_SIZE))
        else {
            return Err(Error::InvalidConfig("ring-buffer size overflow"));
        };

        let Target { pid, cpu } = self.target;
        let flags = b::PERF_FLAG_FD_CLOEXEC;
        let file = perf_event_open(&attr, pid, cpu, -1, flags).map_err(Error::Open)?;
        let arena = Arena::new(&file, len).map_err(Error::Mmap)?;
        debug!("perf event opened (pid {}, cpu {}), {} bytes mapped", pid, cpu, len);

        Ok(Session {
            ctl: Box::new(file),
            arena,
            parser: Parser::from_attr(&attr),
        })
    }

    fn begin(&mut self, session: Session) -> Result<()> {
        if let Err(e) = session.ctl.enable() {
            // Dropping the session unmaps and closes the event.
            return Err(self.fail(Error::Control {
                op: "enable",
                source: e,
            }));
        }

        self.session = Some(session);
        self.state = State::Started;
        debug!("sampler started");
        Ok(())
    }

    /// Disables the event. Records generated before stay retrievable.
    ///
    /// Only valid once, on a [`Started`][State::Started] sampler.
    pub fn stop(&mut self) -> Result<()> {
        self.expect(&[State::Started], "stop")?;
        self.disable()?;
        self.state = State::Stopped;
        debug!("sampler stopped");
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        let Some(session) = &self.session else {
            return Err(Error::State {
                state: self.state,
                op: "disable",
            });
        };
        if let Err(e) = session.ctl.disable() {
            return Err(self.fail(Error::Control {
                op: "disable",
                source: e,
            }));
        }
        Ok(())
    }

    /// Returns `true` if the kernel published records not drained yet.
    pub fn has_pending(&self) -> bool {
        match &self.session {
            Some(session) if self.poisoned.is_none() => Rb::new(&session.arena).has_pending(),
            _ => false,
        }
    }

    /// Drains all pending records and returns every sample decoded so far,
    /// in the order the kernel wrote them.
    ///
    /// Valid on a [`Started`][State::Started] sampler for polling, and on a
    /// [`Stopped`][State::Stopped] one. Once the ring-buffer turns out to be
    /// inconsistent this and every later call return [`Error::Protocol`],
    /// the samples decoded before are still returned by [`close`][Self::close].
    pub fn result(&mut self) -> Result<&Samples> {
        self.expect(&[State::Started, State::Stopped], "read results of")?;
        if let Some(e) = &self.poisoned {
            return Err(Error::Protocol(e.clone()));
        }

        if let Some(session) = &self.session {
            if let Err(e) = session.drain(&mut self.samples) {
                error!("ring-buffer can not be drained any further: {}", e);
                self.poisoned = Some(e.clone());
                return Err(Error::Protocol(e));
            }
        }

        Ok(&self.samples)
    }

    /// Releases the ring-buffer and the perf event, returning the samples.
    ///
    /// Records still pending in the ring-buffer are drained first.
    /// A started sampler is stopped before.
    pub fn close(&mut self) -> Result<Samples> {
        self.expect(&[State::Idle, State::Started, State::Stopped, State::Failed], "close")?;

        if self.state == State::Started {
            if let Err(e) = self.disable() {
                warn!("closing without disabling first: {}", e);
            }
        }

        if let Some(session) = self.session.take() {
            if self.poisoned.is_none() {
                if let Err(e) = session.drain(&mut self.samples) {
                    error!("ring-buffer can not be drained any further: {}", e);
                    self.poisoned = Some(e);
                }
            }
        }

        self.state = State::Closed;
        debug!(
            "sampler closed: {} samples, {} lost, {} skipped",
            self.samples.len(),
            self.samples.lost,
            self.samples.skipped
        );
        Ok(std::mem::take(&mut self.samples))
    }

    /// Counter's enabled time, read from the ring-buffer metadata.
    ///
    /// `None` if no ring-buffer is mapped.
    pub fn counter_time_enabled(&self) -> Option<u64> {
        let session = self.session.as_ref()?;
        let metadata = session.arena.as_ptr() as *mut Metadata;
        let time_enabled = unsafe { AtomicU64::from_ptr(addr_of_mut!((*metadata).time_enabled)) };
        Some(time_enabled.load(MemOrd::Relaxed))
    }

    /// Counter's running time, read from the ring-buffer metadata.
    ///
    /// `None` if no ring-buffer is mapped.
    pub fn counter_time_running(&self) -> Option<u64> {
        let session = self.session.as_ref()?;
        let metadata = session.arena.as_ptr() as *mut Metadata;
        let time_running = unsafe { AtomicU64::from_ptr(addr_of_mut!((*metadata).time_running)) };
        Some(time_running.load(MemOrd::Relaxed))
    }

    fn expect(&self, states: &[State], op: &'static str) -> Result<()> {
        if states.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::State {
                state: self.state,
                op,
            })
        }
    }

    fn fail(&mut self, e: Error) -> Error {
        error!("sampler failed: {}", e);
        self.last_error = e.raw_os_error();
        self.state = State::Failed;
        e
    }
}

// `Arena::ptr` is valid during the lifetime of `Sampler`.
unsafe impl Send for Sampler {}

/// Samples drained from one ring-buffer.
#[derive(Clone, Debug, Default)]
pub struct Samples {
    samples: Vec<Sample>,
    lost: u64,
    skipped: u64,
}

impl Samples {
    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples the kernel could not write because the ring-buffer was full,
    /// or dropped before they reached it.
    pub fn lost(&self) -> u64 {
        self.lost
    }

    /// Malformed sample records that were skipped.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn into_vec(self) -> Vec<Sample> {
        self.samples
    }
}

impl<'a> IntoIterator for &'a Samples {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

impl IntoIterator for Samples {
    type Item = Sample;
    type IntoIter = std::vec::IntoIter<Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.into_iter()
    }
}

/// Enable/disable switch of a perf event.
trait Control: Send {
    fn enable(&self) -> io::Result<()>;
    fn disable(&self) -> io::Result<()>;
}

impl Control for File {
    fn enable(&self) -> io::Result<()> {
        ioctl(self, b::PERF_IOC_OP_ENABLE)?;
        Ok(())
    }

    fn disable(&self) -> io::Result<()> {
        ioctl(self, b::PERF_IOC_OP_DISABLE)?;
        Ok(())
    }
}

/// Kernel resources held while a sampler is started or stopped.
struct Session {
    ctl: Box<dyn Control>,
    arena: Arena,
    parser: Parser,
}

impl Session {
    fn drain(&self, samples: &mut Samples) -> std::result::Result<(), ProtocolError> {
        let mut rb = Rb::new(&self.arena);

        while let Some(raw) = rb.next_raw_record()? {
            // Everything is copied out, the kernel may reuse the space.
            rb.commit(raw.len());

            let record = match self.parser.parse(&raw.header, &raw.body) {
                Ok(record) => record,
                Err(e) => {
                    warn!("skipping malformed record (type {}): {}", raw.header.ty, e);
                    samples.skipped += 1;
                    continue;
                }
            };

            match record {
                Record::Sample(sample) => {
                    trace!("sample: {:?}", sample);
                    samples.samples.push(*sample);
                }
                Record::Lost(lost) => {
                    warn!("{} records lost (event id {})", lost.lost, lost.id);
                    samples.lost += lost.lost;
                }
                Record::LostSamples(lost) => {
                    warn!("{} samples lost", lost.lost);
                    samples.lost += lost.lost;
                }
                Record::Throttle(it) => {
                    debug!("sampling throttled at {} (id {}, stream {})", it.time, it.id, it.stream_id)
                }
                Record::Unthrottle(it) => {
                    debug!("sampling unthrottled at {} (id {}, stream {})", it.time, it.id, it.stream_id)
                }
                Record::Unknown(ty) => trace!("skipping record of type {}", ty),
            }
        }

        Ok(())
    }
}
