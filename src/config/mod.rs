use bitflags::bitflags;

use crate::ffi::bindings as b;

pub(crate) mod attr;
mod target;

pub use target::*;

bitflags! {
    /// Sample type mask.
    ///
    /// Selects which fields the kernel writes into every sample record,
    /// and therefore which [`Sample`][crate::sample::record::sample::Sample]
    /// fields can ever be present. The bits are the kernel `PERF_SAMPLE_*`
    /// bits, so the same value drives both the kernel and the parser.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Type: u64 {
        // PERF_SAMPLE_IDENTIFIER
        /// [Sample ID][crate::sample::record::sample::Sample::sample_id].
        const IDENTIFIER = b::PERF_SAMPLE_IDENTIFIER;
        // PERF_SAMPLE_IP
        /// [Instruction pointer][crate::sample::record::sample::Sample::instruction_pointer].
        const INSTRUCTION_POINTER = b::PERF_SAMPLE_IP;
        // PERF_SAMPLE_TID
        /// [Process ID][crate::sample::record::sample::Sample::process_id]
        /// and [thread ID][crate::sample::record::sample::Sample::thread_id].
        const THREAD_ID = b::PERF_SAMPLE_TID;
        // PERF_SAMPLE_TIME
        /// [Timestamp][crate::sample::record::sample::Sample::time].
        const TIME = b::PERF_SAMPLE_TIME;
        // PERF_SAMPLE_ADDR
        /// [Logical data address][crate::sample::record::sample::Sample::logical_memory_address].
        const LOGICAL_MEM_ADDRESS = b::PERF_SAMPLE_ADDR;
        // PERF_SAMPLE_ID
        /// [Event ID][crate::sample::record::sample::Sample::id].
        const ID = b::PERF_SAMPLE_ID;
        // PERF_SAMPLE_CPU
        /// [CPU][crate::sample::record::sample::Sample::cpu_id].
        const CPU_ID = b::PERF_SAMPLE_CPU;
        // PERF_SAMPLE_PERIOD
        /// [Sampling period][crate::sample::record::sample::Sample::period].
        const PERIOD = b::PERF_SAMPLE_PERIOD;
        // PERF_SAMPLE_READ
        /// [Counter values][crate::sample::record::sample::Sample::counter_values].
        const COUNTER_VALUES = b::PERF_SAMPLE_READ;
        // PERF_SAMPLE_CALLCHAIN
        /// [Call chain][crate::sample::record::sample::Sample::callchain].
        const CALLCHAIN = b::PERF_SAMPLE_CALLCHAIN;
        // PERF_SAMPLE_BRANCH_STACK
        /// [Branch stack][crate::sample::record::sample::Sample::branches].
        const BRANCHES = b::PERF_SAMPLE_BRANCH_STACK;
        // PERF_SAMPLE_REGS_USER
        /// [User registers][crate::sample::record::sample::Sample::user_registers],
        /// selected by [`Opts::user_regs`].
        const USER_REGISTERS = b::PERF_SAMPLE_REGS_USER;
        // PERF_SAMPLE_WEIGHT
        /// Single 64-bit [weight][crate::sample::record::sample::Weight::Full].
        const WEIGHT = b::PERF_SAMPLE_WEIGHT;
        // PERF_SAMPLE_DATA_SRC
        /// [Data source][crate::sample::record::sample::Sample::data_source].
        const DATA_SOURCE = b::PERF_SAMPLE_DATA_SRC;
        // PERF_SAMPLE_REGS_INTR
        /// [Registers at interrupt][crate::sample::record::sample::Sample::kernel_registers],
        /// selected by [`Opts::intr_regs`].
        const KERNEL_REGISTERS = b::PERF_SAMPLE_REGS_INTR;
        // PERF_SAMPLE_PHYS_ADDR
        /// [Physical data address][crate::sample::record::sample::Sample::physical_memory_address].
        ///
        /// Since `linux-4.14`.
        const PHYSICAL_MEM_ADDRESS = b::PERF_SAMPLE_PHYS_ADDR;
        // PERF_SAMPLE_DATA_PAGE_SIZE
        /// Since `linux-5.11`.
        const DATA_PAGE_SIZE = b::PERF_SAMPLE_DATA_PAGE_SIZE;
        // PERF_SAMPLE_CODE_PAGE_SIZE
        /// Since `linux-5.11`.
        const CODE_PAGE_SIZE = b::PERF_SAMPLE_CODE_PAGE_SIZE;
        // PERF_SAMPLE_WEIGHT_STRUCT
        /// Split [weight][crate::sample::record::sample::Weight::Vars].
        ///
        /// Since `linux-5.12`.
        const WEIGHT_STRUCT = b::PERF_SAMPLE_WEIGHT_STRUCT;

        /// Data and code page sizes.
        const PAGE_SIZE = Self::DATA_PAGE_SIZE.bits() | Self::CODE_PAGE_SIZE.bits();

        /// Execution mode.
        ///
        /// [Mode][crate::sample::record::Mode] is decoded from every record header
        /// whether or not this is set, it is never passed to the kernel.
        const MODE = 1 << 63;
    }
}

impl Type {
    /// The `sample_type` word passed to the kernel.
    pub(crate) fn kernel_bits(&self) -> u64 {
        self.difference(Self::MODE).bits()
    }
}

/// Sampler options.
///
/// Everything here is passed through to `perf_event_attr`
/// and never interpreted by the sampler itself.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Opts {
    pub exclude: Priv,
    /// Child tasks created after the sampler started inherit it.
    pub inherit: bool,

    pub sample_on: SampleOn,
    pub sample_skid: SampleSkid,

    /// Registers dumped for [`Type::USER_REGISTERS`].
    pub user_regs: RegsMask,
    /// Registers dumped for [`Type::KERNEL_REGISTERS`].
    pub intr_regs: RegsMask,
    /// Privilege levels of branches recorded for [`Type::BRANCHES`].
    pub branch_target: TargetPriv,
    /// Maximum call chain depth for [`Type::CALLCHAIN`], 0 for the system default.
    pub max_stack: u16,

    /// The ring-buffer holds 2^`rb_exp` pages of records.
    pub rb_exp: u8,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            exclude: Priv::default(),
            inherit: false,
            sample_on: SampleOn::default(),
            sample_skid: SampleSkid::default(),
            user_regs: RegsMask::default(),
            intr_regs: RegsMask::default(),
            branch_target: TargetPriv::default(),
            max_stack: 0,
            rb_exp: 12,
        }
    }
}

/// Privilege levels.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Priv {
    /// User space.
    pub user: bool,

    /// Kernel space.
    pub kernel: bool,

    /// Hypervisor.
    pub hv: bool,

    /// Host mode.
    pub host: bool,

    /// Guest mode.
    pub guest: bool,

    /// Idle task.
    pub idle: bool,
}

// https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L12473
/// Privilege levels of recorded branches.
///
/// Inherits the [excluded levels][Opts::exclude] of the event if nothing is set.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetPriv {
    pub user: bool,
    pub kernel: bool,
    pub hv: bool,
}

impl TargetPriv {
    pub(crate) fn as_branch_sample_type(&self) -> u64 {
        let mut val = b::PERF_SAMPLE_BRANCH_ANY;
        macro_rules! when {
            ($field:ident, $flag:ident) => {
                if self.$field {
                    val |= b::$flag;
                }
            };
        }
        when!(user, PERF_SAMPLE_BRANCH_USER);
        when!(kernel, PERF_SAMPLE_BRANCH_KERNEL);
        when!(hv, PERF_SAMPLE_BRANCH_HV);
        val
    }
}

// Details about overflow:
// https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L9958
/// Controls when to generate a sample record.
///
/// Defaults to `Count(4000)`.
///
/// The maximum sample rate is specified in `/proc/sys/kernel/perf_event_max_sample_rate`,
/// the kernel throttles sampling once that limit has been reached.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleOn {
    /// Sample on frequency (Hz).
    ///
    /// The kernel will adjust the sampling period to try and achieve the desired rate.
    Freq(u64),

    /// Sample on every N event counts (sample period).
    Count(u64),
}

impl Default for SampleOn {
    fn default() -> Self {
        Self::Count(4000)
    }
}

/// Controls the amount of sample skid (`precise_ip`).
///
/// Skid is how many instructions execute between an event of interest happening and
/// the kernel being able to stop and record the event. Memory sampling events
/// (e.g. load latency) usually need [`Zero`][Self::Zero].
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleSkid {
    /// Can have arbitrary skid.
    #[default]
    Arbitrary,
    /// Must have constant skid.
    Const,
    /// Requested to have 0 skid.
    ReqZero,
    /// Must have 0 skid.
    Zero,
}

impl SampleSkid {
    pub(crate) fn as_precise_ip(&self) -> u64 {
        match self {
            Self::Arbitrary => 0,
            Self::Const => 1,
            Self::ReqZero => 2,
            Self::Zero => 3,
        }
    }
}

/// Bitmask of architecture registers to dump (`asm/perf_regs.h`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegsMask(pub u64);

impl RegsMask {
    /// Number of registers the kernel writes per sample.
    pub fn len(&self) -> usize {
        self.0.count_ones() as _
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}
