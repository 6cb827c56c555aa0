use super::{Mode, Parser};
use crate::config::Type;
use crate::error::ProtocolError;
use crate::ffi::{bindings as b, Cursor};

pub use super::data_source::DataSource;

/// One decoded sample.
///
/// Only [`mode`][Self::mode] is always there. Every other field is `Some`
/// only when its [`Type`] bit was requested and the kernel actually wrote it,
/// so an unrequested field can never read as zero.
///
/// All variable-length data is owned, nothing refers back into the ring-buffer.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    mode: Mode,
    exact_ip: bool,
    present: Type,

    sample_id: Option<u64>,
    instruction_pointer: Option<u64>,
    process_id: Option<u32>,
    thread_id: Option<u32>,
    time: Option<u64>,
    logical_memory_address: Option<u64>,
    id: Option<u64>,
    cpu_id: Option<u32>,
    period: Option<u64>,
    counter_values: Option<CounterValues>,
    callchain: Option<Vec<u64>>,
    branches: Option<Vec<Branch>>,
    user_registers: Option<Registers>,
    weight: Option<Weight>,
    data_source: Option<DataSource>,
    kernel_registers: Option<Registers>,
    physical_memory_address: Option<u64>,
    data_page_size: Option<u64>,
    code_page_size: Option<u64>,
}

// Scalar fields: `Copy` getter.
macro_rules! scalar {
    ($(#[$doc:meta])* $field:ident, $set:ident, $ty:ty, $flag:ident) => {
        $(#[$doc])*
        pub fn $field(&self) -> Option<$ty> {
            self.$field
        }

        pub fn $set(&mut self, val: $ty) {
            self.$field = Some(val);
            self.present |= Type::$flag;
        }
    };
}

// Owned containers: borrowed getter plus a mutable accessor for late enrichment.
macro_rules! owned {
    ($(#[$doc:meta])* $field:ident, $set:ident, $field_mut:ident, $ty:ty, $view:ty, $flag:ident) => {
        $(#[$doc])*
        pub fn $field(&self) -> Option<&$view> {
            self.$field.as_deref()
        }

        pub fn $set(&mut self, val: $ty) {
            self.$field = Some(val);
            self.present |= Type::$flag;
        }

        pub fn $field_mut(&mut self) -> Option<&mut $ty> {
            self.$field.as_mut()
        }
    };
}

impl Sample {
    /// An empty sample, carrying nothing but its execution mode.
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            exact_ip: false,
            present: Type::MODE,
            sample_id: None,
            instruction_pointer: None,
            process_id: None,
            thread_id: None,
            time: None,
            logical_memory_address: None,
            id: None,
            cpu_id: None,
            period: None,
            counter_values: None,
            callchain: None,
            branches: None,
            user_registers: None,
            weight: None,
            data_source: None,
            kernel_registers: None,
            physical_memory_address: None,
            data_page_size: None,
            code_page_size: None,
        }
    }

    /// Execution mode of the sampled instruction, taken from the record header.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether [`instruction_pointer`][Self::instruction_pointer] points to the
    /// instruction that triggered the event rather than a later one.
    pub fn exact_ip(&self) -> bool {
        self.exact_ip
    }

    pub fn set_exact_ip(&mut self, exact: bool) {
        self.exact_ip = exact;
    }

    /// The fields this sample carries, [`Type::MODE`] included.
    pub fn present(&self) -> Type {
        self.present
    }

    /// Returns `true` if all fields selected by `ty` are present.
    pub fn has(&self, ty: Type) -> bool {
        self.present.contains(ty)
    }

    scalar!(sample_id, set_sample_id, u64, IDENTIFIER);
    scalar!(instruction_pointer, set_instruction_pointer, u64, INSTRUCTION_POINTER);
    scalar!(process_id, set_process_id, u32, THREAD_ID);
    scalar!(thread_id, set_thread_id, u32, THREAD_ID);
    scalar!(
        /// Timestamp in nanoseconds, by default from the kernel's `local_clock`.
        time, set_time, u64, TIME
    );
    scalar!(
        /// Data address.
        ///
        /// Set by precise memory events (loads, stores), by breakpoints and
        /// tracepoints; 0 for events that have none.
        logical_memory_address, set_logical_memory_address, u64, LOGICAL_MEM_ADDRESS
    );
    scalar!(
        /// Physical data address.
        physical_memory_address, set_physical_memory_address, u64, PHYSICAL_MEM_ADDRESS
    );
    scalar!(
        /// Unique ID of the event that generated this sample.
        id, set_id, u64, ID
    );
    scalar!(cpu_id, set_cpu_id, u32, CPU_ID);
    scalar!(period, set_period, u64, PERIOD);
    scalar!(data_source, set_data_source, DataSource, DATA_SOURCE);
    scalar!(
        /// Page size of [data address][Self::logical_memory_address].
        data_page_size, set_data_page_size, u64, DATA_PAGE_SIZE
    );
    scalar!(
        /// Page size of [code address][Self::instruction_pointer].
        code_page_size, set_code_page_size, u64, CODE_PAGE_SIZE
    );

    owned!(
        /// Call chain (stack backtrace), innermost frame first.
        ///
        /// Contains `PERF_CONTEXT_*` markers separating kernel and user frames.
        callchain, set_callchain, callchain_mut, Vec<u64>, [u64], CALLCHAIN
    );
    owned!(
        /// Branch stack (LBR), most recent branch first.
        branches, set_branches, branches_mut, Vec<Branch>, [Branch], BRANCHES
    );

    pub fn counter_values(&self) -> Option<&CounterValues> {
        self.counter_values.as_ref()
    }

    pub fn set_counter_values(&mut self, val: CounterValues) {
        self.counter_values = Some(val);
        self.present |= Type::COUNTER_VALUES;
    }

    pub fn counter_values_mut(&mut self) -> Option<&mut CounterValues> {
        self.counter_values.as_mut()
    }

    /// User-space registers at the time of the sample.
    pub fn user_registers(&self) -> Option<&Registers> {
        self.user_registers.as_ref()
    }

    pub fn set_user_registers(&mut self, val: Registers) {
        self.user_registers = Some(val);
        self.present |= Type::USER_REGISTERS;
    }

    pub fn user_registers_mut(&mut self) -> Option<&mut Registers> {
        self.user_registers.as_mut()
    }

    /// Registers at the interrupt, whichever privilege level was running.
    pub fn kernel_registers(&self) -> Option<&Registers> {
        self.kernel_registers.as_ref()
    }

    pub fn set_kernel_registers(&mut self, val: Registers) {
        self.kernel_registers = Some(val);
        self.present |= Type::KERNEL_REGISTERS;
    }

    pub fn kernel_registers_mut(&mut self) -> Option<&mut Registers> {
        self.kernel_registers.as_mut()
    }

    /// Hardware provided cost of the sample, usually latency in cycles.
    pub fn weight(&self) -> Option<Weight> {
        self.weight
    }

    pub fn set_weight(&mut self, val: Weight) {
        self.present |= match val {
            Weight::Full(_) => Type::WEIGHT,
            Weight::Vars { .. } => Type::WEIGHT_STRUCT,
        };
        self.weight = Some(val);
    }

    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L957
    // struct {
    //     struct perf_event_header header;
    //     { u64 id;           } && PERF_SAMPLE_IDENTIFIER
    //     { u64 ip;           } && PERF_SAMPLE_IP
    //     { u32 pid, tid;     } && PERF_SAMPLE_TID
    //     { u64 time;         } && PERF_SAMPLE_TIME
    //     { u64 addr;         } && PERF_SAMPLE_ADDR
    //     { u64 id;           } && PERF_SAMPLE_ID
    //     { u64 stream_id;    } && PERF_SAMPLE_STREAM_ID
    //     { u32 cpu, res;     } && PERF_SAMPLE_CPU
    //     { u64 period;       } && PERF_SAMPLE_PERIOD
    //     { struct read_format values; } && PERF_SAMPLE_READ
    //     {
    //         u64 nr,
    //         u64 ips[nr];
    //     } && PERF_SAMPLE_CALLCHAIN
    //     {
    //         u32 size;
    //         char data[size];
    //     } && PERF_SAMPLE_RAW
    //     {
    //         u64 nr;
    //         { u64 hw_idx; } && PERF_SAMPLE_BRANCH_HW_INDEX
    //         { struct perf_branch_entry lbr[nr]; }
    //     } && PERF_SAMPLE_BRANCH_STACK
    //     {
    //         u64 abi; # enum perf_sample_regs_abi
    //         u64 regs[weight(mask)];
    //     } && PERF_SAMPLE_REGS_USER
    //     {
    //         u64 size;
    //         char data[size];
    //         u64 dyn_size;
    //     } && PERF_SAMPLE_STACK_USER
    //     union perf_sample_weight weight;
    //     { u64 data_src;     } && PERF_SAMPLE_DATA_SRC
    //     { u64 transaction;  } && PERF_SAMPLE_TRANSACTION
    //     {
    //         u64 abi; # enum perf_sample_regs_abi
    //         u64 regs[weight(mask)];
    //     } && PERF_SAMPLE_REGS_INTR
    //     { u64 phys_addr;      } && PERF_SAMPLE_PHYS_ADDR
    //     { u64 cgroup;         } && PERF_SAMPLE_CGROUP
    //     { u64 data_page_size; } && PERF_SAMPLE_DATA_PAGE_SIZE
    //     { u64 code_page_size; } && PERF_SAMPLE_CODE_PAGE_SIZE
    // };
    //
    // STREAM_ID, RAW, STACK_USER, TRANSACTION and CGROUP can not be requested
    // through `Type`, so they never show up in the records we parse.
    pub(crate) fn from_cursor(
        cur: &mut Cursor<'_>,
        misc: u16,
        parser: &Parser,
    ) -> Result<Self, ProtocolError> {
        let sample_type = parser.sample_type;

        macro_rules! when {
            ($flag:ident) => {
                sample_type.contains(Type::$flag)
            };
        }

        let mut sample = Sample::new(Mode::from_misc(misc));
        sample.set_exact_ip(misc & b::PERF_RECORD_MISC_EXACT_IP > 0);

        if when!(IDENTIFIER) {
            sample.set_sample_id(cur.u64()?);
        }
        if when!(INSTRUCTION_POINTER) {
            sample.set_instruction_pointer(cur.u64()?);
        }
        if when!(THREAD_ID) {
            sample.set_process_id(cur.u32()?);
            sample.set_thread_id(cur.u32()?);
        }
        if when!(TIME) {
            sample.set_time(cur.u64()?);
        }
        if when!(LOGICAL_MEM_ADDRESS) {
            sample.set_logical_memory_address(cur.u64()?);
        }
        if when!(ID) {
            sample.set_id(cur.u64()?);
        }
        if when!(CPU_ID) {
            sample.set_cpu_id(cur.u32()?);
            cur.skip(size_of::<u32>())?; // res
        }
        if when!(PERIOD) {
            sample.set_period(cur.u64()?);
        }
        if when!(COUNTER_VALUES) {
            sample.set_counter_values(CounterValues::from_cursor(cur, parser.read_format)?);
        }
        if when!(CALLCHAIN) {
            let nr = cur.u64()?;
            sample.set_callchain(cur.u64s(nr as _)?);
        }
        if when!(BRANCHES) {
            if let Some(branches) = parse_branches(cur, parser.branch_sample_type)? {
                sample.set_branches(branches);
            }
        }
        if when!(USER_REGISTERS) {
            if let Some(regs) = Registers::from_cursor(cur, parser.user_regs)? {
                sample.set_user_registers(regs);
            }
        }
        if when!(WEIGHT) {
            sample.set_weight(Weight::Full(cur.u64()?));
        } else if when!(WEIGHT_STRUCT) {
            sample.set_weight(Weight::from_cursor(cur)?);
        }
        if when!(DATA_SOURCE) {
            sample.set_data_source(DataSource::new(cur.u64()?));
        }
        if when!(KERNEL_REGISTERS) {
            if let Some(regs) = Registers::from_cursor(cur, parser.intr_regs)? {
                sample.set_kernel_registers(regs);
            }
        }
        if when!(PHYSICAL_MEM_ADDRESS) {
            sample.set_physical_memory_address(cur.u64()?);
        }
        if when!(DATA_PAGE_SIZE) {
            sample.set_data_page_size(cur.u64()?);
        }
        if when!(CODE_PAGE_SIZE) {
            sample.set_code_page_size(cur.u64()?);
        }

        Ok(sample)
    }
}

fn parse_branches(
    cur: &mut Cursor<'_>,
    branch_sample_type: u64,
) -> Result<Option<Vec<Branch>>, ProtocolError> {
    let nr = cur.u64()?;
    // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L7575
    if nr == 0 {
        return Ok(None);
    }

    // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L7560
    if branch_sample_type & b::PERF_SAMPLE_BRANCH_HW_INDEX > 0 {
        cur.skip(size_of::<u64>())?;
    }

    // Bounded by the record size, a bogus `nr` fails on the first short read.
    let mut branches = vec![];
    for _ in 0..nr {
        let from = cur.u64()?;
        let to = cur.u64()?;
        let flags = cur.u64()?;
        branches.push(Branch::new(from, to, flags));
    }
    Ok(Some(branches))
}

/// Weight of the sample.
///
/// Which variant appears depends on whether [`Type::WEIGHT`] or
/// [`Type::WEIGHT_STRUCT`] was requested. A [`Full`][Self::Full] weight has
/// no `var2`/`var3`, which is not the same as those being zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Weight {
    Full(u64),
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1329
    /// On Intel `var1` is the total latency and `var2` the instruction latency,
    /// on POWER `var2` and `var3` carry the pipeline stage cycles.
    Vars { var1: u32, var2: u16, var3: u16 },
}

impl Weight {
    fn from_cursor(cur: &mut Cursor<'_>) -> Result<Self, ProtocolError> {
        // union perf_sample_weight {
        //     __u64 full;
        //     struct {
        //         __u32 var1_dw;
        //         __u16 var2_w;
        //         __u16 var3_w;
        //     }; # reversed on big-endian
        // };
        #[cfg(target_endian = "little")]
        let vars = {
            let var1 = cur.u32()?;
            let var2 = cur.u16()?;
            let var3 = cur.u16()?;
            Weight::Vars { var1, var2, var3 }
        };
        #[cfg(target_endian = "big")]
        let vars = {
            let var3 = cur.u16()?;
            let var2 = cur.u16()?;
            let var1 = cur.u32()?;
            Weight::Vars { var1, var2, var3 }
        };
        Ok(vars)
    }

    /// The latency part: `var1`, or the low 32 bits of a full weight.
    pub fn latency(&self) -> u32 {
        match *self {
            Self::Full(full) => full as u32,
            Self::Vars { var1, .. } => var1,
        }
    }

    pub fn var2(&self) -> Option<u16> {
        match *self {
            Self::Full(_) => None,
            Self::Vars { var2, .. } => Some(var2),
        }
    }

    pub fn var3(&self) -> Option<u16> {
        match *self {
            Self::Full(_) => None,
            Self::Vars { var3, .. } => Some(var3),
        }
    }
}

// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L1436
// struct perf_branch_entry {
//     __u64 from;
//     __u64 to;
//     __u64 mispred   :  1, /* target mispredicted */
//           predicted :  1, /* target predicted */
//           in_tx     :  1, /* in transaction */
//           abort     :  1, /* transaction abort */
//           cycles    : 16, /* cycle count to last branch */
//           type      :  4, /* branch type */
//           spec      :  2, /* branch speculation info */
//           new_type  :  4, /* additional branch type */
//           priv      :  3, /* privilege level */
//           reserved  : 31;
// };
/// One entry of the branch stack.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Branch {
    from: u64,
    to: u64,
    mispredicted: bool,
    predicted: bool,
    in_transaction: bool,
    transaction_abort: bool,
    cycles: u16,
}

impl Branch {
    /// Decodes a `perf_branch_entry` from its three words.
    pub fn new(from: u64, to: u64, flags: u64) -> Self {
        macro_rules! when {
            ($flag:ident) => {
                flags & b::$flag > 0
            };
        }

        Self {
            from,
            to,
            mispredicted: when!(PERF_BRANCH_MISPRED),
            predicted: when!(PERF_BRANCH_PREDICTED),
            in_transaction: when!(PERF_BRANCH_IN_TX),
            transaction_abort: when!(PERF_BRANCH_ABORT),
            cycles: ((flags >> b::PERF_BRANCH_CYCLES_SHIFT) & b::PERF_BRANCH_CYCLES_MASK) as _,
        }
    }

    /// Branch source address.
    pub fn from(&self) -> u64 {
        self.from
    }

    /// Branch target address.
    pub fn to(&self) -> u64 {
        self.to
    }

    pub fn mispredicted(&self) -> bool {
        self.mispredicted
    }

    pub fn predicted(&self) -> bool {
        self.predicted
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn transaction_abort(&self) -> bool {
        self.transaction_abort
    }

    /// Cycles elapsed since the previous branch, 0 if not supported.
    pub fn cycles(&self) -> u16 {
        self.cycles
    }
}

/// ABI of a register dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Abi {
    _32,
    _64,
}

/// Register snapshot, in ascending bit order of the requested
/// [mask][crate::config::RegsMask].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Registers {
    pub abi: Abi,
    pub values: Vec<u64>,
}

impl Registers {
    fn from_cursor(cur: &mut Cursor<'_>, len: usize) -> Result<Option<Self>, ProtocolError> {
        let abi = cur.u64()?;

        // PERF_SAMPLE_REGS_USER: https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L7589
        // PERF_SAMPLE_REGS_INTR: https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L7620
        let abi = match abi {
            b::PERF_SAMPLE_REGS_ABI_NONE => return Ok(None),
            b::PERF_SAMPLE_REGS_ABI_32 => Abi::_32,
            b::PERF_SAMPLE_REGS_ABI_64 => Abi::_64,
            _ => return Err(ProtocolError::UnknownAbi(abi)),
        };
        let values = cur.u64s(len)?;

        Ok(Some(Self { abi, values }))
    }
}

/// Counter values read at the time of the sample.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterValues {
    pub time_enabled: Option<u64>,
    pub time_running: Option<u64>,
    /// The sampling event first, group members after it.
    pub values: Vec<CounterValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterValue {
    pub value: u64,
    pub id: Option<u64>,
    pub lost: Option<u64>,
}

impl CounterValues {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L344
    // struct read_format {
    //     {
    //         u64 value;
    //         { u64 time_enabled; } && PERF_FORMAT_TOTAL_TIME_ENABLED
    //         { u64 time_running; } && PERF_FORMAT_TOTAL_TIME_RUNNING
    //         { u64 id;           } && PERF_FORMAT_ID
    //         { u64 lost;         } && PERF_FORMAT_LOST
    //     } && !PERF_FORMAT_GROUP
    //     {
    //         u64 nr;
    //         { u64 time_enabled; } && PERF_FORMAT_TOTAL_TIME_ENABLED
    //         { u64 time_running; } && PERF_FORMAT_TOTAL_TIME_RUNNING
    //         {
    //             u64 value;
    //             { u64 id;   } && PERF_FORMAT_ID
    //             { u64 lost; } && PERF_FORMAT_LOST
    //         } cntr[nr];
    //     } && PERF_FORMAT_GROUP
    // };
    pub(crate) fn from_cursor(cur: &mut Cursor<'_>, read_format: u64) -> Result<Self, ProtocolError> {
        macro_rules! when {
            ($flag:ident) => {
                if read_format & b::$flag > 0 {
                    Some(cur.u64()?)
                } else {
                    None
                }
            };
        }

        if read_format & b::PERF_FORMAT_GROUP == 0 {
            let value = cur.u64()?;
            let time_enabled = when!(PERF_FORMAT_TOTAL_TIME_ENABLED);
            let time_running = when!(PERF_FORMAT_TOTAL_TIME_RUNNING);
            let id = when!(PERF_FORMAT_ID);
            let lost = when!(PERF_FORMAT_LOST);

            Ok(Self {
                time_enabled,
                time_running,
                values: vec![CounterValue { value, id, lost }],
            })
        } else {
            let nr = cur.u64()?;
            let time_enabled = when!(PERF_FORMAT_TOTAL_TIME_ENABLED);
            let time_running = when!(PERF_FORMAT_TOTAL_TIME_RUNNING);

            let mut values = vec![];
            for _ in 0..nr {
                let value = cur.u64()?;
                let id = when!(PERF_FORMAT_ID);
                let lost = when!(PERF_FORMAT_LOST);
                values.push(CounterValue { value, id, lost });
            }

            Ok(Self {
                time_enabled,
                time_running,
                values,
            })
        }
    }
}

#[cfg(test)]
mod test;
