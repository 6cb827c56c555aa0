#![allow(non_camel_case_types)]

// Subset of `include/uapi/linux/perf_event.h` used by this crate.
// https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h

// enum perf_type_id
pub const PERF_TYPE_HARDWARE: u32 = 0;
pub const PERF_TYPE_SOFTWARE: u32 = 1;
pub const PERF_TYPE_HW_CACHE: u32 = 3;
pub const PERF_TYPE_RAW: u32 = 4;

// enum perf_hw_id
pub const PERF_COUNT_HW_CPU_CYCLES: u32 = 0;
pub const PERF_COUNT_HW_INSTRUCTIONS: u32 = 1;
pub const PERF_COUNT_HW_CACHE_REFERENCES: u32 = 2;
pub const PERF_COUNT_HW_CACHE_MISSES: u32 = 3;
pub const PERF_COUNT_HW_BRANCH_INSTRUCTIONS: u32 = 4;
pub const PERF_COUNT_HW_BRANCH_MISSES: u32 = 5;
pub const PERF_COUNT_HW_BUS_CYCLES: u32 = 6;
pub const PERF_COUNT_HW_STALLED_CYCLES_FRONTEND: u32 = 7;
pub const PERF_COUNT_HW_STALLED_CYCLES_BACKEND: u32 = 8;
pub const PERF_COUNT_HW_REF_CPU_CYCLES: u32 = 9;

// enum perf_hw_cache_id
pub const PERF_COUNT_HW_CACHE_L1D: u32 = 0;
pub const PERF_COUNT_HW_CACHE_L1I: u32 = 1;
pub const PERF_COUNT_HW_CACHE_LL: u32 = 2;
pub const PERF_COUNT_HW_CACHE_DTLB: u32 = 3;
pub const PERF_COUNT_HW_CACHE_ITLB: u32 = 4;
pub const PERF_COUNT_HW_CACHE_BPU: u32 = 5;
pub const PERF_COUNT_HW_CACHE_NODE: u32 = 6;

// enum perf_hw_cache_op_id
pub const PERF_COUNT_HW_CACHE_OP_READ: u32 = 0;
pub const PERF_COUNT_HW_CACHE_OP_WRITE: u32 = 1;
pub const PERF_COUNT_HW_CACHE_OP_PREFETCH: u32 = 2;

// enum perf_hw_cache_op_result_id
pub const PERF_COUNT_HW_CACHE_RESULT_ACCESS: u32 = 0;
pub const PERF_COUNT_HW_CACHE_RESULT_MISS: u32 = 1;

// enum perf_sw_ids
pub const PERF_COUNT_SW_CPU_CLOCK: u32 = 0;
pub const PERF_COUNT_SW_TASK_CLOCK: u32 = 1;
pub const PERF_COUNT_SW_PAGE_FAULTS: u32 = 2;
pub const PERF_COUNT_SW_CONTEXT_SWITCHES: u32 = 3;
pub const PERF_COUNT_SW_CPU_MIGRATIONS: u32 = 4;
pub const PERF_COUNT_SW_PAGE_FAULTS_MIN: u32 = 5;
pub const PERF_COUNT_SW_PAGE_FAULTS_MAJ: u32 = 6;
pub const PERF_COUNT_SW_ALIGNMENT_FAULTS: u32 = 7;
pub const PERF_COUNT_SW_EMULATION_FAULTS: u32 = 8;
pub const PERF_COUNT_SW_DUMMY: u32 = 9;

// enum perf_event_sample_format
pub const PERF_SAMPLE_IP: u64 = 1 << 0;
pub const PERF_SAMPLE_TID: u64 = 1 << 1;
pub const PERF_SAMPLE_TIME: u64 = 1 << 2;
pub const PERF_SAMPLE_ADDR: u64 = 1 << 3;
pub const PERF_SAMPLE_READ: u64 = 1 << 4;
pub const PERF_SAMPLE_CALLCHAIN: u64 = 1 << 5;
pub const PERF_SAMPLE_ID: u64 = 1 << 6;
pub const PERF_SAMPLE_CPU: u64 = 1 << 7;
pub const PERF_SAMPLE_PERIOD: u64 = 1 << 8;
pub const PERF_SAMPLE_STREAM_ID: u64 = 1 << 9;
pub const PERF_SAMPLE_RAW: u64 = 1 << 10;
pub const PERF_SAMPLE_BRANCH_STACK: u64 = 1 << 11;
pub const PERF_SAMPLE_REGS_USER: u64 = 1 << 12;
pub const PERF_SAMPLE_STACK_USER: u64 = 1 << 13;
pub const PERF_SAMPLE_WEIGHT: u64 = 1 << 14;
pub const PERF_SAMPLE_DATA_SRC: u64 = 1 << 15;
pub const PERF_SAMPLE_IDENTIFIER: u64 = 1 << 16;
pub const PERF_SAMPLE_TRANSACTION: u64 = 1 << 17;
pub const PERF_SAMPLE_REGS_INTR: u64 = 1 << 18;
pub const PERF_SAMPLE_PHYS_ADDR: u64 = 1 << 19;
pub const PERF_SAMPLE_CGROUP: u64 = 1 << 21;
pub const PERF_SAMPLE_DATA_PAGE_SIZE: u64 = 1 << 22;
pub const PERF_SAMPLE_CODE_PAGE_SIZE: u64 = 1 << 23;
pub const PERF_SAMPLE_WEIGHT_STRUCT: u64 = 1 << 24;

// enum perf_branch_sample_type
pub const PERF_SAMPLE_BRANCH_USER: u64 = 1 << 0;
pub const PERF_SAMPLE_BRANCH_KERNEL: u64 = 1 << 1;
pub const PERF_SAMPLE_BRANCH_HV: u64 = 1 << 2;
pub const PERF_SAMPLE_BRANCH_ANY: u64 = 1 << 3;
pub const PERF_SAMPLE_BRANCH_HW_INDEX: u64 = 1 << 17;

// enum perf_sample_regs_abi
pub const PERF_SAMPLE_REGS_ABI_NONE: u64 = 0;
pub const PERF_SAMPLE_REGS_ABI_32: u64 = 1;
pub const PERF_SAMPLE_REGS_ABI_64: u64 = 2;

// enum perf_event_read_format
pub const PERF_FORMAT_TOTAL_TIME_ENABLED: u64 = 1 << 0;
pub const PERF_FORMAT_TOTAL_TIME_RUNNING: u64 = 1 << 1;
pub const PERF_FORMAT_ID: u64 = 1 << 2;
pub const PERF_FORMAT_GROUP: u64 = 1 << 3;
pub const PERF_FORMAT_LOST: u64 = 1 << 4;

// enum perf_event_type
#[cfg(test)]
pub const PERF_RECORD_MMAP: u32 = 1;
pub const PERF_RECORD_LOST: u32 = 2;
#[cfg(test)]
pub const PERF_RECORD_COMM: u32 = 3;
pub const PERF_RECORD_THROTTLE: u32 = 5;
pub const PERF_RECORD_UNTHROTTLE: u32 = 6;
pub const PERF_RECORD_SAMPLE: u32 = 9;
pub const PERF_RECORD_LOST_SAMPLES: u32 = 13;

// perf_event_header::misc
pub const PERF_RECORD_MISC_CPUMODE_MASK: u16 = 7;
#[cfg(test)]
pub const PERF_RECORD_MISC_CPUMODE_UNKNOWN: u16 = 0;
pub const PERF_RECORD_MISC_KERNEL: u16 = 1;
pub const PERF_RECORD_MISC_USER: u16 = 2;
pub const PERF_RECORD_MISC_HYPERVISOR: u16 = 3;
pub const PERF_RECORD_MISC_GUEST_KERNEL: u16 = 4;
pub const PERF_RECORD_MISC_GUEST_USER: u16 = 5;
pub const PERF_RECORD_MISC_EXACT_IP: u16 = 1 << 14;

// perf_mem_data_src
pub const PERF_MEM_OP_NA: u64 = 0x01;
pub const PERF_MEM_OP_LOAD: u64 = 0x02;
pub const PERF_MEM_OP_STORE: u64 = 0x04;
pub const PERF_MEM_OP_PFETCH: u64 = 0x08;
pub const PERF_MEM_OP_EXEC: u64 = 0x10;
pub const PERF_MEM_OP_SHIFT: u64 = 0;

pub const PERF_MEM_LVL_HIT: u64 = 0x02;
pub const PERF_MEM_LVL_MISS: u64 = 0x04;
#[cfg(test)]
pub const PERF_MEM_LVL_L2: u64 = 0x20;
pub const PERF_MEM_LVL_REM_CCE1: u64 = 0x400;
pub const PERF_MEM_LVL_REM_CCE2: u64 = 0x800;
pub const PERF_MEM_LVL_SHIFT: u64 = 5;

pub const PERF_MEM_REMOTE_REMOTE: u64 = 0x01;
pub const PERF_MEM_REMOTE_SHIFT: u64 = 37;

pub const PERF_MEM_LVLNUM_L1: u64 = 0x01;
pub const PERF_MEM_LVLNUM_L2: u64 = 0x02;
pub const PERF_MEM_LVLNUM_L3: u64 = 0x03;
pub const PERF_MEM_LVLNUM_L4: u64 = 0x04;
pub const PERF_MEM_LVLNUM_CXL: u64 = 0x09;
pub const PERF_MEM_LVLNUM_IO: u64 = 0x0a;
pub const PERF_MEM_LVLNUM_ANY_CACHE: u64 = 0x0b;
pub const PERF_MEM_LVLNUM_LFB: u64 = 0x0c;
pub const PERF_MEM_LVLNUM_RAM: u64 = 0x0d;
pub const PERF_MEM_LVLNUM_PMEM: u64 = 0x0e;
pub const PERF_MEM_LVLNUM_SHIFT: u64 = 33;

pub const PERF_MEM_SNOOP_NA: u64 = 0x01;
pub const PERF_MEM_SNOOP_NONE: u64 = 0x02;
pub const PERF_MEM_SNOOP_HIT: u64 = 0x04;
pub const PERF_MEM_SNOOP_MISS: u64 = 0x08;
pub const PERF_MEM_SNOOP_HITM: u64 = 0x10;
pub const PERF_MEM_SNOOP_SHIFT: u64 = 19;

pub const PERF_MEM_SNOOPX_FWD: u64 = 0x01;
pub const PERF_MEM_SNOOPX_PEER: u64 = 0x02;
pub const PERF_MEM_SNOOPX_SHIFT: u64 = 38;

pub const PERF_MEM_LOCK_NA: u64 = 0x01;
pub const PERF_MEM_LOCK_LOCKED: u64 = 0x02;
pub const PERF_MEM_LOCK_SHIFT: u64 = 24;

pub const PERF_MEM_TLB_NA: u64 = 0x01;
pub const PERF_MEM_TLB_HIT: u64 = 0x02;
pub const PERF_MEM_TLB_MISS: u64 = 0x04;
pub const PERF_MEM_TLB_L1: u64 = 0x08;
pub const PERF_MEM_TLB_L2: u64 = 0x10;
pub const PERF_MEM_TLB_WK: u64 = 0x20;
pub const PERF_MEM_TLB_OS: u64 = 0x40;
pub const PERF_MEM_TLB_SHIFT: u64 = 26;

pub const PERF_MEM_BLK_NA: u64 = 0x01;
pub const PERF_MEM_BLK_DATA: u64 = 0x02;
pub const PERF_MEM_BLK_ADDR: u64 = 0x04;
pub const PERF_MEM_BLK_SHIFT: u64 = 40;

pub const PERF_MEM_HOPS_0: u64 = 0x01;
pub const PERF_MEM_HOPS_1: u64 = 0x02;
pub const PERF_MEM_HOPS_2: u64 = 0x03;
pub const PERF_MEM_HOPS_3: u64 = 0x04;
pub const PERF_MEM_HOPS_SHIFT: u64 = 43;

// perf_branch_entry flags word
pub const PERF_BRANCH_MISPRED: u64 = 1 << 0;
pub const PERF_BRANCH_PREDICTED: u64 = 1 << 1;
pub const PERF_BRANCH_IN_TX: u64 = 1 << 2;
pub const PERF_BRANCH_ABORT: u64 = 1 << 3;
pub const PERF_BRANCH_CYCLES_SHIFT: u64 = 4;
pub const PERF_BRANCH_CYCLES_MASK: u64 = 0xffff;

pub const PERF_FLAG_FD_CLOEXEC: u64 = 1 << 3;

// _IO('$', n)
pub const PERF_IOC_OP_ENABLE: u64 = 0x2400;
pub const PERF_IOC_OP_DISABLE: u64 = 0x2401;

// perf_event_attr bitfield word, bit positions.
pub const ATTR_DISABLED: u64 = 1 << 0;
pub const ATTR_INHERIT: u64 = 1 << 1;
pub const ATTR_EXCLUDE_USER: u64 = 1 << 4;
pub const ATTR_EXCLUDE_KERNEL: u64 = 1 << 5;
pub const ATTR_EXCLUDE_HV: u64 = 1 << 6;
pub const ATTR_EXCLUDE_IDLE: u64 = 1 << 7;
pub const ATTR_FREQ: u64 = 1 << 10;
pub const ATTR_PRECISE_IP_SHIFT: u64 = 15;
pub const ATTR_SAMPLE_ID_ALL: u64 = 1 << 18;
pub const ATTR_EXCLUDE_HOST: u64 = 1 << 19;
pub const ATTR_EXCLUDE_GUEST: u64 = 1 << 20;

pub const PERF_ATTR_SIZE_VER8: u32 = 136;

// Read by the kernel, most fields are never touched on our side.
#[allow(dead_code)]
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct perf_event_attr {
    pub type_: u32,
    pub size: u32,
    pub config: u64,
    // union { sample_period, sample_freq }
    pub sample_period_or_freq: u64,
    pub sample_type: u64,
    pub read_format: u64,
    // disabled:1, inherit:1, pinned:1, ...
    pub flags: u64,
    // union { wakeup_events, wakeup_watermark }
    pub wakeup_events: u32,
    pub bp_type: u32,
    // union { bp_addr, kprobe_func, uprobe_path, config1 }
    pub config1: u64,
    // union { bp_len, kprobe_addr, probe_offset, config2 }
    pub config2: u64,
    pub branch_sample_type: u64,
    pub sample_regs_user: u64,
    pub sample_stack_user: u32,
    pub clockid: i32,
    pub sample_regs_intr: u64,
    pub aux_watermark: u32,
    pub sample_max_stack: u16,
    pub __reserved_2: u16,
    pub aux_sample_size: u32,
    pub __reserved_3: u32,
    pub sig_data: u64,
    pub config3: u64,
}

// Only ever accessed through the mapped pointer.
#[allow(dead_code)]
#[repr(C)]
pub struct perf_event_mmap_page {
    pub version: u32,
    pub compat_version: u32,
    pub lock: u32,
    pub index: u32,
    pub offset: i64,
    pub time_enabled: u64,
    pub time_running: u64,
    pub capabilities: u64,
    pub pmc_width: u16,
    pub time_shift: u16,
    pub time_mult: u32,
    pub time_offset: u64,
    pub time_zero: u64,
    pub size: u32,
    pub __reserved_1: u32,
    pub time_cycles: u64,
    pub time_mask: u64,
    pub __reserved: [u8; 116 * 8],
    pub data_head: u64,
    pub data_tail: u64,
    pub data_offset: u64,
    pub data_size: u64,
    pub aux_head: u64,
    pub aux_tail: u64,
    pub aux_offset: u64,
    pub aux_size: u64,
}

const _: () = assert!(size_of::<perf_event_attr>() == PERF_ATTR_SIZE_VER8 as usize);
const _: () = assert!(std::mem::offset_of!(perf_event_mmap_page, data_head) == 1024);
