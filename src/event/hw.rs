use super::EventConfig;
use crate::ffi::bindings as b;

/// Generalized hardware events.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hardware {
    CpuCycle,
    BusCycle,
    RefCpuCycle,

    Cache(Cache, Op, OpResult),
    CacheMiss,
    CacheAccess,

    BranchMiss,
    BranchInstr,

    BackendStalledCycle,
    FrontendStalledCycle,

    Instr,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cache {
    L1d,
    L1i,
    Ll,
    Dtlb,
    Itlb,
    Bpu,
    Node,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Op {
    Read,
    Write,
    Prefetch,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpResult {
    Miss,
    Access,
}

super::into_event!(Hardware, value, {
    let hw = |id: u32| (b::PERF_TYPE_HARDWARE, id as u64);
    let (ty, config) = match value {
        Hardware::CpuCycle => hw(b::PERF_COUNT_HW_CPU_CYCLES),
        Hardware::BusCycle => hw(b::PERF_COUNT_HW_BUS_CYCLES),
        Hardware::RefCpuCycle => hw(b::PERF_COUNT_HW_REF_CPU_CYCLES),

        Hardware::Cache(cache, op, result) => {
            let id = match cache {
                Cache::L1d => b::PERF_COUNT_HW_CACHE_L1D,
                Cache::L1i => b::PERF_COUNT_HW_CACHE_L1I,
                Cache::Ll => b::PERF_COUNT_HW_CACHE_LL,
                Cache::Dtlb => b::PERF_COUNT_HW_CACHE_DTLB,
                Cache::Itlb => b::PERF_COUNT_HW_CACHE_ITLB,
                Cache::Bpu => b::PERF_COUNT_HW_CACHE_BPU,
                Cache::Node => b::PERF_COUNT_HW_CACHE_NODE,
            } as u64;
            let op = match op {
                Op::Read => b::PERF_COUNT_HW_CACHE_OP_READ,
                Op::Write => b::PERF_COUNT_HW_CACHE_OP_WRITE,
                Op::Prefetch => b::PERF_COUNT_HW_CACHE_OP_PREFETCH,
            } as u64;
            let op_result = match result {
                OpResult::Miss => b::PERF_COUNT_HW_CACHE_RESULT_MISS,
                OpResult::Access => b::PERF_COUNT_HW_CACHE_RESULT_ACCESS,
            } as u64;
            // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L71
            (b::PERF_TYPE_HW_CACHE, id | (op << 8) | (op_result << 16))
        }
        Hardware::CacheMiss => hw(b::PERF_COUNT_HW_CACHE_MISSES),
        Hardware::CacheAccess => hw(b::PERF_COUNT_HW_CACHE_REFERENCES),

        Hardware::BranchMiss => hw(b::PERF_COUNT_HW_BRANCH_MISSES),
        Hardware::BranchInstr => hw(b::PERF_COUNT_HW_BRANCH_INSTRUCTIONS),

        Hardware::BackendStalledCycle => hw(b::PERF_COUNT_HW_STALLED_CYCLES_BACKEND),
        Hardware::FrontendStalledCycle => hw(b::PERF_COUNT_HW_STALLED_CYCLES_FRONTEND),

        Hardware::Instr => hw(b::PERF_COUNT_HW_INSTRUCTIONS),
    };

    Self(EventConfig {
        ty,
        config,
        config1: 0,
        config2: 0,
        config3: 0,
    })
});
