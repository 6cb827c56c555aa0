use super::EventConfig;
use crate::ffi::bindings as b;

/// Kernel software events.
///
/// Useful to sample on machines without a PMU, e.g. virtual machines.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Software {
    CpuClock,
    TaskClock,

    PageFault,
    MinorPageFault,
    MajorPageFault,

    EmuFault,
    AlignFault,

    CtxSwitch,
    CpuMigration,

    Dummy,
}

super::into_event!(Software, value, {
    let config = match value {
        Software::CpuClock => b::PERF_COUNT_SW_CPU_CLOCK,
        Software::TaskClock => b::PERF_COUNT_SW_TASK_CLOCK,

        Software::PageFault => b::PERF_COUNT_SW_PAGE_FAULTS,
        Software::MinorPageFault => b::PERF_COUNT_SW_PAGE_FAULTS_MIN,
        Software::MajorPageFault => b::PERF_COUNT_SW_PAGE_FAULTS_MAJ,

        Software::EmuFault => b::PERF_COUNT_SW_EMULATION_FAULTS,
        Software::AlignFault => b::PERF_COUNT_SW_ALIGNMENT_FAULTS,

        Software::CtxSwitch => b::PERF_COUNT_SW_CONTEXT_SWITCHES,
        Software::CpuMigration => b::PERF_COUNT_SW_CPU_MIGRATIONS,

        Software::Dummy => b::PERF_COUNT_SW_DUMMY,
    };

    Self(EventConfig {
        ty: b::PERF_TYPE_SOFTWARE,
        config: config as _,
        config1: 0,
        config2: 0,
        config3: 0,
    })
});
