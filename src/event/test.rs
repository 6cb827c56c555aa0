use super::hw::{Cache, Hardware, Op, OpResult};
use super::raw::Raw;
use super::sw::Software;
use super::Event;
use crate::ffi::bindings as b;

#[test]
fn test_from_hardware() {
    let Event(cfg) = Hardware::Instr.into();
    assert_eq!(cfg.ty, b::PERF_TYPE_HARDWARE);
    assert_eq!(cfg.config, b::PERF_COUNT_HW_INSTRUCTIONS as u64);
}

#[test]
fn test_from_hardware_cache() {
    let Event(cfg) = Hardware::Cache(Cache::Dtlb, Op::Read, OpResult::Miss).into();
    assert_eq!(cfg.ty, b::PERF_TYPE_HW_CACHE);
    // dtlb | read << 8 | miss << 16
    assert_eq!(cfg.config, 0x1_00_03);
}

#[test]
fn test_from_software() {
    let Event(cfg) = Software::TaskClock.into();
    assert_eq!(cfg.ty, b::PERF_TYPE_SOFTWARE);
    assert_eq!(cfg.config, b::PERF_COUNT_SW_TASK_CLOCK as u64);
}

#[test]
fn test_from_raw() {
    let raw = Raw {
        config: 0x1cd,
        config1: 0x3,
        ..Default::default()
    };
    let Event(cfg) = (&raw).into();
    assert_eq!(cfg.ty, b::PERF_TYPE_RAW);
    assert_eq!((cfg.config, cfg.config1, cfg.config2), (0x1cd, 0x3, 0));
}
