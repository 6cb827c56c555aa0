use super::{from, READ_FORMAT};
use crate::config::{Opts, Priv, RegsMask, SampleOn, SampleSkid, Type};
use crate::error::Error;
use crate::event::raw::Raw;
use crate::event::Event;
use crate::ffi::bindings as b;

fn raw_event() -> Event {
    Raw {
        config: 0x1cd,
        config1: 0x3,
        config2: 0,
        config3: 0,
    }
    .into()
}

#[test]
fn test_memory_sampling_attr() {
    let mut opts = Opts::default();
    opts.sample_on = SampleOn::Count(1000);
    opts.sample_skid = SampleSkid::Zero;

    let ty = Type::TIME | Type::LOGICAL_MEM_ADDRESS | Type::DATA_SOURCE | Type::WEIGHT;
    let attr = from(&raw_event().0, ty, &opts).unwrap();

    assert_eq!(attr.type_, b::PERF_TYPE_RAW);
    assert_eq!(attr.config, 0x1cd);
    assert_eq!(attr.config1, 0x3);
    assert_eq!(attr.size, 136);
    assert_eq!(attr.sample_period_or_freq, 1000);
    assert_eq!(attr.flags & b::ATTR_FREQ, 0);
    assert_eq!((attr.flags >> b::ATTR_PRECISE_IP_SHIFT) & 0b11, 3);
    assert_ne!(attr.flags & b::ATTR_DISABLED, 0);
    assert_ne!(attr.flags & b::ATTR_SAMPLE_ID_ALL, 0);
    assert_eq!(
        attr.sample_type,
        b::PERF_SAMPLE_TIME | b::PERF_SAMPLE_ADDR | b::PERF_SAMPLE_DATA_SRC | b::PERF_SAMPLE_WEIGHT
    );
    assert_eq!(attr.read_format, 0);
    assert_eq!(attr.branch_sample_type, 0);
}

#[test]
fn test_mode_is_not_passed_to_kernel() {
    let attr = from(&raw_event().0, Type::TIME | Type::MODE, &Opts::default()).unwrap();
    assert_eq!(attr.sample_type, b::PERF_SAMPLE_TIME);
}

#[test]
fn test_optional_sections() {
    let mut opts = Opts::default();
    opts.sample_on = SampleOn::Freq(99);
    opts.user_regs = RegsMask(0b111);
    opts.intr_regs = RegsMask(0b1);
    opts.max_stack = 16;
    opts.exclude = Priv {
        kernel: true,
        hv: true,
        ..Default::default()
    };

    let ty = Type::COUNTER_VALUES
        | Type::BRANCHES
        | Type::USER_REGISTERS
        | Type::KERNEL_REGISTERS
        | Type::CALLCHAIN
        | Type::PAGE_SIZE;
    let attr = from(&raw_event().0, ty, &opts).unwrap();

    assert_ne!(attr.flags & b::ATTR_FREQ, 0);
    assert_eq!(attr.sample_period_or_freq, 99);
    assert_ne!(attr.flags & b::ATTR_EXCLUDE_KERNEL, 0);
    assert_ne!(attr.flags & b::ATTR_EXCLUDE_HV, 0);
    assert_eq!(attr.flags & b::ATTR_EXCLUDE_USER, 0);
    assert_eq!(attr.read_format, READ_FORMAT);
    assert_eq!(attr.branch_sample_type, b::PERF_SAMPLE_BRANCH_ANY);
    assert_eq!(attr.sample_regs_user, 0b111);
    assert_eq!(attr.sample_regs_intr, 0b1);
    assert_eq!(attr.sample_max_stack, 16);
    assert_ne!(attr.sample_type & b::PERF_SAMPLE_DATA_PAGE_SIZE, 0);
    assert_ne!(attr.sample_type & b::PERF_SAMPLE_CODE_PAGE_SIZE, 0);
}

#[test]
fn test_reject_both_weight_formats() {
    let ty = Type::WEIGHT | Type::WEIGHT_STRUCT;
    let err = from(&raw_event().0, ty, &Opts::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_reject_empty_regs_mask() {
    let err = from(&raw_event().0, Type::USER_REGISTERS, &Opts::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    let err = from(&raw_event().0, Type::KERNEL_REGISTERS, &Opts::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn test_reject_undecodable_bits() {
    // PERF_SAMPLE_STREAM_ID
    let stream_id = Type::from_bits_retain(1 << 9);
    let ty = Type::ID | stream_id | Type::CPU_ID | Type::PERIOD;
    let err = from(&raw_event().0, ty, &Opts::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    let ty = Type::TIME | Type::from_bits_retain(1 << 62);
    let err = from(&raw_event().0, ty, &Opts::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    // Every named bit is decodable.
    let mut opts = Opts::default();
    opts.user_regs = RegsMask(1);
    opts.intr_regs = RegsMask(1);
    let ty = Type::all().difference(Type::WEIGHT_STRUCT);
    let attr = from(&raw_event().0, ty, &opts).unwrap();
    assert_eq!(attr.sample_type, ty.difference(Type::MODE).bits());
}
