use super::{Abi, Branch, CounterValue, CounterValues, Registers, Sample, Weight};
use crate::config::{Opts, RegsMask, Type};
use crate::error::ProtocolError;
use crate::ffi::{bindings as b, Cursor};
use crate::sample::record::data_source::DataSource;
use crate::sample::record::Mode;
use crate::sample::testing::{parser, Body};

fn weight_struct(body: Body, var1: u32, var2: u16, var3: u16) -> Body {
    #[cfg(target_endian = "little")]
    return body.u32(var1).u16(var2).u16(var3);
    #[cfg(target_endian = "big")]
    return body.u16(var3).u16(var2).u32(var1);
}

fn parse(ty: Type, opts: &Opts, misc: u16, body: &Body) -> Result<Sample, ProtocolError> {
    let parser = parser(ty, opts);
    Sample::from_cursor(&mut Cursor::new(&body.0), misc, &parser)
}

#[test]
fn test_round_trip() {
    let ty = Type::IDENTIFIER
        | Type::INSTRUCTION_POINTER
        | Type::THREAD_ID
        | Type::TIME
        | Type::LOGICAL_MEM_ADDRESS
        | Type::ID
        | Type::CPU_ID
        | Type::PERIOD
        | Type::COUNTER_VALUES
        | Type::CALLCHAIN
        | Type::BRANCHES
        | Type::USER_REGISTERS
        | Type::WEIGHT_STRUCT
        | Type::DATA_SOURCE
        | Type::KERNEL_REGISTERS
        | Type::PHYSICAL_MEM_ADDRESS
        | Type::PAGE_SIZE
        | Type::MODE;
    let mut opts = Opts::default();
    opts.user_regs = RegsMask(0b1011);
    opts.intr_regs = RegsMask(0b1);

    let data_src = b::PERF_MEM_OP_LOAD | b::PERF_MEM_LVLNUM_L2 << b::PERF_MEM_LVLNUM_SHIFT;

    let body = Body::default()
        .u64(0x11) // sample_id
        .u64(0x401000) // ip
        .u32(100) // pid
        .u32(101) // tid
        .u64(5000) // time
        .u64(0x7fff_0000) // addr
        .u64(9) // id
        .u32(3) // cpu
        .u32(0) // res
        .u64(1000) // period
        .u64(77) // read_format: value
        .u64(10) // time_enabled
        .u64(8) // time_running
        .u64(9) // id
        .u64(2) // callchain
        .u64(0xffff_ffff_8100_0000)
        .u64(0x401000)
        .u64(2) // branches
        .u64(0x10)
        .u64(0x20)
        .u64(b::PERF_BRANCH_MISPRED | 30 << b::PERF_BRANCH_CYCLES_SHIFT)
        .u64(0x30)
        .u64(0x40)
        .u64(b::PERF_BRANCH_PREDICTED | b::PERF_BRANCH_IN_TX | b::PERF_BRANCH_ABORT)
        .u64(b::PERF_SAMPLE_REGS_ABI_64) // user regs
        .u64(1)
        .u64(2)
        .u64(3);
    let body = weight_struct(body, 250, 12, 4)
        .u64(data_src)
        .u64(b::PERF_SAMPLE_REGS_ABI_32) // intr regs
        .u64(0xffff)
        .u64(0x1_0000) // phys_addr
        .u64(4096) // data_page_size
        .u64(2 << 20); // code_page_size

    let misc = b::PERF_RECORD_MISC_KERNEL | b::PERF_RECORD_MISC_EXACT_IP;
    let sample = parse(ty, &opts, misc, &body).unwrap();

    assert_eq!(sample.mode(), Mode::Kernel);
    assert!(sample.exact_ip());
    assert_eq!(sample.present(), ty);
    assert!(sample.has(ty));

    assert_eq!(sample.sample_id(), Some(0x11));
    assert_eq!(sample.instruction_pointer(), Some(0x401000));
    assert_eq!(sample.process_id(), Some(100));
    assert_eq!(sample.thread_id(), Some(101));
    assert_eq!(sample.time(), Some(5000));
    assert_eq!(sample.logical_memory_address(), Some(0x7fff_0000));
    assert_eq!(sample.id(), Some(9));
    assert_eq!(sample.cpu_id(), Some(3));
    assert_eq!(sample.period(), Some(1000));
    assert_eq!(
        sample.counter_values(),
        Some(&CounterValues {
            time_enabled: Some(10),
            time_running: Some(8),
            values: vec![CounterValue {
                value: 77,
                id: Some(9),
                lost: None,
            }],
        })
    );
    assert_eq!(
        sample.callchain(),
        Some([0xffff_ffff_8100_0000, 0x401000].as_slice())
    );

    let branches = sample.branches().unwrap();
    assert_eq!(branches.len(), 2);
    assert_eq!((branches[0].from(), branches[0].to()), (0x10, 0x20));
    assert!(branches[0].mispredicted());
    assert!(!branches[0].predicted());
    assert_eq!(branches[0].cycles(), 30);
    assert!(branches[1].predicted());
    assert!(branches[1].in_transaction());
    assert!(branches[1].transaction_abort());
    assert!(!branches[1].mispredicted());
    assert_eq!(branches[1].cycles(), 0);

    assert_eq!(
        sample.user_registers(),
        Some(&Registers {
            abi: Abi::_64,
            values: vec![1, 2, 3],
        })
    );
    assert_eq!(
        sample.weight(),
        Some(Weight::Vars {
            var1: 250,
            var2: 12,
            var3: 4,
        })
    );
    assert_eq!(sample.data_source(), Some(DataSource::new(data_src)));
    assert!(sample.data_source().unwrap().is_mem_l2());
    assert_eq!(
        sample.kernel_registers(),
        Some(&Registers {
            abi: Abi::_32,
            values: vec![0xffff],
        })
    );
    assert_eq!(sample.physical_memory_address(), Some(0x1_0000));
    assert_eq!(sample.data_page_size(), Some(4096));
    assert_eq!(sample.code_page_size(), Some(2 << 20));
}

#[test]
fn test_unrequested_fields_stay_absent() {
    // Trailing bytes past the requested fields are never interpreted.
    let body = Body::default().u64(5000).u64(0xaaaa).u64(0xbbbb).u64(0xcccc);
    let sample = parse(Type::TIME, &Opts::default(), 0, &body).unwrap();

    assert_eq!(sample.time(), Some(5000));
    assert_eq!(sample.present(), Type::TIME | Type::MODE);
    assert!(!sample.has(Type::LOGICAL_MEM_ADDRESS));
    assert!(!sample.exact_ip());
    assert_eq!(sample.mode(), Mode::Unknown);

    assert_eq!(sample.sample_id(), None);
    assert_eq!(sample.instruction_pointer(), None);
    assert_eq!(sample.process_id(), None);
    assert_eq!(sample.thread_id(), None);
    assert_eq!(sample.logical_memory_address(), None);
    assert_eq!(sample.physical_memory_address(), None);
    assert_eq!(sample.id(), None);
    assert_eq!(sample.cpu_id(), None);
    assert_eq!(sample.period(), None);
    assert_eq!(sample.counter_values(), None);
    assert_eq!(sample.data_source(), None);
    assert_eq!(sample.weight(), None);
    assert_eq!(sample.branches(), None);
    assert_eq!(sample.user_registers(), None);
    assert_eq!(sample.kernel_registers(), None);
    assert_eq!(sample.callchain(), None);
    assert_eq!(sample.data_page_size(), None);
    assert_eq!(sample.code_page_size(), None);
}

#[test]
fn test_full_weight() {
    let body = Body::default().u64(0x1_0000_0010);
    let sample = parse(Type::WEIGHT, &Opts::default(), 0, &body).unwrap();

    let weight = sample.weight().unwrap();
    assert_eq!(weight, Weight::Full(0x1_0000_0010));
    assert_eq!(weight.latency(), 0x10);
    assert_eq!(weight.var2(), None);
    assert_eq!(weight.var3(), None);
    assert!(sample.has(Type::WEIGHT));
    assert!(!sample.has(Type::WEIGHT_STRUCT));
}

#[test]
fn test_weight_vars_with_zeros() {
    let body = weight_struct(Body::default(), 80, 0, 0);
    let sample = parse(Type::WEIGHT_STRUCT, &Opts::default(), 0, &body).unwrap();

    let weight = sample.weight().unwrap();
    assert_eq!(weight.latency(), 80);
    assert_eq!(weight.var2(), Some(0));
    assert_eq!(weight.var3(), Some(0));
}

#[test]
fn test_no_registers_available() {
    let mut opts = Opts::default();
    opts.user_regs = RegsMask(0b111);

    // ABI_NONE carries no register values, the next field follows directly.
    let body = Body::default().u64(b::PERF_SAMPLE_REGS_ABI_NONE).u64(0x42);
    let ty = Type::USER_REGISTERS | Type::DATA_SOURCE;
    let sample = parse(ty, &opts, 0, &body).unwrap();

    assert_eq!(sample.user_registers(), None);
    assert!(!sample.has(Type::USER_REGISTERS));
    assert_eq!(sample.data_source().map(|it| it.bits()), Some(0x42));
}

#[test]
fn test_unknown_abi() {
    let mut opts = Opts::default();
    opts.intr_regs = RegsMask(0b1);

    let body = Body::default().u64(7).u64(0);
    let err = parse(Type::KERNEL_REGISTERS, &opts, 0, &body).unwrap_err();
    assert_eq!(err, ProtocolError::UnknownAbi(7));
}

#[test]
fn test_empty_branch_stack() {
    let body = Body::default().u64(0).u64(5000);
    let ty = Type::BRANCHES | Type::DATA_SOURCE;
    let sample = parse(ty, &Opts::default(), 0, &body).unwrap();
    assert_eq!(sample.branches(), None);
    assert_eq!(sample.data_source().map(|it| it.bits()), Some(5000));
}

#[test]
fn test_short_record() {
    let body = Body::default().u64(5000);
    let ty = Type::TIME | Type::LOGICAL_MEM_ADDRESS;
    let err = parse(ty, &Opts::default(), 0, &body).unwrap_err();
    assert_eq!(
        err,
        ProtocolError::ShortRecord {
            offset: 8,
            want: 8,
            len: 8,
        }
    );
}

#[test]
fn test_bogus_callchain_len() {
    let body = Body::default().u64(u64::MAX).u64(1);
    let err = parse(Type::CALLCHAIN, &Opts::default(), 0, &body).unwrap_err();
    assert!(matches!(err, ProtocolError::ShortRecord { offset: 8, .. }));
}

#[test]
fn test_group_counter_values() {
    let read_format = b::PERF_FORMAT_GROUP | b::PERF_FORMAT_TOTAL_TIME_ENABLED | b::PERF_FORMAT_ID;
    let body = Body::default()
        .u64(2) // nr
        .u64(100) // time_enabled
        .u64(11) // value
        .u64(1) // id
        .u64(22)
        .u64(2);
    let values = CounterValues::from_cursor(&mut Cursor::new(&body.0), read_format).unwrap();
    assert_eq!(
        values,
        CounterValues {
            time_enabled: Some(100),
            time_running: None,
            values: vec![
                CounterValue {
                    value: 11,
                    id: Some(1),
                    lost: None,
                },
                CounterValue {
                    value: 22,
                    id: Some(2),
                    lost: None,
                },
            ],
        }
    );
}

#[test]
fn test_builder_and_late_enrichment() {
    let mut sample = Sample::new(Mode::User);
    assert_eq!(sample.present(), Type::MODE);

    sample.set_time(1);
    sample.set_callchain(vec![0x1]);
    sample.set_branches(vec![Branch::new(0x1, 0x2, 0)]);
    sample.set_counter_values(CounterValues {
        time_enabled: None,
        time_running: None,
        values: vec![],
    });

    sample.callchain_mut().unwrap().push(0x2);
    sample.branches_mut().unwrap().clear();
    sample.counter_values_mut().unwrap().values.push(CounterValue {
        value: 3,
        id: None,
        lost: None,
    });

    assert_eq!(sample.callchain(), Some([0x1, 0x2].as_slice()));
    assert_eq!(sample.branches(), Some([].as_slice()));
    assert_eq!(sample.counter_values().unwrap().values[0].value, 3);
    assert!(sample.has(Type::TIME | Type::CALLCHAIN | Type::BRANCHES | Type::COUNTER_VALUES));
    assert_eq!(sample.user_registers_mut(), None);
}
