use super::{Opts, SampleOn, Type};
use crate::error::{Error, Result};
use crate::event::EventConfig;
use crate::ffi::{bindings as b, Attr};

/// `read_format` used when [`Type::COUNTER_VALUES`] is requested.
pub(crate) const READ_FORMAT: u64 =
    b::PERF_FORMAT_TOTAL_TIME_ENABLED | b::PERF_FORMAT_TOTAL_TIME_RUNNING | b::PERF_FORMAT_ID;

pub(crate) fn from(event_cfg: &EventConfig, sample_type: Type, opts: &Opts) -> Result<Attr> {
    // Fields of any other bit would shift every field decoded after them.
    if !Type::all().contains(sample_type) {
        return Err(Error::InvalidConfig("sample type has bits that can not be decoded"));
    }
    if sample_type.contains(Type::WEIGHT | Type::WEIGHT_STRUCT) {
        return Err(Error::InvalidConfig(
            "WEIGHT and WEIGHT_STRUCT are mutually exclusive",
        ));
    }
    if sample_type.contains(Type::USER_REGISTERS) && opts.user_regs.is_empty() {
        return Err(Error::InvalidConfig("user register sampling needs a register mask"));
    }
    if sample_type.contains(Type::KERNEL_REGISTERS) && opts.intr_regs.is_empty() {
        return Err(Error::InvalidConfig("kernel register sampling needs a register mask"));
    }

    let mut attr = Attr {
        size: b::PERF_ATTR_SIZE_VER8,
        ..Default::default()
    };

    // event config:

    attr.type_ = event_cfg.ty;
    attr.config = event_cfg.config;
    attr.config1 = event_cfg.config1;
    attr.config2 = event_cfg.config2;
    attr.config3 = event_cfg.config3;

    // count config:

    macro_rules! when {
        ($bool:ident, $flag:ident) => {
            if opts.exclude.$bool {
                attr.flags |= b::$flag;
            }
        };
    }
    when!(user, ATTR_EXCLUDE_USER);
    when!(kernel, ATTR_EXCLUDE_KERNEL);
    when!(hv, ATTR_EXCLUDE_HV);
    when!(host, ATTR_EXCLUDE_HOST);
    when!(guest, ATTR_EXCLUDE_GUEST);
    when!(idle, ATTR_EXCLUDE_IDLE);

    if opts.inherit {
        attr.flags |= b::ATTR_INHERIT;
    }

    // Enabled explicitly by `Sampler::start` once the ring-buffer is mapped.
    attr.flags |= b::ATTR_DISABLED;

    // sample config:

    match opts.sample_on {
        SampleOn::Freq(val) => {
            attr.flags |= b::ATTR_FREQ;
            attr.sample_period_or_freq = val;
        }
        SampleOn::Count(val) => {
            attr.sample_period_or_freq = val;
        }
    }

    attr.flags |= opts.sample_skid.as_precise_ip() << b::ATTR_PRECISE_IP_SHIFT;

    // Lost records carry the sample id trailer, keeps them attributable.
    attr.flags |= b::ATTR_SAMPLE_ID_ALL;

    attr.sample_type = sample_type.kernel_bits();

    if sample_type.contains(Type::COUNTER_VALUES) {
        attr.read_format = READ_FORMAT;
    }
    if sample_type.contains(Type::BRANCHES) {
        attr.branch_sample_type = opts.branch_target.as_branch_sample_type();
    }
    if sample_type.contains(Type::USER_REGISTERS) {
        attr.sample_regs_user = opts.user_regs.0;
    }
    if sample_type.contains(Type::KERNEL_REGISTERS) {
        attr.sample_regs_intr = opts.intr_regs.0;
    }
    if sample_type.contains(Type::CALLCHAIN) {
        attr.sample_max_stack = opts.max_stack;
    }

    Ok(attr)
}

#[cfg(test)]
mod test;
