//! Event descriptors.
//!
//! Symbolic counter names are resolved elsewhere; by the time an event reaches
//! the sampler it is one of these descriptors, usually a [`Raw`][raw::Raw] one
//! carrying the config words of a hardware-specific counter.

pub mod hw;
pub mod raw;
pub mod sw;

/// The event whose overflow triggers a sample.
#[derive(Clone, Debug)]
pub struct Event(pub(crate) EventConfig);

#[derive(Clone, Debug)]
pub(crate) struct EventConfig {
    pub ty: u32,
    pub config: u64,
    pub config1: u64,
    pub config2: u64,
    pub config3: u64,
}

macro_rules! into_event {
    ($ty:ty, $value:ident, $impl: expr) => {
        impl From<&$ty> for crate::event::Event {
            fn from($value: &$ty) -> Self {
                $impl
            }
        }

        impl From<$ty> for crate::event::Event {
            fn from(value: $ty) -> Self {
                (&value).into()
            }
        }
    };
}
use into_event;

#[cfg(test)]
mod test;
