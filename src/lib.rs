//! Hardware performance-monitoring sampling on top of the `perf_event_open`
//! system call.
//!
//! A [`Sampler`][sample::Sampler] opens one sampling event, maps its
//! ring-buffer and decodes every `PERF_RECORD_SAMPLE` the kernel writes into
//! a [`Sample`][sample::record::sample::Sample], keeping only the fields
//! selected by the sample [`Type`][config::Type].
//!
//! ## Example
//!
//! Sample the data address and memory-hierarchy information of loads
//! retired by the current process.
//!
//! ```rust,no_run
//! use perf_sampler::config::{Opts, SampleOn, Target, Type};
//! use perf_sampler::event::raw::Raw;
//! use perf_sampler::sample::Sampler;
//!
//! // `MEM_INST_RETIRED.ALL_LOADS` on recent Intel cores.
//! let event = Raw { config: 0x81d0, ..Default::default() };
//! let ty = Type::TIME | Type::LOGICAL_MEM_ADDRESS | Type::DATA_SOURCE | Type::WEIGHT;
//!
//! let mut opts = Opts::default();
//! opts.sample_on = SampleOn::Count(1000);
//!
//! let mut sampler = Sampler::new(event, Target::default(), ty, opts);
//! sampler.start().unwrap();
//! let v: Vec<u64> = (0..1 << 20).collect();
//! std::hint::black_box(v.iter().sum::<u64>());
//! sampler.stop().unwrap();
//!
//! for sample in sampler.result().unwrap() {
//!     let ds = sample.data_source().unwrap();
//!     println!(
//!         "{:#x} l1 hit: {} latency: {:?}",
//!         sample.logical_memory_address().unwrap(),
//!         ds.is_mem_l1() && ds.is_mem_hit(),
//!         sample.weight().map(|w| w.latency()),
//!     );
//! }
//! let samples = sampler.close().unwrap();
//! println!("{} samples, {} lost", samples.len(), samples.lost());
//! ```
//!
//! ## Kernel compatibility
//!
//! Any Linux kernel since 4.0 opens a sampler. Some sample fields need newer
//! kernels: `DATA_PAGE_SIZE` and `CODE_PAGE_SIZE` need 5.11,
//! `WEIGHT_STRUCT` needs 5.12. Asking an older kernel for them fails the
//! [`start`][sample::Sampler::start] with [`Error::Open`][error::Error::Open].

pub mod config;
pub mod error;
pub mod event;
mod ffi;
pub mod sample;
