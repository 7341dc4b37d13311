//! Canonical algorithm shapes built on the pipeline core.
//!
//! Two shapes exercise every core component end to end:
//!
//! * [`reduce::TotalReduce`] — three-stage reduction of an array to a
//!   scalar, broadcast into the output buffer.
//! * [`scan::PrefixScan`] — two-pass inclusive prefix sum.
//!
//! Both follow the same lifecycle: construction builds buffers, binding
//! sets, and pipelines once; `seed` uploads inputs through the transfer
//! collaborator; `execute` records a fresh sequence, performs one
//! blocking submit/wait round-trip, and reads the result back.

pub mod kernels;
pub mod reduce;
pub mod scan;

pub use kernels::{ReduceParams, ScanParams, BLOCK_SIZE};
pub use reduce::TotalReduce;
pub use scan::PrefixScan;
