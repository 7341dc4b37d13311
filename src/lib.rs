//! # Staged Compute
//!
//! Staged GPU kernel pipeline for multi-pass parallel reductions and
//! scans over device-resident arrays, with explicit cross-pass memory
//! synchronization.
//!
//! ## Design Goals
//! - Fixed stage ordering established at pipeline-construction time
//! - Every cross-stage data dependency expressed as an explicit barrier
//! - One backing device allocation per algorithm instance
//! - Single blocking submit/wait round-trip per execute call
//! - Explicit, deterministic error propagation; fail-fast everywhere
//!
//! ## Layout
//! - [`error`] / [`types`] — the error taxonomy and shared value types
//! - [`gpu`] — the pipeline core: allocator, binding builder, kernel
//!   pipeline builder, stage sequencer, execution engine, and the host
//!   transfer collaborator
//! - [`algo`] — the two canonical shapes (total reduction, inclusive
//!   prefix scan) built on the core

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod algo;
pub mod error;
pub mod gpu;
pub mod types;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use error::{
    AllocationError,
    ComputeError,
    ComputeResult,
    InitError,
    KernelLoadError,
    LayoutMismatchError,
    PipelineCreationError,
    SequenceError,
    TimeoutError,
    TransferError,
};

pub use types::{
    dispatch_groups,
    BufferId,
    BufferRange,
    BufferUsage,
    LayoutId,
};

pub use gpu::alloc::BufferArena;
pub use gpu::binding::{BindingMaker, BindingSet};
pub use gpu::context::{ContextOptions, DeviceCapabilities, GpuContext};
pub use gpu::exec::{submit, ExecutionContext, Pending, DEFAULT_WAIT_TIMEOUT};
pub use gpu::kernel::{create_pipeline, Kernel, KernelLibrary, KernelPipeline, KernelSource};
pub use gpu::sequence::{BarrierPolicy, Hazard, SequenceBuilder, Stage, StageSequence};

pub use algo::{PrefixScan, TotalReduce, BLOCK_SIZE};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used pipeline types.
///
/// Import with:
/// ```rust
/// use staged_compute::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::{PrefixScan, TotalReduce, BLOCK_SIZE};
    pub use crate::error::{ComputeError, ComputeResult};
    pub use crate::types::{dispatch_groups, BufferRange, BufferUsage};
    pub use crate::gpu::context::{ContextOptions, GpuContext};
    pub use crate::gpu::exec::DEFAULT_WAIT_TIMEOUT;
    pub use crate::gpu::sequence::BarrierPolicy;
}
