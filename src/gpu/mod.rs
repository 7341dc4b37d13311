//! # Staged GPU pipeline core
//!
//! This module tree implements the staged kernel pipeline: a fixed,
//! ordered sequence of compute dispatches over a small set of
//! device-resident buffers, with explicit cross-stage memory
//! synchronization and one blocking submit/wait round-trip per execute
//! call.
//!
//! ## Data flow
//!
//! Strictly linear, leaves first:
//!
//! 1. [`alloc`] — creates and binds device memory for the working
//!    buffers (one backing allocation per algorithm instance).
//! 2. [`binding`] — groups buffers into per-stage binding sets against
//!    shared slot layouts.
//! 3. [`kernel`] — turns named kernel source + a binding layout + a
//!    push-constant size into an executable pipeline.
//! 4. [`sequence`] — records (bind, push, dispatch) operations in fixed
//!    order and places the barriers between dependent stages.
//! 5. [`exec`] — submits the recorded sequence and blocks for
//!    completion.
//! 6. [`transfer`] — host collaborator for seeding inputs and reading
//!    results; the core never copies host data itself.
//!
//! ## Concurrency model
//!
//! The host is single-threaded. The device parallelizes freely within a
//! stage and across stages **except** where a barrier orders them —
//! every true data dependency must be recorded as a barrier, never
//! inferred from submission order.
//!
//! ## Resource model
//!
//! All device objects are owned handles released on drop, on every exit
//! path, exactly once. Buffers, binding sets, and pipelines live for
//! the whole algorithm instance; the command sequence and completion
//! signal are recreated per execute call. No ambient globals: every
//! component takes the [`context::GpuContext`] by reference.

pub mod alloc;
pub mod binding;
pub mod context;
pub mod exec;
pub mod kernel;
pub mod sequence;
pub mod transfer;
