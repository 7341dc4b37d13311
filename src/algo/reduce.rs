//! Two-level reduction of an `f32` array to a scalar.
//!
//! Three stages over three buffers:
//!
//! 1. `block_sums` — each of `ceil(N / BLOCK_SIZE)` groups writes its
//!    partial sum into slot `g` of the fixed-capacity group-sum buffer
//!    (push constants `{total = N, depth = 0}`).
//! 2. `combine` — a single group reduces the group sums in place,
//!    leaving the total in element 0 (push constants
//!    `{total = groupCount, depth = 1}`).
//! 3. `broadcast` — a different kernel writes the scalar to every
//!    output element (push constants `{total = N}`).
//!
//! Barriers guard the group-sum buffer between stages 1→2 and 2→3.
//!
//! ## Capacity limitation
//!
//! The group-sum buffer holds exactly `BLOCK_SIZE` slots and is not
//! itself recursively reduced, so the shape is only exact while
//! `groupCount <= BLOCK_SIZE` (N up to `BLOCK_SIZE²`). Construction
//! fails with [`SequenceError::GroupCapacityExceeded`] beyond that
//! boundary rather than returning a silently wrong sum.

use std::mem;

use log::debug;

use crate::algo::kernels::{self, ReduceParams, ScanParams, BLOCK_SIZE};
use crate::error::{ComputeResult, LayoutMismatchError, SequenceError};
use crate::types::{dispatch_groups, BufferId, BufferRange, BufferUsage};
use crate::gpu::alloc::BufferArena;
use crate::gpu::binding::{BindingMaker, BindingSet};
use crate::gpu::context::GpuContext;
use crate::gpu::exec::{ExecutionContext, DEFAULT_WAIT_TIMEOUT};
use crate::gpu::kernel::{create_pipeline, KernelPipeline};
use crate::gpu::sequence::{BarrierPolicy, SequenceBuilder, Stage, StageSequence};
use crate::gpu::transfer;

const F32_SIZE: u64 = mem::size_of::<f32>() as u64;

/// Reduction of an `N`-element array to one scalar, broadcast into the
/// output buffer.
///
/// Buffers, binding sets, and pipelines are created once here and
/// released in reverse construction order on drop; each
/// [`execute`](TotalReduce::execute) records and submits a fresh
/// command sequence.
#[derive(Debug)]
pub struct TotalReduce {
    length: u32,
    groups: u32,
    arena: BufferArena,
    input: BufferId,
    group_sums: BufferId,
    output: BufferId,
    sum_set: BindingSet,
    group_set: BindingSet,
    final_set: BindingSet,
    sum_pipeline: KernelPipeline,
    final_pipeline: KernelPipeline,
}

impl TotalReduce {
    /// Sets up buffers, binding sets, and pipelines for inputs of
    /// `length` elements.
    ///
    /// ## Errors
    /// * [`SequenceError::GroupCapacityExceeded`] — `length` needs more
    ///   groups than the group-sum buffer holds.
    /// * Allocation, layout, kernel, and pipeline failures propagate
    ///   fail-fast.
    pub fn new(context: &GpuContext, length: u32) -> ComputeResult<Self> {
        let groups = dispatch_groups(length, BLOCK_SIZE);
        if groups > BLOCK_SIZE {
            return Err(SequenceError::GroupCapacityExceeded {
                groups,
                capacity: BLOCK_SIZE,
            }
            .into());
        }

        let mut arena = BufferArena::new();
        let input = arena.request("reduce.input", u64::from(length) * F32_SIZE, BufferUsage::Source)?;
        let group_sums = arena.request(
            "reduce.group_sums",
            u64::from(BLOCK_SIZE) * F32_SIZE,
            BufferUsage::Scratch,
        )?;
        let output = arena.request("reduce.output", u64::from(length) * F32_SIZE, BufferUsage::Target)?;
        arena.allocate_and_bind(context, 0)?;

        let mut bindings = BindingMaker::new();

        bindings.begin(wgpu::ShaderStages::COMPUTE)?;
        bindings.bind_buffer(0, input)?;
        bindings.bind_buffer(1, group_sums)?;
        bindings.bind_buffer(2, output)?;
        let (sum_set, sum_layout) = bindings.end(context, &arena)?;

        bindings.begin(wgpu::ShaderStages::COMPUTE)?;
        bindings.bind_buffer(0, group_sums)?;
        bindings.bind_buffer(1, group_sums)?;
        bindings.bind_buffer(2, group_sums)?;
        let group_set = bindings.end_with_layout(context, &arena, sum_layout)?;

        bindings.begin(wgpu::ShaderStages::COMPUTE)?;
        bindings.bind_buffer(0, group_sums)?;
        bindings.bind_buffer(1, output)?;
        let (final_set, final_layout) = bindings.end(context, &arena)?;

        let library = kernels::library();
        let sum_kernel = library.load(context, "reduce_block_sum")?;
        let final_kernel = library.load(context, "reduce_broadcast")?;

        let sum_bgl = bindings
            .layout(sum_layout)
            .ok_or(LayoutMismatchError::UnknownLayout { layout: sum_layout })?;
        let sum_pipeline = create_pipeline(
            context,
            &sum_kernel,
            sum_bgl,
            mem::size_of::<ReduceParams>() as u32,
        )?;

        let final_bgl = bindings
            .layout(final_layout)
            .ok_or(LayoutMismatchError::UnknownLayout { layout: final_layout })?;
        let final_pipeline = create_pipeline(
            context,
            &final_kernel,
            final_bgl,
            mem::size_of::<ScanParams>() as u32,
        )?;

        debug!("reduce setup: {} elements, {} groups", length, groups);

        Ok(Self {
            length,
            groups,
            arena,
            input,
            group_sums,
            output,
            sum_set,
            group_set,
            final_set,
            sum_pipeline,
            final_pipeline,
        })
    }

    /// Number of input elements.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Number of invocation groups the per-element stages dispatch.
    #[inline]
    pub fn groups(&self) -> u32 {
        self.groups
    }

    /// Seeds the input buffer from the host.
    pub fn seed(&self, context: &GpuContext, values: &[f32]) -> ComputeResult<()> {
        transfer::update_slice(context, &self.arena, self.input, 0, values)
    }

    /// Records the three-stage sequence under the given barrier policy.
    ///
    /// `Automatic` yields the correct sequence (barriers on the
    /// group-sum buffer between stages 1→2 and 2→3); `AsRecorded`
    /// yields the same stages with no barriers, which
    /// [`StageSequence::unsynchronized_hazards`] reports as racy.
    pub fn build_sequence(&self, policy: BarrierPolicy) -> ComputeResult<StageSequence> {
        let input_range = BufferRange::whole(self.input, u64::from(self.length) * F32_SIZE);
        let output_range = BufferRange::whole(self.output, u64::from(self.length) * F32_SIZE);
        let partials_range = BufferRange {
            buffer: self.group_sums,
            offset: 0,
            size: u64::from(self.groups) * F32_SIZE,
        };
        let scalar_range = BufferRange {
            buffer: self.group_sums,
            offset: 0,
            size: F32_SIZE,
        };

        let mut builder = SequenceBuilder::new();

        builder.stage(
            Stage::new("reduce.block_sums", &self.sum_pipeline, &self.sum_set, self.groups)
                .with_push(bytemuck::bytes_of(&ReduceParams {
                    total: self.length,
                    depth: 0,
                }))
                .reads(input_range)
                .writes(partials_range),
        );

        builder.stage(
            Stage::new("reduce.combine", &self.sum_pipeline, &self.group_set, 1)
                .with_push(bytemuck::bytes_of(&ReduceParams {
                    total: self.groups,
                    depth: 1,
                }))
                .reads(partials_range)
                .writes(scalar_range),
        );

        builder.stage(
            Stage::new("reduce.broadcast", &self.final_pipeline, &self.final_set, self.groups)
                .with_push(bytemuck::bytes_of(&ScanParams { total: self.length }))
                .reads(scalar_range)
                .writes(output_range),
        );

        Ok(builder.build(policy)?)
    }

    /// Runs the reduction and returns the scalar total.
    pub fn execute(&self, context: &GpuContext) -> ComputeResult<f32> {
        self.execute_with(context, BarrierPolicy::Automatic)
    }

    /// Runs the reduction under an explicit barrier policy.
    pub fn execute_with(&self, context: &GpuContext, policy: BarrierPolicy) -> ComputeResult<f32> {
        let sequence = self.build_sequence(policy)?;
        ExecutionContext::record(context, &sequence).run(context, DEFAULT_WAIT_TIMEOUT)?;

        let scalar: Vec<f32> = transfer::read_slice(context, &self.arena, self.output, 0, 1)?;
        Ok(scalar[0])
    }

    /// Reads back the whole output buffer (every element carries the
    /// broadcast total).
    pub fn read_output(&self, context: &GpuContext) -> ComputeResult<Vec<f32>> {
        transfer::read_slice(context, &self.arena, self.output, 0, self.length as usize)
    }
}
