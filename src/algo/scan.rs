//! Two-pass inclusive prefix scan of an `f32` array.
//!
//! Stage 1 (`scan_block`) performs a block-local inclusive scan of the
//! input into the block-scan buffer; the last element of each block is
//! the block total. A barrier on the block-scan buffer separates it
//! from stage 2 (`scan_combine`), which adds the totals of all
//! preceding blocks to each element, writing the final scan into the
//! output buffer.
//!
//! Both stages dispatch `ceil(N / BLOCK_SIZE)` invocation groups and
//! carry `{total = N}` as push constants. The two binding sets
//! (input→block_scans, block_scans→output) share one 2-slot layout, so
//! the two pipelines bind the same layout shape with distinct kernels.

use std::mem;

use log::debug;

use crate::algo::kernels::{self, ScanParams, BLOCK_SIZE};
use crate::error::{ComputeResult, LayoutMismatchError};
use crate::types::{dispatch_groups, BufferId, BufferRange, BufferUsage};
use crate::gpu::alloc::BufferArena;
use crate::gpu::binding::{BindingMaker, BindingSet};
use crate::gpu::context::GpuContext;
use crate::gpu::exec::{ExecutionContext, DEFAULT_WAIT_TIMEOUT};
use crate::gpu::kernel::{create_pipeline, KernelPipeline};
use crate::gpu::sequence::{BarrierPolicy, SequenceBuilder, Stage, StageSequence};
use crate::gpu::transfer;

const F32_SIZE: u64 = mem::size_of::<f32>() as u64;

/// Inclusive prefix sum over `N` elements.
#[derive(Debug)]
pub struct PrefixScan {
    length: u32,
    groups: u32,
    arena: BufferArena,
    input: BufferId,
    block_scans: BufferId,
    output: BufferId,
    scan_set: BindingSet,
    combine_set: BindingSet,
    scan_pipeline: KernelPipeline,
    combine_pipeline: KernelPipeline,
}

impl PrefixScan {
    /// Sets up buffers, binding sets, and pipelines for inputs of
    /// `length` elements.
    pub fn new(context: &GpuContext, length: u32) -> ComputeResult<Self> {
        let groups = dispatch_groups(length, BLOCK_SIZE);
        let bytes = u64::from(length) * F32_SIZE;

        let mut arena = BufferArena::new();
        let input = arena.request("scan.input", bytes, BufferUsage::Source)?;
        let block_scans = arena.request("scan.block_scans", bytes, BufferUsage::Scratch)?;
        let output = arena.request("scan.output", bytes, BufferUsage::Target)?;
        arena.allocate_and_bind(context, 0)?;

        let mut bindings = BindingMaker::new();

        bindings.begin(wgpu::ShaderStages::COMPUTE)?;
        bindings.bind_buffer(0, input)?;
        bindings.bind_buffer(1, block_scans)?;
        let (scan_set, layout) = bindings.end(context, &arena)?;

        bindings.begin(wgpu::ShaderStages::COMPUTE)?;
        bindings.bind_buffer(0, block_scans)?;
        bindings.bind_buffer(1, output)?;
        let combine_set = bindings.end_with_layout(context, &arena, layout)?;

        let library = kernels::library();
        let scan_kernel = library.load(context, "scan_block")?;
        let combine_kernel = library.load(context, "scan_combine")?;

        let bgl = bindings
            .layout(layout)
            .ok_or(LayoutMismatchError::UnknownLayout { layout })?;
        let push_size = mem::size_of::<ScanParams>() as u32;
        let scan_pipeline = create_pipeline(context, &scan_kernel, bgl, push_size)?;
        let combine_pipeline = create_pipeline(context, &combine_kernel, bgl, push_size)?;

        debug!("scan setup: {} elements, {} groups", length, groups);

        Ok(Self {
            length,
            groups,
            arena,
            input,
            block_scans,
            output,
            scan_set,
            combine_set,
            scan_pipeline,
            combine_pipeline,
        })
    }

    /// Number of input elements.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Number of invocation groups each stage dispatches.
    #[inline]
    pub fn groups(&self) -> u32 {
        self.groups
    }

    /// Seeds the input buffer from the host.
    pub fn seed(&self, context: &GpuContext, values: &[f32]) -> ComputeResult<()> {
        transfer::update_slice(context, &self.arena, self.input, 0, values)
    }

    /// Records the two-stage sequence under the given barrier policy.
    pub fn build_sequence(&self, policy: BarrierPolicy) -> ComputeResult<StageSequence> {
        let bytes = u64::from(self.length) * F32_SIZE;
        let input_range = BufferRange::whole(self.input, bytes);
        let scans_range = BufferRange::whole(self.block_scans, bytes);
        let output_range = BufferRange::whole(self.output, bytes);

        let push = ScanParams { total: self.length };

        let mut builder = SequenceBuilder::new();

        builder.stage(
            Stage::new("scan.block", &self.scan_pipeline, &self.scan_set, self.groups)
                .with_push(bytemuck::bytes_of(&push))
                .reads(input_range)
                .writes(scans_range),
        );

        builder.stage(
            Stage::new("scan.combine", &self.combine_pipeline, &self.combine_set, self.groups)
                .with_push(bytemuck::bytes_of(&push))
                .reads(scans_range)
                .writes(output_range),
        );

        Ok(builder.build(policy)?)
    }

    /// Runs the scan and returns the inclusive prefix sums.
    pub fn execute(&self, context: &GpuContext) -> ComputeResult<Vec<f32>> {
        self.execute_with(context, BarrierPolicy::Automatic)
    }

    /// Runs the scan under an explicit barrier policy.
    pub fn execute_with(
        &self,
        context: &GpuContext,
        policy: BarrierPolicy,
    ) -> ComputeResult<Vec<f32>> {
        let sequence = self.build_sequence(policy)?;
        ExecutionContext::record(context, &sequence).run(context, DEFAULT_WAIT_TIMEOUT)?;
        self.read_output(context)
    }

    /// Reads back the output buffer.
    pub fn read_output(&self, context: &GpuContext) -> ComputeResult<Vec<f32>> {
        transfer::read_slice(context, &self.arena, self.output, 0, self.length as usize)
    }
}
