//! Stage sequencer.
//!
//! The sequencer turns an ordered list of kernel invocations into a
//! single recorded command sequence, inserting the memory barriers that
//! make cross-stage write→read dependencies visible. It is the only
//! place where stage ordering, data-dependency tracking, and command
//! encoding intersect.
//!
//! ## Execution model
//! The device executes invocation groups within a stage in parallel
//! with no ordering guarantee among them, and is free to reorder or
//! overlap whole stages that have no barrier between them. Submission
//! order alone guarantees nothing: **every true data dependency must be
//! expressed as a barrier**. A missing barrier is a race with an
//! undefined result.
//!
//! ## Recording protocol
//! ```ignore
//! let mut builder = SequenceBuilder::new();
//! builder.stage(partial_sums);          // writes group_sums
//! builder.stage(combine);               // reads group_sums
//! let sequence = builder.build(BarrierPolicy::Automatic)?;
//! assert!(sequence.unsynchronized_hazards().is_empty());
//! ```
//!
//! `BarrierPolicy::Automatic` inserts the minimum correct barrier set
//! derived from each stage's declared read/write ranges.
//! `BarrierPolicy::AsRecorded` keeps exactly the manually recorded
//! barriers; [`StageSequence::unsynchronized_hazards`] then reports any
//! write→read edge left uncovered, which is how the barrier-omission
//! defect is made observable on the host.
//!
//! ## Encoding
//! Stages between two barriers share one compute pass; every barrier
//! ends the current pass and opens the next. Pass boundaries are where
//! the backend orders execution and flushes visibility, so the encoded
//! command buffer realizes exactly the recorded dependency structure.

use log::{debug, trace};

use crate::error::SequenceError;
use crate::types::{BufferId, BufferRange, StageIndex};
use crate::gpu::binding::BindingSet;
use crate::gpu::context::GpuContext;
use crate::gpu::kernel::KernelPipeline;

/// How `build` treats barriers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarrierPolicy {
    /// Derive the minimum barrier set from declared stage accesses,
    /// keeping any manually recorded barriers.
    Automatic,

    /// Keep exactly the barriers recorded by the caller.
    AsRecorded,
}

/// One kernel invocation: pipeline, binding set, push-constant payload,
/// dispatch extent, and declared buffer accesses.
///
/// Declared `reads`/`writes` drive barrier insertion and hazard
/// detection; a stage that touches a range it did not declare defeats
/// both.
#[derive(Debug)]
pub struct Stage {
    label: &'static str,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    push: Vec<u8>,
    groups: u32,
    reads: Vec<BufferRange>,
    writes: Vec<BufferRange>,
}

impl Stage {
    /// Creates a stage dispatching `groups` invocation groups of
    /// `pipeline` with `bindings`.
    pub fn new(
        label: &'static str,
        pipeline: &KernelPipeline,
        bindings: &BindingSet,
        groups: u32,
    ) -> Self {
        Self {
            label,
            pipeline: pipeline.pipeline().clone(),
            bind_group: bindings.bind_group().clone(),
            push: Vec::new(),
            groups,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Attaches the push-constant payload, interpreted positionally by
    /// the kernel. Must match the pipeline's declared size exactly.
    pub fn with_push(mut self, bytes: &[u8]) -> Self {
        self.push = bytes.to_vec();
        self
    }

    /// Declares a byte range this stage reads.
    pub fn reads(mut self, range: BufferRange) -> Self {
        self.reads.push(range);
        self
    }

    /// Declares a byte range this stage writes.
    pub fn writes(mut self, range: BufferRange) -> Self {
        self.writes.push(range);
        self
    }

    /// Diagnostic label.
    #[inline]
    pub fn label(&self) -> &'static str {
        self.label
    }
}

#[derive(Debug)]
enum SequenceOp {
    Stage(Stage),
    Barrier(BufferRange),
}

/// A write→read dependency not covered by any barrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Hazard {
    /// Stage that wrote the range.
    pub producer: StageIndex,

    /// Stage that reads the range.
    pub consumer: StageIndex,

    /// The written range the consumer observes unfenced.
    pub range: BufferRange,
}

/// Records stages and barriers in fixed order.
///
/// The stage ordering is final at build time; the sequencer never
/// reorders work.
pub struct SequenceBuilder {
    ops: Vec<SequenceOp>,
    stage_count: usize,
}

impl SequenceBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            stage_count: 0,
        }
    }

    /// Appends a stage after everything recorded so far.
    pub fn stage(&mut self, stage: Stage) -> &mut Self {
        self.ops.push(SequenceOp::Stage(stage));
        self.stage_count += 1;
        self
    }

    /// Records an explicit barrier: all writes to `range` by earlier
    /// stages become visible to later stages.
    pub fn barrier(&mut self, range: BufferRange) -> &mut Self {
        self.ops.push(SequenceOp::Barrier(range));
        self
    }

    /// Number of stages recorded so far.
    #[inline]
    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    /// Finalizes the sequence.
    ///
    /// ## Errors
    /// * [`SequenceError::EmptySequence`] — no stages recorded.
    /// * [`SequenceError::ZeroDispatch`] — a stage with zero groups.
    pub fn build(self, policy: BarrierPolicy) -> Result<StageSequence, SequenceError> {
        if self.stage_count == 0 {
            return Err(SequenceError::EmptySequence);
        }

        let mut index = 0;
        for op in &self.ops {
            if let SequenceOp::Stage(stage) = op {
                if stage.groups == 0 {
                    return Err(SequenceError::ZeroDispatch { stage: index });
                }
                index += 1;
            }
        }

        let ops = match policy {
            BarrierPolicy::AsRecorded => self.ops,
            BarrierPolicy::Automatic => insert_missing_barriers(self.ops),
        };

        Ok(StageSequence { ops })
    }
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A finalized, encodable command sequence.
#[derive(Debug)]
pub struct StageSequence {
    ops: Vec<SequenceOp>,
}

impl StageSequence {
    /// Number of stages in the sequence.
    pub fn stage_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SequenceOp::Stage(_)))
            .count()
    }

    /// Number of barriers in the sequence.
    pub fn barrier_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SequenceOp::Barrier(_)))
            .count()
    }

    /// Reports every write→read edge not covered by a barrier.
    ///
    /// Empty for a correctly synchronized sequence. A non-empty result
    /// means the sequence races: the device may execute the dependent
    /// stages in any overlap, and results are undefined.
    pub fn unsynchronized_hazards(&self) -> Vec<Hazard> {
        find_hazards(self.ops.iter().map(|op| match op {
            SequenceOp::Stage(s) => OpAccess::Stage {
                reads: &s.reads,
                writes: &s.writes,
            },
            SequenceOp::Barrier(r) => OpAccess::Barrier(*r),
        }))
    }

    /// Encodes the sequence into one command buffer.
    ///
    /// Stages between barriers share a compute pass; each barrier closes
    /// the current pass and opens the next.
    pub fn encode(&self, context: &GpuContext) -> wgpu::CommandBuffer {
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("staged_compute_sequence"),
            });

        let mut cursor = 0;
        while cursor < self.ops.len() {
            // Skip barrier runs; each one is a pass boundary.
            while let Some(SequenceOp::Barrier(range)) = self.ops.get(cursor) {
                trace!(
                    "barrier: buffer {} bytes {}..{}",
                    range.buffer,
                    range.offset,
                    range.end()
                );
                cursor += 1;
            }

            let interval_start = cursor;
            while matches!(self.ops.get(cursor), Some(SequenceOp::Stage(_))) {
                cursor += 1;
            }
            if interval_start == cursor {
                continue;
            }

            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("staged_compute_pass"),
                timestamp_writes: None,
            });

            for op in &self.ops[interval_start..cursor] {
                if let SequenceOp::Stage(stage) = op {
                    trace!("dispatch '{}': {} groups", stage.label, stage.groups);
                    pass.set_pipeline(&stage.pipeline);
                    pass.set_bind_group(0, &stage.bind_group, &[]);
                    if !stage.push.is_empty() {
                        pass.set_push_constants(0, &stage.push);
                    }
                    pass.dispatch_workgroups(stage.groups, 1, 1);
                }
            }
        }

        encoder.finish()
    }
}

enum OpAccess<'a> {
    Stage {
        reads: &'a [BufferRange],
        writes: &'a [BufferRange],
    },
    Barrier(BufferRange),
}

/// Walks the op list tracking unfenced writes; returns each read that
/// observes one.
fn find_hazards<'a>(ops: impl Iterator<Item = OpAccess<'a>>) -> Vec<Hazard> {
    let mut hazards = Vec::new();
    let mut unfenced: Vec<(StageIndex, BufferRange)> = Vec::new();
    let mut stage = 0;

    for op in ops {
        match op {
            OpAccess::Barrier(range) => {
                unfenced.retain(|(_, write)| !range.contains(write));
            }
            OpAccess::Stage { reads, writes } => {
                for read in reads {
                    for &(producer, write) in unfenced.iter().filter(|(_, w)| w.overlaps(read)) {
                        hazards.push(Hazard {
                            producer,
                            consumer: stage,
                            range: write,
                        });
                    }
                }
                for write in writes {
                    unfenced.push((stage, *write));
                }
                stage += 1;
            }
        }
    }

    hazards
}

/// Inserts a barrier before each stage whose reads overlap an unfenced
/// prior write, merging per buffer so one barrier covers all pending
/// writes to that buffer.
fn insert_missing_barriers(ops: Vec<SequenceOp>) -> Vec<SequenceOp> {
    let mut out = Vec::with_capacity(ops.len());
    let mut unfenced: Vec<BufferRange> = Vec::new();

    for op in ops {
        match op {
            SequenceOp::Barrier(range) => {
                unfenced.retain(|write| !range.contains(write));
                out.push(SequenceOp::Barrier(range));
            }
            SequenceOp::Stage(stage) => {
                let mut pending: Vec<(BufferId, u64, u64)> = Vec::new();
                for read in &stage.reads {
                    for write in unfenced.iter().filter(|w| w.overlaps(read)) {
                        match pending.iter_mut().find(|(b, _, _)| *b == write.buffer) {
                            Some((_, start, end)) => {
                                *start = (*start).min(write.offset);
                                *end = (*end).max(write.end());
                            }
                            None => pending.push((write.buffer, write.offset, write.end())),
                        }
                    }
                }

                for (buffer, start, end) in pending {
                    let range = BufferRange {
                        buffer,
                        offset: start,
                        size: end - start,
                    };
                    debug!(
                        "inserting barrier before '{}': buffer {} bytes {}..{}",
                        stage.label, buffer, start, end
                    );
                    unfenced.retain(|write| !range.contains(write));
                    out.push(SequenceOp::Barrier(range));
                }

                unfenced.extend(stage.writes.iter().copied());
                out.push(SequenceOp::Stage(stage));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(buffer: BufferId, offset: u64, size: u64) -> BufferRange {
        BufferRange { buffer, offset, size }
    }

    #[test]
    fn unfenced_write_read_is_a_hazard() {
        let writes = [range(1, 0, 1024)];
        let reads = [range(1, 0, 1024)];
        let hazards = find_hazards(
            [
                OpAccess::Stage { reads: &[], writes: &writes },
                OpAccess::Stage { reads: &reads, writes: &[] },
            ]
            .into_iter(),
        );
        assert_eq!(
            hazards,
            vec![Hazard { producer: 0, consumer: 1, range: range(1, 0, 1024) }]
        );
    }

    #[test]
    fn covering_barrier_clears_the_hazard() {
        let writes = [range(1, 0, 1024)];
        let reads = [range(1, 0, 1024)];
        let hazards = find_hazards(
            [
                OpAccess::Stage { reads: &[], writes: &writes },
                OpAccess::Barrier(range(1, 0, 1024)),
                OpAccess::Stage { reads: &reads, writes: &[] },
            ]
            .into_iter(),
        );
        assert!(hazards.is_empty());
    }

    #[test]
    fn partial_barrier_leaves_the_write_unfenced() {
        let writes = [range(1, 0, 1024)];
        let reads = [range(1, 512, 512)];
        let hazards = find_hazards(
            [
                OpAccess::Stage { reads: &[], writes: &writes },
                OpAccess::Barrier(range(1, 0, 256)),
                OpAccess::Stage { reads: &reads, writes: &[] },
            ]
            .into_iter(),
        );
        assert_eq!(hazards.len(), 1);
        assert_eq!(hazards[0].producer, 0);
    }

    #[test]
    fn disjoint_buffers_never_conflict() {
        let writes = [range(0, 0, 64)];
        let reads = [range(1, 0, 64)];
        let hazards = find_hazards(
            [
                OpAccess::Stage { reads: &[], writes: &writes },
                OpAccess::Stage { reads: &reads, writes: &[] },
            ]
            .into_iter(),
        );
        assert!(hazards.is_empty());
    }

    #[test]
    fn hazard_names_the_latest_unfenced_producer_too() {
        let w0 = [range(2, 0, 128)];
        let w1 = [range(2, 128, 128)];
        let reads = [range(2, 0, 256)];
        let hazards = find_hazards(
            [
                OpAccess::Stage { reads: &[], writes: &w0 },
                OpAccess::Stage { reads: &[], writes: &w1 },
                OpAccess::Stage { reads: &reads, writes: &[] },
            ]
            .into_iter(),
        );
        assert_eq!(hazards.len(), 2);
        assert_eq!(hazards[0].producer, 0);
        assert_eq!(hazards[1].producer, 1);
    }
}
