//! Execution engine.
//!
//! Submits one recorded command sequence to the compute queue and
//! blocks the host until the device signals completion or the timeout
//! elapses. There is no cancellation: once submitted, a sequence runs
//! to completion or the wait times out.
//!
//! The completion handle is single-use — one submit, one wait — and the
//! type system enforces it: [`Pending::wait`] and
//! [`ExecutionContext::run`] consume their receivers. After a
//! successful wait, buffers written by the last stage are safe to read
//! back through the transfer collaborator.

use std::time::Duration;

use log::debug;

use crate::error::TimeoutError;
use crate::gpu::context::GpuContext;
use crate::gpu::sequence::StageSequence;

/// Default wait bound: long enough that only a hung device trips it.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(100);

/// Completion handle for one submitted sequence.
///
/// The one-shot fence analog: it exists between submit and wait and is
/// consumed by the wait.
#[must_use = "a submitted sequence must be waited on"]
pub struct Pending {
    index: wgpu::SubmissionIndex,
}

/// Submits exactly one command sequence and returns its completion
/// handle.
pub fn submit(context: &GpuContext, command: wgpu::CommandBuffer) -> Pending {
    let index = context.queue.submit(Some(command));
    debug!("submitted command sequence");
    Pending { index }
}

impl Pending {
    /// Blocks until the device signals completion of the submission or
    /// `timeout` elapses.
    ///
    /// ## Errors
    /// [`TimeoutError`] when the bound elapses first. The submitted
    /// work may still be running; the caller must not reuse the
    /// sequence's buffers until the device settles.
    pub fn wait(self, context: &GpuContext, timeout: Duration) -> Result<(), TimeoutError> {
        context
            .device
            .poll(wgpu::PollType::WaitForSubmissionIndex(self.index))
            .map(|_| ())
            .map_err(|_| TimeoutError { waited: timeout })
    }
}

/// One execute round-trip: the recorded command sequence and, after
/// submission, its completion signal.
///
/// Recreated per execute invocation while buffers and pipelines remain
/// valid; dropping it releases the recorded commands.
#[must_use = "a recorded sequence does nothing until run"]
pub struct ExecutionContext {
    command: wgpu::CommandBuffer,
}

impl ExecutionContext {
    /// Records `sequence` into a fresh command buffer.
    pub fn record(context: &GpuContext, sequence: &StageSequence) -> Self {
        Self {
            command: sequence.encode(context),
        }
    }

    /// Submits the recorded sequence and blocks for completion.
    ///
    /// Consumes the context: re-running requires re-recording, which
    /// keeps the completion signal single-use.
    pub fn run(self, context: &GpuContext, timeout: Duration) -> Result<(), TimeoutError> {
        submit(context, self.command).wait(context, timeout)
    }
}
