//! Host transfer collaborator.
//!
//! Seeds inputs before and retrieves outputs after an execute call.
//! The pipeline core never performs host↔device copies itself; these
//! functions are the narrow interface it consumes.
//!
//! Transfers are direction-checked against the buffer's role:
//! [`BufferUsage::Scratch`] buffers accept no host transfers at all and
//! only [`BufferUsage::Target`] buffers can be read back. A transfer
//! with no intervening stage execution round-trips bytes unchanged.
//!
//! [`BufferUsage::Source`]: crate::types::BufferUsage::Source
//! [`BufferUsage::Target`]: crate::types::BufferUsage::Target

use crate::error::{ComputeResult, TransferError};
use crate::types::{BufferId, BufferUsage};
use crate::gpu::alloc::BufferArena;
use crate::gpu::context::GpuContext;

/// Copy offsets and lengths must be 4-byte aligned.
const COPY_ALIGNMENT: u64 = 4;

fn check_transfer(
    arena: &BufferArena,
    id: BufferId,
    offset: u64,
    len: u64,
    permitted: fn(BufferUsage) -> bool,
    operation: &'static str,
) -> Result<(), TransferError> {
    let region = arena
        .size_of(id)
        .ok_or(TransferError::UnknownBuffer { buffer: id })?;

    // usage_of is Some whenever size_of is.
    if !arena.usage_of(id).map_or(false, permitted) {
        return Err(TransferError::WrongDirection { buffer: id, operation });
    }

    if offset % COPY_ALIGNMENT != 0 || len % COPY_ALIGNMENT != 0 {
        return Err(TransferError::Misaligned { offset, len });
    }

    if offset.checked_add(len).map_or(true, |end| end > region) {
        return Err(TransferError::OutOfRange {
            buffer: id,
            offset,
            len,
            region,
        });
    }

    Ok(())
}

/// Writes `data` into buffer `id` at `offset` bytes.
///
/// Legal for [`BufferUsage::Source`] and [`BufferUsage::Target`]
/// buffers. The write is ordered before any subsequently submitted
/// stage work.
///
/// [`BufferUsage::Source`]: crate::types::BufferUsage::Source
/// [`BufferUsage::Target`]: crate::types::BufferUsage::Target
pub fn update_buffer(
    context: &GpuContext,
    arena: &BufferArena,
    id: BufferId,
    offset: u64,
    data: &[u8],
) -> ComputeResult<()> {
    check_transfer(
        arena,
        id,
        offset,
        data.len() as u64,
        BufferUsage::host_writable,
        "host writes",
    )?;

    let backing = arena.backing()?;
    let base = arena.offset_of(id)?;
    context.queue.write_buffer(backing, base + offset, data);
    Ok(())
}

/// Reads `len` bytes from buffer `id` at `offset` into a host vector.
///
/// Only legal for [`BufferUsage::Target`] buffers. Blocks until the
/// staging copy completes.
///
/// [`BufferUsage::Target`]: crate::types::BufferUsage::Target
pub fn read_buffer(
    context: &GpuContext,
    arena: &BufferArena,
    id: BufferId,
    offset: u64,
    len: u64,
) -> ComputeResult<Vec<u8>> {
    check_transfer(arena, id, offset, len, BufferUsage::host_readable, "host reads")?;

    let backing = arena.backing()?;
    let base = arena.offset_of(id)?;

    let staging = context.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("staged_compute_readback"),
        size: len,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = context
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("staged_compute_readback_copy"),
        });
    encoder.copy_buffer_to_buffer(backing, base + offset, &staging, 0, len);
    let submission = context.queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    context
        .device
        .poll(wgpu::PollType::WaitForSubmissionIndex(submission))
        .map_err(|e| TransferError::MapFailed { detail: format!("{e:?}") })?;

    receiver
        .recv()
        .map_err(|e| TransferError::MapFailed { detail: format!("{e}") })?
        .map_err(|e| TransferError::MapFailed { detail: format!("{e:?}") })?;

    let data = slice.get_mapped_range().to_vec();
    staging.unmap();
    Ok(data)
}

/// Typed wrapper over [`update_buffer`] for POD element slices.
pub fn update_slice<T: bytemuck::Pod>(
    context: &GpuContext,
    arena: &BufferArena,
    id: BufferId,
    offset: u64,
    values: &[T],
) -> ComputeResult<()> {
    update_buffer(context, arena, id, offset, bytemuck::cast_slice(values))
}

/// Typed wrapper over [`read_buffer`] for POD element slices.
pub fn read_slice<T: bytemuck::Pod>(
    context: &GpuContext,
    arena: &BufferArena,
    id: BufferId,
    offset: u64,
    count: usize,
) -> ComputeResult<Vec<T>> {
    let len = (count * std::mem::size_of::<T>()) as u64;
    let bytes = read_buffer(context, arena, id, offset, len)?;
    Ok(bytemuck::cast_slice(&bytes).to_vec())
}
