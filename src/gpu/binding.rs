//! Binding set builder.
//!
//! Groups arena buffers into per-stage binding sets matching a kernel's
//! slot layout. The builder follows a begin/bind/end protocol:
//!
//! ```ignore
//! bindings.begin(wgpu::ShaderStages::COMPUTE)?;
//! bindings.bind_buffer(0, input)?;
//! bindings.bind_buffer(1, group_sums)?;
//! bindings.bind_buffer(2, output)?;
//! let (sum_set, layout) = bindings.end(&ctx, &arena)?;
//! ```
//!
//! ## Layout sharing
//! A [`wgpu::BindGroupLayout`] is created once per slot count and reused
//! by every later set with the same shape, so stages with the same
//! input/output arity are interchangeable: re-binding a pipeline to
//! different buffers never requires rebuilding the pipeline. All slots
//! are read-write storage with the visibility given to `begin` — the
//! kernel side decides which slots it actually writes.
//!
//! ## Errors
//! Slot shape violations (duplicates, gaps, empty sets, a count that
//! contradicts an explicitly claimed shared layout) surface as
//! [`LayoutMismatchError`] before any descriptor is written.

use crate::error::{ComputeResult, LayoutMismatchError};
use crate::types::{BufferId, LayoutId};
use crate::gpu::alloc::BufferArena;
use crate::gpu::context::GpuContext;

/// Immutable mapping from slot index to buffer for one stage.
///
/// Holds the finished bind group plus the slot→buffer map, which the
/// sequencer and the shapes consult when declaring stage accesses.
#[derive(Debug)]
pub struct BindingSet {
    bind_group: wgpu::BindGroup,
    slots: Vec<BufferId>,
    layout: LayoutId,
}

impl BindingSet {
    /// The finished bind group.
    #[inline]
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Buffers in slot order.
    #[inline]
    pub fn slots(&self) -> &[BufferId] {
        &self.slots
    }

    /// Number of slots in the set.
    #[inline]
    pub fn slot_count(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Shared layout this set was created against.
    #[inline]
    pub fn layout(&self) -> LayoutId {
        self.layout
    }
}

struct OpenSet {
    visibility: wgpu::ShaderStages,
    bound: Vec<(u32, BufferId)>,
}

/// Builder for binding sets and their shared layouts.
///
/// ## Role
/// Owns every [`wgpu::BindGroupLayout`] created for this algorithm
/// instance, keyed by slot count, and finalizes binding sets against
/// them.
///
/// ## Protocol
/// `begin` → `bind_buffer`* → `end` (or `end_with_layout` to claim an
/// already-established shape). At most one set is open at a time.
pub struct BindingMaker {
    layouts: Vec<(u32, wgpu::BindGroupLayout)>,
    open: Option<OpenSet>,
}

impl BindingMaker {
    /// Creates a builder with no established layouts.
    pub fn new() -> Self {
        Self {
            layouts: Vec::new(),
            open: None,
        }
    }

    /// Opens a builder scope for one binding set.
    pub fn begin(&mut self, visibility: wgpu::ShaderStages) -> Result<(), LayoutMismatchError> {
        if self.open.is_some() {
            return Err(LayoutMismatchError::SetAlreadyOpen);
        }
        self.open = Some(OpenSet {
            visibility,
            bound: Vec::new(),
        });
        Ok(())
    }

    /// Records `buffer` at slot index `slot` in the open set.
    ///
    /// Slots are 0-based and must form a contiguous run by the time the
    /// set is finalized; binding order is free.
    pub fn bind_buffer(&mut self, slot: u32, buffer: BufferId) -> Result<(), LayoutMismatchError> {
        let open = self.open.as_mut().ok_or(LayoutMismatchError::NoOpenSet)?;

        if open.bound.iter().any(|&(s, _)| s == slot) {
            return Err(LayoutMismatchError::DuplicateSlot { slot });
        }
        open.bound.push((slot, buffer));
        Ok(())
    }

    /// Finalizes the open set against the shared layout for its slot
    /// count, establishing that layout on first use.
    pub fn end(
        &mut self,
        context: &GpuContext,
        arena: &BufferArena,
    ) -> ComputeResult<(BindingSet, LayoutId)> {
        self.finish(context, arena, None)
    }

    /// Finalizes the open set against an already-established layout.
    ///
    /// ## Errors
    /// [`LayoutMismatchError::SlotCountMismatch`] when the set's slot
    /// count differs from the claimed layout's shape.
    pub fn end_with_layout(
        &mut self,
        context: &GpuContext,
        arena: &BufferArena,
        layout: LayoutId,
    ) -> ComputeResult<BindingSet> {
        self.finish(context, arena, Some(layout)).map(|(set, _)| set)
    }

    /// Bind group layout behind a [`LayoutId`].
    ///
    /// Valid IDs are only produced by `end`, so a miss is a caller bug;
    /// returns `None` rather than panicking.
    pub fn layout(&self, id: LayoutId) -> Option<&wgpu::BindGroupLayout> {
        self.layouts.get(id as usize).map(|(_, layout)| layout)
    }

    fn finish(
        &mut self,
        context: &GpuContext,
        arena: &BufferArena,
        claimed: Option<LayoutId>,
    ) -> ComputeResult<(BindingSet, LayoutId)> {
        let mut open = self.open.take().ok_or(LayoutMismatchError::NoOpenSet)?;

        if open.bound.is_empty() {
            return Err(LayoutMismatchError::EmptySet.into());
        }

        open.bound.sort_unstable_by_key(|&(slot, _)| slot);
        let count = open.bound.len() as u32;

        for (expected, &(slot, _)) in (0..count).zip(open.bound.iter()) {
            if slot != expected {
                return Err(LayoutMismatchError::NonContiguousSlots {
                    missing: expected,
                    bound: count,
                }
                .into());
            }
        }

        for &(_, buffer) in &open.bound {
            if !arena.contains(buffer) {
                return Err(LayoutMismatchError::UnknownBuffer { buffer }.into());
            }
        }

        let layout_id = match claimed {
            Some(id) => {
                let expected = self
                    .layouts
                    .get(id as usize)
                    .map(|&(n, _)| n)
                    .ok_or(LayoutMismatchError::UnknownLayout { layout: id })?;
                if expected != count {
                    return Err(LayoutMismatchError::SlotCountMismatch {
                        expected,
                        actual: count,
                    }
                    .into());
                }
                id
            }
            None => self.get_or_create_layout(context, count, open.visibility),
        };

        let mut entries = Vec::with_capacity(open.bound.len());
        for &(slot, buffer) in &open.bound {
            entries.push(wgpu::BindGroupEntry {
                binding: slot,
                resource: arena.binding(buffer)?,
            });
        }

        let (_, layout) = &self.layouts[layout_id as usize];
        let bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("staged_compute_binding_set"),
            layout,
            entries: &entries,
        });

        let slots = open.bound.into_iter().map(|(_, buffer)| buffer).collect();
        Ok((
            BindingSet {
                bind_group,
                slots,
                layout: layout_id,
            },
            layout_id,
        ))
    }

    fn get_or_create_layout(
        &mut self,
        context: &GpuContext,
        count: u32,
        visibility: wgpu::ShaderStages,
    ) -> LayoutId {
        if let Some(id) = self
            .layouts
            .iter()
            .position(|&(n, _)| n == count)
        {
            return id as LayoutId;
        }

        let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..count)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let layout = context
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("staged_compute_layout"),
                entries: &entries,
            });

        let id = self.layouts.len() as LayoutId;
        self.layouts.push((count, layout));
        id
    }
}

impl Default for BindingMaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_twice_is_rejected() {
        let mut maker = BindingMaker::new();
        maker.begin(wgpu::ShaderStages::COMPUTE).unwrap();
        let err = maker.begin(wgpu::ShaderStages::COMPUTE).unwrap_err();
        assert_eq!(err, LayoutMismatchError::SetAlreadyOpen);
    }

    #[test]
    fn bind_without_open_set_is_rejected() {
        let mut maker = BindingMaker::new();
        let err = maker.bind_buffer(0, 0).unwrap_err();
        assert_eq!(err, LayoutMismatchError::NoOpenSet);
    }

    #[test]
    fn duplicate_slot_is_rejected() {
        let mut maker = BindingMaker::new();
        maker.begin(wgpu::ShaderStages::COMPUTE).unwrap();
        maker.bind_buffer(0, 0).unwrap();
        let err = maker.bind_buffer(0, 1).unwrap_err();
        assert_eq!(err, LayoutMismatchError::DuplicateSlot { slot: 0 });
    }
}
