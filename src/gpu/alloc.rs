//! Buffer allocator.
//!
//! The working buffers of one algorithm instance are requested up front
//! and bound together by a **single backing device allocation**; each
//! logical buffer occupies a disjoint, alignment-padded sub-range of the
//! backing buffer. Binding everything in one call amortizes allocation
//! count and guarantees that buffers participating in the same stage set
//! share one allocation — mixing allocation calls for such buffers is
//! rejected by construction, because an arena accepts no further
//! requests once bound.
//!
//! ## Lifecycle
//! * `request` — record size, role, and label (fails on zero size).
//! * `allocate_and_bind` — one backing buffer sized for every request at
//!   the required alignment; assigns each buffer its region.
//! * region/binding queries — consumed by binding sets, transfers, and
//!   stage access declarations.
//!
//! Regions are fixed at bind time and never re-bound; teardown releases
//! the single backing allocation when the arena drops.

use log::debug;

use crate::error::AllocationError;
use crate::types::{align_up, BufferId, BufferRange, BufferUsage};
use crate::gpu::context::GpuContext;

struct BufferRequest {
    label: &'static str,
    size: u64,
    usage: BufferUsage,
}

#[derive(Clone, Copy)]
struct Region {
    offset: u64,
    size: u64,
}

/// Arena of logical buffers backed by one device allocation.
///
/// ## Role
/// Owns the device memory for the fixed set of working buffers of one
/// algorithm instance. Hands out dense [`BufferId`]s and resolves them
/// to sub-range bindings of the backing buffer.
///
/// ## Invariants
/// * Every buffer's size is fixed at request time; no stage may access
///   an index range beyond it.
/// * After `allocate_and_bind`, the request set is sealed.
#[derive(Debug)]
pub struct BufferArena {
    requests: Vec<BufferRequest>,
    regions: Vec<Region>,
    backing: Option<wgpu::Buffer>,
}

impl BufferArena {
    /// Creates an empty, unbound arena.
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            regions: Vec::new(),
            backing: None,
        }
    }

    /// Records a buffer request of `size` bytes with the given role.
    ///
    /// ## Errors
    /// * [`AllocationError::ZeroSize`] — `size` is zero.
    /// * [`AllocationError::AlreadyBound`] — the arena is sealed.
    pub fn request(
        &mut self,
        label: &'static str,
        size: u64,
        usage: BufferUsage,
    ) -> Result<BufferId, AllocationError> {
        if self.backing.is_some() {
            return Err(AllocationError::AlreadyBound);
        }
        if size == 0 {
            return Err(AllocationError::ZeroSize { label });
        }

        let id = self.requests.len() as BufferId;
        self.requests.push(BufferRequest { label, size, usage });
        Ok(id)
    }

    /// Performs the single backing allocation and binds every requested
    /// buffer to a disjoint aligned sub-range.
    ///
    /// `alignment_padding` raises the alignment floor above the device's
    /// storage-offset requirement; it is rounded up to a power of two.
    /// Zero keeps the device floor.
    ///
    /// ## Errors
    /// * [`AllocationError::RegionTooLarge`] — a single request exceeds
    ///   the per-binding limit.
    /// * [`AllocationError::Exhausted`] — the combined aligned size
    ///   exceeds the device's maximum buffer size.
    pub fn allocate_and_bind(
        &mut self,
        context: &GpuContext,
        alignment_padding: u64,
    ) -> Result<(), AllocationError> {
        if self.backing.is_some() {
            return Err(AllocationError::AlreadyBound);
        }

        let device_align = context.capabilities.storage_offset_alignment();
        let alignment = if alignment_padding == 0 {
            device_align
        } else {
            device_align.max(alignment_padding.next_power_of_two())
        };

        let binding_limit = context.capabilities.max_binding_size();
        let buffer_limit = context.capabilities.max_buffer_size();

        // Every role includes storage access; transfer bits accumulate
        // per request.
        let mut usage = wgpu::BufferUsages::STORAGE;
        let mut cursor = 0u64;
        let mut regions = Vec::with_capacity(self.requests.len());

        for request in &self.requests {
            if request.size > binding_limit {
                return Err(AllocationError::RegionTooLarge {
                    requested: request.size,
                    limit: binding_limit,
                });
            }

            let offset = align_up(cursor, alignment);
            regions.push(Region { offset, size: request.size });
            cursor = offset + request.size;
            usage |= request.usage.as_wgpu();
        }

        if cursor > buffer_limit {
            return Err(AllocationError::Exhausted {
                requested: cursor,
                limit: buffer_limit,
            });
        }

        debug!(
            "binding {} buffers into one {}-byte allocation (alignment {})",
            self.requests.len(),
            cursor,
            alignment
        );

        let backing = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staged_compute_arena"),
            size: cursor.max(alignment),
            usage,
            mapped_at_creation: false,
        });

        self.regions = regions;
        self.backing = Some(backing);
        Ok(())
    }

    /// True once `allocate_and_bind` has succeeded.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.backing.is_some()
    }

    /// Number of requested buffers.
    #[inline]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// True when no buffers have been requested.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// True when `id` names a requested buffer.
    #[inline]
    pub fn contains(&self, id: BufferId) -> bool {
        (id as usize) < self.requests.len()
    }

    /// Size in bytes of the buffer `id`, as requested.
    pub fn size_of(&self, id: BufferId) -> Option<u64> {
        self.requests.get(id as usize).map(|r| r.size)
    }

    /// Transfer role of the buffer `id`.
    pub fn usage_of(&self, id: BufferId) -> Option<BufferUsage> {
        self.requests.get(id as usize).map(|r| r.usage)
    }

    /// Diagnostic label of the buffer `id`.
    pub fn label_of(&self, id: BufferId) -> Option<&'static str> {
        self.requests.get(id as usize).map(|r| r.label)
    }

    /// Byte range covering the whole of buffer `id`, for stage access
    /// declarations and barriers.
    pub fn whole_range(&self, id: BufferId) -> Option<BufferRange> {
        self.size_of(id).map(|size| BufferRange::whole(id, size))
    }

    /// The backing allocation.
    ///
    /// ## Errors
    /// [`AllocationError::NotBound`] before `allocate_and_bind`.
    pub fn backing(&self) -> Result<&wgpu::Buffer, AllocationError> {
        self.backing.as_ref().ok_or(AllocationError::NotBound)
    }

    /// Absolute byte offset of buffer `id` inside the backing
    /// allocation.
    pub fn offset_of(&self, id: BufferId) -> Result<u64, AllocationError> {
        if self.backing.is_none() {
            return Err(AllocationError::NotBound);
        }
        self.regions
            .get(id as usize)
            .map(|r| r.offset)
            .ok_or(AllocationError::NotBound)
    }

    /// Bind-group resource for buffer `id`: the backing buffer restricted
    /// to the buffer's region.
    pub fn binding(&self, id: BufferId) -> Result<wgpu::BindingResource<'_>, AllocationError> {
        let backing = self.backing()?;
        let region = self.regions.get(id as usize).ok_or(AllocationError::NotBound)?;

        Ok(wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: backing,
            offset: region.offset,
            size: wgpu::BufferSize::new(region.size),
        }))
    }
}

impl Default for BufferArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_request_rejected() {
        let mut arena = BufferArena::new();
        let err = arena.request("empty", 0, BufferUsage::Scratch).unwrap_err();
        assert_eq!(err, AllocationError::ZeroSize { label: "empty" });
    }

    #[test]
    fn ids_are_dense_in_request_order() {
        let mut arena = BufferArena::new();
        let a = arena.request("a", 16, BufferUsage::Source).unwrap();
        let b = arena.request("b", 32, BufferUsage::Target).unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(arena.size_of(b), Some(32));
        assert_eq!(arena.usage_of(a), Some(BufferUsage::Source));
        assert!(!arena.is_bound());
    }

    #[test]
    fn queries_before_bind_fail() {
        let mut arena = BufferArena::new();
        let id = arena.request("a", 16, BufferUsage::Source).unwrap();
        assert_eq!(arena.backing().err(), Some(AllocationError::NotBound));
        assert_eq!(arena.offset_of(id).err(), Some(AllocationError::NotBound));
    }
}
