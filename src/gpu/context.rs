//! GPU device and queue bring-up.
//!
//! Every pipeline component receives the device through an explicit
//! [`GpuContext`] reference; there is no ambient global state. Bring-up
//! happens exactly once per context:
//!
//! 1. create the instance,
//! 2. resolve an adapter (by explicit index, or the high-performance
//!    default),
//! 3. open a device with the push-constant capability,
//! 4. capture the capability table ([`DeviceCapabilities`]).
//!
//! The capability table is the one-time snapshot of adapter limits and
//! features the rest of the pipeline consults (alignment floors,
//! push-constant budget, allocation ceilings); components never reach
//! back into the adapter.

use log::debug;

use crate::error::InitError;

/// Construction options consumed once by [`GpuContext::new`].
///
/// `adapter_index` selects a physical device by position in the
/// enumeration order; `None` asks the backend for its high-performance
/// default.
#[derive(Clone, Debug)]
pub struct ContextOptions {
    /// Explicit adapter index, or `None` for the backend default.
    pub adapter_index: Option<usize>,

    /// Backends considered during enumeration.
    pub backends: wgpu::Backends,

    /// Preference used when no explicit index is given.
    pub power_preference: wgpu::PowerPreference,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            adapter_index: None,
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Snapshot of the selected adapter's identity, features, and limits.
///
/// Captured once at context creation and treated as immutable for the
/// context's lifetime.
#[derive(Clone, Debug)]
pub struct DeviceCapabilities {
    /// Adapter name as reported by the driver.
    pub adapter_name: String,

    /// Backend the adapter runs on (Vulkan, Metal, DX12, GL).
    pub backend: wgpu::Backend,

    /// Device limits granted at device creation.
    pub limits: wgpu::Limits,

    /// Features granted at device creation.
    pub features: wgpu::Features,
}

impl DeviceCapabilities {
    /// Alignment floor for storage-buffer binding offsets.
    #[inline]
    pub fn storage_offset_alignment(&self) -> u64 {
        u64::from(self.limits.min_storage_buffer_offset_alignment)
    }

    /// Largest allocation a single buffer may occupy.
    #[inline]
    pub fn max_buffer_size(&self) -> u64 {
        self.limits.max_buffer_size
    }

    /// Largest byte range one storage binding may cover.
    #[inline]
    pub fn max_binding_size(&self) -> u64 {
        u64::from(self.limits.max_storage_buffer_binding_size)
    }

    /// Push-constant budget in bytes.
    #[inline]
    pub fn max_push_constant_size(&self) -> u32 {
        self.limits.max_push_constant_size
    }
}

/// Owned GPU device, queue, and capability table.
///
/// ## Role
/// The single explicit handle through which all pipeline components
/// reach the device. Constructed once per algorithm lifetime and passed
/// by reference everywhere.
///
/// ## Thread safety
/// The pipeline host model is single-threaded; the context is `Send`
/// but components do not synchronize device access among themselves.
#[derive(Debug)]
pub struct GpuContext {
    /// Open logical device.
    pub device: wgpu::Device,

    /// Compute-capable submission queue.
    pub queue: wgpu::Queue,

    /// Capability table captured at creation.
    pub capabilities: DeviceCapabilities,
}

impl GpuContext {
    /// Brings up a device according to `options`.
    ///
    /// ## Errors
    /// * [`InitError::NoAdapter`] — nothing to enumerate.
    /// * [`InitError::AdapterIndexOutOfRange`] — explicit index past the
    ///   end of the adapter list.
    /// * [`InitError::MissingPushConstants`] — the adapter cannot honor
    ///   the push-constant contract the kernels rely on.
    /// * [`InitError::DeviceRequestFailed`] — driver rejected the device
    ///   request.
    pub fn new(options: &ContextOptions) -> Result<Self, InitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });

        let adapter = match options.adapter_index {
            Some(index) => {
                let mut adapters = instance.enumerate_adapters(options.backends);
                let available = adapters.len();
                if index >= available {
                    return Err(InitError::AdapterIndexOutOfRange { index, available });
                }
                adapters.swap_remove(index)
            }
            None => pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            }))
            .map_err(|_| InitError::NoAdapter)?,
        };

        let info = adapter.get_info();
        debug!(
            "selected adapter '{}' on {:?}",
            info.name, info.backend
        );

        if !adapter.features().contains(wgpu::Features::PUSH_CONSTANTS) {
            return Err(InitError::MissingPushConstants { adapter: info.name });
        }

        let adapter_limits = adapter.limits();
        let required_limits = wgpu::Limits {
            max_push_constant_size: adapter_limits.max_push_constant_size.min(128),
            ..wgpu::Limits::default()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("staged_compute_device"),
            required_features: wgpu::Features::PUSH_CONSTANTS,
            required_limits,
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        }))
        .map_err(|e| InitError::DeviceRequestFailed { detail: format!("{e}") })?;

        let capabilities = DeviceCapabilities {
            adapter_name: info.name,
            backend: info.backend,
            limits: device.limits(),
            features: device.features(),
        };

        Ok(Self { device, queue, capabilities })
    }
}
