//! Kernel loading and pipeline construction.
//!
//! Kernels are precompiled units of device code identified by name and
//! resolved through a [`KernelLibrary`]. Loading creates the shader
//! module under a validation error scope so malformed source surfaces as
//! [`KernelLoadError`] instead of an uncaptured device error; pipeline
//! construction does the same for driver rejection.
//!
//! A [`KernelPipeline`] is immutable once created: its binding layout
//! and push-constant range are part of its contract, and changing either
//! requires building a new pipeline. Pipelines are built once per
//! algorithm shape and reused for every execute call.

use std::collections::HashMap;

use log::debug;

use crate::error::{KernelLoadError, PipelineCreationError};
use crate::gpu::context::GpuContext;

/// Source and entry point of one registered kernel.
#[derive(Clone, Copy, Debug)]
pub struct KernelSource {
    /// WGSL source text.
    pub wgsl: &'static str,

    /// Entry point function name.
    pub entry: &'static str,
}

/// A validated, device-resident kernel module.
pub struct Kernel {
    name: String,
    module: wgpu::ShaderModule,
    entry: &'static str,
}

impl Kernel {
    /// Identifier the kernel was loaded under.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry point function name.
    #[inline]
    pub fn entry_point(&self) -> &'static str {
        self.entry
    }
}

/// Registry of named kernels.
///
/// The library maps string identifiers to kernel source; loading turns a
/// name into a validated [`Kernel`]. Registration is infallible and
/// last-write-wins, matching the fixed kernel set established at
/// algorithm construction.
pub struct KernelLibrary {
    registry: HashMap<&'static str, KernelSource>,
}

impl KernelLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
        }
    }

    /// Registers `source` under `name`.
    pub fn register(&mut self, name: &'static str, source: KernelSource) {
        self.registry.insert(name, source);
    }

    /// Resolves `name` and creates its shader module.
    ///
    /// ## Errors
    /// * [`KernelLoadError::UnknownKernel`] — `name` is not registered.
    /// * [`KernelLoadError::InvalidSource`] — the source failed shader
    ///   validation.
    pub fn load(&self, context: &GpuContext, name: &str) -> Result<Kernel, KernelLoadError> {
        let source = self
            .registry
            .get(name)
            .copied()
            .ok_or_else(|| KernelLoadError::UnknownKernel {
                name: name.to_owned(),
            })?;

        context
            .device
            .push_error_scope(wgpu::ErrorFilter::Validation);

        let module = context
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.wgsl.into()),
            });

        if let Some(error) = pollster::block_on(context.device.pop_error_scope()) {
            return Err(KernelLoadError::InvalidSource {
                name: name.to_owned(),
                detail: format!("{error}"),
            });
        }

        debug!("loaded kernel '{}' (entry '{}')", name, source.entry);

        Ok(Kernel {
            name: name.to_owned(),
            module,
            entry: source.entry,
        })
    }
}

impl Default for KernelLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// An executable compute pipeline plus its layout object.
#[derive(Debug)]
pub struct KernelPipeline {
    name: String,
    pipeline: wgpu::ComputePipeline,
    push_constant_size: u32,
}

impl KernelPipeline {
    /// Kernel identifier the pipeline was built from.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The executable pipeline object.
    #[inline]
    pub fn pipeline(&self) -> &wgpu::ComputePipeline {
        &self.pipeline
    }

    /// Declared push-constant payload size in bytes.
    #[inline]
    pub fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }
}

/// Builds a compute pipeline from a validated kernel, a binding-set
/// layout, and a push-constant size.
///
/// The resulting pipeline layout carries exactly one bind group layout
/// and, when `push_constant_size` is non-zero, one compute-visible
/// push-constant range starting at offset 0 — the positional wire
/// layout the kernels interpret.
///
/// ## Errors
/// * [`PipelineCreationError::PushConstantsTooLarge`] — the payload
///   exceeds the device budget.
/// * [`PipelineCreationError::Rejected`] — driver-side validation
///   failed (incompatible layout, missing entry point).
pub fn create_pipeline(
    context: &GpuContext,
    kernel: &Kernel,
    layout: &wgpu::BindGroupLayout,
    push_constant_size: u32,
) -> Result<KernelPipeline, PipelineCreationError> {
    let limit = context.capabilities.max_push_constant_size();
    if push_constant_size > limit {
        return Err(PipelineCreationError::PushConstantsTooLarge {
            kernel: kernel.name.clone(),
            requested: push_constant_size,
            limit,
        });
    }

    let ranges;
    let push_constant_ranges: &[wgpu::PushConstantRange] = if push_constant_size > 0 {
        ranges = [wgpu::PushConstantRange {
            stages: wgpu::ShaderStages::COMPUTE,
            range: 0..push_constant_size,
        }];
        &ranges
    } else {
        &[]
    };

    context
        .device
        .push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline_layout = context
        .device
        .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("staged_compute_pipeline_layout"),
            bind_group_layouts: &[layout],
            push_constant_ranges,
        });

    let pipeline = context
        .device
        .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(kernel.name.as_str()),
            layout: Some(&pipeline_layout),
            module: &kernel.module,
            entry_point: Some(kernel.entry),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

    if let Some(error) = pollster::block_on(context.device.pop_error_scope()) {
        return Err(PipelineCreationError::Rejected {
            kernel: kernel.name.clone(),
            detail: format!("{error}"),
        });
    }

    debug!(
        "created pipeline '{}' (push constants: {} bytes)",
        kernel.name, push_constant_size
    );

    Ok(KernelPipeline {
        name: kernel.name.clone(),
        pipeline,
        push_constant_size,
    })
}
