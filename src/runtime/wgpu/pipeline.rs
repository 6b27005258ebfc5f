//! WGSL compute pipeline infrastructure
//!
//! Both routines come from one shader module. A pipeline is specialized per
//! entry point, group size and scratch length through WGSL override
//! constants, so each distinct launch geometry compiles once.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, Buffer, BufferBinding, BufferBindingType,
    ComputePipeline, ComputePipelineDescriptor, Device, PipelineCompilationOptions,
    PipelineLayoutDescriptor, ShaderModule, ShaderModuleDescriptor, ShaderSource, ShaderStages,
};

/// Key for bind group layout cache
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    /// Number of storage buffers in the layout
    pub num_storage_buffers: u32,
    /// Number of uniform buffers in the layout
    pub num_uniform_buffers: u32,
}

/// Key for the pipeline cache
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    entry_point: &'static str,
    group_size: u32,
    scratch_len: u32,
}

/// One bound range of a buffer
pub struct BindingRange<'a> {
    /// Backing buffer
    pub buffer: &'a Buffer,
    /// Byte offset of the range
    pub offset: u64,
    /// Byte size of the range
    pub size: u64,
}

/// Cache for the shader module, layouts and specialized pipelines
pub struct PipelineCache {
    device: Arc<Device>,
    module: Mutex<Option<Arc<ShaderModule>>>,
    pipelines: Mutex<HashMap<PipelineKey, Arc<ComputePipeline>>>,
    layouts: Mutex<HashMap<LayoutKey, Arc<BindGroupLayout>>>,
}

impl PipelineCache {
    /// Create a new pipeline cache
    pub fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            module: Mutex::new(None),
            pipelines: Mutex::new(HashMap::new()),
            layouts: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the shader module holding every entry point
    pub fn get_or_create_module(&self, label: &str, source: &str) -> Arc<ShaderModule> {
        let mut module = self.module.lock();
        if let Some(module) = module.as_ref() {
            return module.clone();
        }

        let created = Arc::new(self.device.create_shader_module(ShaderModuleDescriptor {
            label: Some(label),
            source: ShaderSource::Wgsl(source.into()),
        }));
        *module = Some(created.clone());
        created
    }

    /// Get or create a pipeline specialized for one launch geometry
    pub fn get_or_create_pipeline(
        &self,
        entry_point: &'static str,
        module: &ShaderModule,
        layout: &BindGroupLayout,
        group_size: u32,
        scratch_len: u32,
    ) -> Arc<ComputePipeline> {
        let key = PipelineKey {
            entry_point,
            group_size,
            scratch_len,
        };
        let mut pipelines = self.pipelines.lock();
        if let Some(pipeline) = pipelines.get(&key) {
            return pipeline.clone();
        }

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(&format!("{}_layout", entry_point)),
                bind_group_layouts: &[layout],
                immediate_size: 0,
            });

        let constants = [
            ("GROUP_SIZE", f64::from(group_size)),
            ("SCRATCH_LEN", f64::from(scratch_len)),
        ];
        let pipeline = self
            .device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(&format!("{}_g{}_s{}", entry_point, group_size, scratch_len)),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some(entry_point),
                compilation_options: PipelineCompilationOptions {
                    constants: &constants,
                    zero_initialize_workgroup_memory: true,
                },
                cache: None,
            });

        let pipeline = Arc::new(pipeline);
        pipelines.insert(key, pipeline.clone());
        pipeline
    }

    /// Get or create a bind group layout: storage buffers first, then uniforms
    pub fn get_or_create_layout(&self, key: LayoutKey) -> Arc<BindGroupLayout> {
        let mut layouts = self.layouts.lock();
        if let Some(layout) = layouts.get(&key) {
            return layout.clone();
        }

        let mut entries = Vec::new();

        // storage buffers (read-write)
        for i in 0..key.num_storage_buffers {
            entries.push(BindGroupLayoutEntry {
                binding: i,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Storage { read_only: false },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        // uniform params
        for i in 0..key.num_uniform_buffers {
            entries.push(BindGroupLayoutEntry {
                binding: key.num_storage_buffers + i,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }

        let layout = Arc::new(
            self.device
                .create_bind_group_layout(&BindGroupLayoutDescriptor {
                    label: Some("relaxr_layout"),
                    entries: &entries,
                }),
        );
        layouts.insert(key, layout.clone());
        layout
    }

    /// Create a bind group; binding `i` is `ranges[i]`
    pub fn create_bind_group(
        &self,
        label: &str,
        layout: &BindGroupLayout,
        ranges: &[BindingRange<'_>],
    ) -> BindGroup {
        let entries: Vec<BindGroupEntry> = ranges
            .iter()
            .enumerate()
            .map(|(i, range)| BindGroupEntry {
                binding: i as u32,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: range.buffer,
                    offset: range.offset,
                    size: std::num::NonZeroU64::new(range.size),
                }),
            })
            .collect();

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        })
    }
}
