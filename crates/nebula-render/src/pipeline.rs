//! GPU-backed program linking.
//!
//! [`WgpuLinker`] runs the same checks as [`NagaLinker`](crate::NagaLinker)
//! and then builds a render pipeline whose color targets are the program's
//! bound outputs, each a single-channel float texture.

use log::info;

use crate::shader::{LinkError, Program, ProgramDescriptor, ProgramLinker, StageKind, link_modules};

/// Links programs into render pipelines on a device.
pub struct WgpuLinker {
    device: wgpu::Device,
    target_format: wgpu::TextureFormat,
}

impl WgpuLinker {
    /// Format of every output target.
    pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

    pub fn new(device: wgpu::Device) -> Self {
        Self {
            device,
            target_format: Self::TARGET_FORMAT,
        }
    }

    fn create_pipeline(
        &self,
        descriptor: &ProgramDescriptor<'_>,
        program: &Program,
    ) -> Result<wgpu::RenderPipeline, LinkError> {
        let vertex_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{}-vertex", descriptor.label)),
            source: wgpu::ShaderSource::Wgsl(descriptor.vertex_source.into()),
        });
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{}-fragment", descriptor.label)),
            source: wgpu::ShaderSource::Wgsl(descriptor.fragment_source.into()),
        });

        // Outputs are sorted by location; gaps get no target.
        let target_count = program
            .outputs()
            .last()
            .map_or(0, |output| output.location as usize + 1);
        let mut targets: Vec<Option<wgpu::ColorTargetState>> = vec![None; target_count];
        for output in program.outputs() {
            targets[output.location as usize] = Some(wgpu::ColorTargetState {
                format: self.target_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            });
        }

        // Device-side rejections surface as validation errors instead of
        // reaching the uncaptured error handler.
        let error_scope = self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(descriptor.label),
                // Derived from the shaders, so uniforms need no hand-written layout.
                layout: None,
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some(descriptor.vertex_entry),
                    buffers: descriptor.vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some(descriptor.fragment_entry),
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview_mask: None,
                cache: None,
            });
        if let Some(err) = pollster::block_on(error_scope.pop()) {
            return Err(LinkError::Validation {
                label: descriptor.label.to_string(),
                stage: StageKind::Fragment,
                message: err.to_string(),
            });
        }
        Ok(pipeline)
    }
}

impl ProgramLinker for WgpuLinker {
    fn link(&self, descriptor: &ProgramDescriptor<'_>) -> Result<Program, LinkError> {
        // Validate before touching the device so bad sources never reach the driver.
        let program = link_modules(descriptor)?;
        let pipeline = self.create_pipeline(descriptor, &program)?;
        info!("Linked program '{}' into a render pipeline", descriptor.label);
        Ok(program.with_pipeline(pipeline))
    }
}
