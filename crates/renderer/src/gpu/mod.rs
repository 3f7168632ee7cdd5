//! wgpu implementation of [`RenderBackend`].
//!
//! Shader sources are written against the GLSL ES 3.00 dialect and translated
//! by [`compile`] before naga sees them. A "program" is a render pipeline plus
//! its own uniform buffer; uniform writes land in a CPU-side staging block
//! that is uploaded right before each draw.

mod compile;
mod context;
mod pipeline;
mod uniforms;

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::backend::{AttributeLocations, BufferKind, QuadBuffers, RenderBackend, UniformValue};
use crate::error::ShaderStage;
use crate::host::CanvasSize;
use crate::uniforms::UniformName;

use self::compile::TranslatedShader;
use self::context::GpuContext;
use self::uniforms::CanvasUniforms;

pub struct WgpuShader {
    stage: ShaderStage,
    module: wgpu::ShaderModule,
    translated: TranslatedShader,
}

pub struct WgpuProgram {
    id: u64,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    declared: Vec<UniformName>,
    inputs: Vec<(String, u32)>,
}

pub struct WgpuBuffer {
    kind: BufferKind,
    buffer: wgpu::Buffer,
}

struct ActiveProgram {
    id: u64,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// Rendering context for one window surface.
pub struct WgpuBackend {
    gpu: GpuContext,
    uniform_layout: wgpu::BindGroupLayout,
    staging: CanvasUniforms,
    clear_color: wgpu::Color,
    active: Option<ActiveProgram>,
    next_program: u64,
}

impl WgpuBackend {
    pub fn new(window: Arc<Window>, size: CanvasSize) -> Result<Self> {
        let gpu = GpuContext::new(window, size)?;
        let uniform_layout = pipeline::uniform_layout(&gpu.device);
        Ok(Self {
            gpu,
            uniform_layout,
            staging: CanvasUniforms::default(),
            clear_color: wgpu::Color::BLACK,
            active: None,
            next_program: 0,
        })
    }

    fn acquire_frame(&mut self) -> Result<wgpu::SurfaceTexture> {
        match self.gpu.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.gpu.reconfigure();
                bail!("surface was lost; reconfigured for the next frame")
            }
            Err(err) => Err(anyhow!("failed to acquire surface texture: {err}")),
        }
    }
}

impl RenderBackend for WgpuBackend {
    type Shader = WgpuShader;
    type Program = WgpuProgram;
    type Buffer = WgpuBuffer;
    type UniformLocation = UniformName;

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<WgpuShader, String> {
        let translated = compile::translate_glsl_es(source, stage)?;
        let module = compile::compile_module(&self.gpu.device, &translated, stage)?;
        Ok(WgpuShader {
            stage,
            module,
            translated,
        })
    }

    fn link_program(
        &mut self,
        vertex: &WgpuShader,
        fragment: &WgpuShader,
    ) -> Result<WgpuProgram, String> {
        if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
            return Err(format!(
                "expected a vertex and a fragment shader, got {} and {}",
                vertex.stage, fragment.stage
            ));
        }

        let inputs = vertex.translated.inputs.clone();
        let lookup = |name: &str| {
            inputs
                .iter()
                .find(|(input, _)| input == name)
                .map(|(_, location)| *location)
        };
        let attributes = AttributeLocations {
            position: lookup(crate::resources::POSITION_ATTRIBUTE),
            texcoord: lookup(crate::resources::TEXCOORD_ATTRIBUTE),
        };

        let mut declared = vertex.translated.declared_uniforms.clone();
        for uniform in &fragment.translated.declared_uniforms {
            if !declared.contains(uniform) {
                declared.push(*uniform);
            }
        }

        let device = &self.gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("canvas uniforms"),
            contents: bytemuck::bytes_of(&CanvasUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("canvas uniform bind group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let pipeline = pipeline::quad_pipeline(
            device,
            &self.uniform_layout,
            &vertex.module,
            &fragment.module,
            self.gpu.surface_format,
            &attributes,
        );
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            uniform_buffer.destroy();
            return Err(err.to_string());
        }

        let id = self.next_program;
        self.next_program += 1;
        tracing::trace!(program = id, uniforms = declared.len(), "linked canvas pipeline");
        Ok(WgpuProgram {
            id,
            pipeline,
            uniform_buffer,
            bind_group,
            declared,
            inputs,
        })
    }

    fn delete_shader(&mut self, shader: WgpuShader) {
        drop(shader);
    }

    fn delete_program(&mut self, program: WgpuProgram) {
        if self.active.as_ref().map(|active| active.id) == Some(program.id) {
            self.active = None;
        }
        program.uniform_buffer.destroy();
        tracing::trace!(program = program.id, "deleted canvas pipeline");
    }

    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<WgpuBuffer> {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self
            .gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(match kind {
                    BufferKind::Vertex => "canvas vertex buffer",
                    BufferKind::Index => "canvas index buffer",
                }),
                contents,
                usage,
            });
        Ok(WgpuBuffer { kind, buffer })
    }

    fn delete_buffer(&mut self, buffer: WgpuBuffer) {
        buffer.buffer.destroy();
    }

    fn attribute_location(&mut self, program: &WgpuProgram, name: &str) -> Option<u32> {
        program
            .inputs
            .iter()
            .find(|(input, _)| input == name)
            .map(|(_, location)| *location)
    }

    fn uniform_location(&mut self, program: &WgpuProgram, name: &str) -> Option<UniformName> {
        UniformName::from_name(name).filter(|uniform| program.declared.contains(uniform))
    }

    fn use_program(&mut self, program: &WgpuProgram) {
        self.active = Some(ActiveProgram {
            id: program.id,
            pipeline: program.pipeline.clone(),
            uniform_buffer: program.uniform_buffer.clone(),
            bind_group: program.bind_group.clone(),
        });
    }

    fn set_uniform(&mut self, location: &UniformName, value: UniformValue) {
        if !self.staging.apply(*location, value) {
            tracing::warn!(uniform = location.as_str(), ?value, "uniform type mismatch; value ignored");
        }
    }

    fn clear(&mut self, color: [f32; 4]) {
        let [r, g, b, a] = color.map(f64::from);
        self.clear_color = wgpu::Color { r, g, b, a };
    }

    fn draw(
        &mut self,
        quad: &QuadBuffers<WgpuBuffer>,
        _attributes: &AttributeLocations,
        index_count: u32,
    ) -> Result<()> {
        if quad.indices.kind != BufferKind::Index {
            bail!("quad index buffer was created as a vertex buffer");
        }
        let Some(active) = self.active.as_ref() else {
            bail!("draw called without a program in use");
        };
        let (pipeline, bind_group, uniform_buffer) = (
            active.pipeline.clone(),
            active.bind_group.clone(),
            active.uniform_buffer.clone(),
        );

        self.gpu
            .queue
            .write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&self.staging));

        let frame = self.acquire_frame()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("canvas frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("canvas pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, quad.positions.buffer.slice(..));
            pass.set_vertex_buffer(1, quad.texcoords.buffer.slice(..));
            pass.set_index_buffer(quad.indices.buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..index_count, 0, 0..1);
        }
        self.gpu.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn resize(&mut self, size: CanvasSize) {
        self.gpu.resize(size);
    }

    fn drawable_size(&self) -> CanvasSize {
        self.gpu.size()
    }
}
