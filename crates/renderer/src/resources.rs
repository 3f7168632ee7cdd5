//! Builds the per-canvas GPU state for one shader variant.
//!
//! Initialization compiles both stages, links them, uploads the unit quad and
//! resolves every attribute and uniform location up front so the frame loop
//! never looks anything up by name. A compile or link failure comes back as a
//! [`CanvasError`] carrying the compiler log; any partially created objects
//! are deleted before returning.

use bytemuck::cast_slice;

use crate::backend::{AttributeLocations, BufferKind, QuadBuffers, RenderBackend};
use crate::error::{CanvasError, ShaderStage};
use crate::host::CanvasSize;
use crate::registry::{ShaderRegistry, ShaderVariant};
use crate::uniforms::UniformLocations;

/// Corners of the clip-space square `[-1, 1]²`.
pub const QUAD_POSITIONS: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, 1.0, 1.0, -1.0, 1.0];
/// Texture coordinates matching [`QUAD_POSITIONS`].
pub const QUAD_TEXCOORDS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
/// Two triangles covering the quad.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

pub const POSITION_ATTRIBUTE: &str = "a_position";
pub const TEXCOORD_ATTRIBUTE: &str = "a_texcoord";

/// Everything one canvas needs to draw a variant.
pub struct GpuResources<B: RenderBackend> {
    pub program: B::Program,
    pub quad: QuadBuffers<B::Buffer>,
    pub attributes: AttributeLocations,
    pub uniforms: UniformLocations<B::UniformLocation>,
    pub variant_id: i32,
    pub size: CanvasSize,
}

impl<B: RenderBackend> GpuResources<B> {
    pub fn index_count(&self) -> u32 {
        QUAD_INDICES.len() as u32
    }

    /// Deletes the program and quad buffers. Consumes the set so it cannot be
    /// drawn with afterwards.
    pub fn release(self, backend: &mut B) {
        tracing::debug!(variant = self.variant_id, "releasing canvas GPU resources");
        backend.delete_program(self.program);
        backend.delete_buffer(self.quad.positions);
        backend.delete_buffer(self.quad.texcoords);
        backend.delete_buffer(self.quad.indices);
    }
}

/// Compiles, links and uploads everything needed to draw `variant`.
pub fn initialize<B: RenderBackend>(
    backend: &mut B,
    registry: &ShaderRegistry,
    variant: &ShaderVariant,
    size: CanvasSize,
) -> Result<GpuResources<B>, CanvasError> {
    let program = build_program(backend, registry.vertex_source(), variant)?;

    let quad = match upload_quad(backend) {
        Ok(quad) => quad,
        Err(err) => {
            backend.delete_program(program);
            return Err(err);
        }
    };

    let attributes = AttributeLocations {
        position: backend.attribute_location(&program, POSITION_ATTRIBUTE),
        texcoord: backend.attribute_location(&program, TEXCOORD_ATTRIBUTE),
    };
    let uniforms = UniformLocations::resolve(backend, &program);

    tracing::debug!(
        variant = variant.id,
        name = %variant.display_name,
        width = size.width,
        height = size.height,
        uniforms = uniforms.resolved_count(),
        "initialized canvas GPU resources"
    );

    Ok(GpuResources {
        program,
        quad,
        attributes,
        uniforms,
        variant_id: variant.id,
        size,
    })
}

fn build_program<B: RenderBackend>(
    backend: &mut B,
    vertex_source: &str,
    variant: &ShaderVariant,
) -> Result<B::Program, CanvasError> {
    let vertex = backend
        .compile_shader(ShaderStage::Vertex, vertex_source)
        .map_err(|log| CanvasError::Compile {
            stage: ShaderStage::Vertex,
            variant: variant.id,
            log,
        })?;

    let fragment = match backend.compile_shader(ShaderStage::Fragment, &variant.fragment_source) {
        Ok(shader) => shader,
        Err(log) => {
            backend.delete_shader(vertex);
            return Err(CanvasError::Compile {
                stage: ShaderStage::Fragment,
                variant: variant.id,
                log,
            });
        }
    };

    let linked = backend.link_program(&vertex, &fragment);
    backend.delete_shader(vertex);
    backend.delete_shader(fragment);
    linked.map_err(|log| CanvasError::Link {
        variant: variant.id,
        log,
    })
}

fn upload_quad<B: RenderBackend>(backend: &mut B) -> Result<QuadBuffers<B::Buffer>, CanvasError> {
    let positions = backend
        .create_buffer(BufferKind::Vertex, cast_slice(&QUAD_POSITIONS))
        .map_err(|err| CanvasError::resource("position buffer", err))?;
    let texcoords = match backend.create_buffer(BufferKind::Vertex, cast_slice(&QUAD_TEXCOORDS)) {
        Ok(buffer) => buffer,
        Err(err) => {
            backend.delete_buffer(positions);
            return Err(CanvasError::resource("texcoord buffer", err));
        }
    };
    let indices = match backend.create_buffer(BufferKind::Index, cast_slice(&QUAD_INDICES)) {
        Ok(buffer) => buffer,
        Err(err) => {
            backend.delete_buffer(positions);
            backend.delete_buffer(texcoords);
            return Err(CanvasError::resource("index buffer", err));
        }
    };
    Ok(QuadBuffers {
        positions,
        texcoords,
        indices,
    })
}
