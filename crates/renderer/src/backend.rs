//! The seam between the canvas component and whatever GPU API draws it.
//!
//! The trait is deliberately shaped like a WebGL context: shaders are compiled
//! and linked into programs, geometry lives in buffers, and inputs are pushed
//! through named uniform locations that are resolved once per program. The
//! wgpu implementation lives in `gpu`; tests drive the component through a
//! recording implementation instead.

use anyhow::Result;

use crate::error::ShaderStage;
use crate::host::CanvasSize;

/// How a buffer's contents are consumed by the draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// A value written into a uniform slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Bool(bool),
}

/// Attribute slots for the two per-vertex inputs of the unit quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeLocations {
    pub position: Option<u32>,
    pub texcoord: Option<u32>,
}

/// Buffers backing the full-canvas quad.
#[derive(Debug)]
pub struct QuadBuffers<T> {
    pub positions: T,
    pub texcoords: T,
    pub indices: T,
}

/// A rendering context bound to one canvas.
///
/// Every method operates on the canvas this context was created for; nothing is
/// shared between contexts.
pub trait RenderBackend {
    type Shader;
    type Program;
    type Buffer;
    type UniformLocation: Clone;

    /// Compiles a single stage. On failure the error carries the compiler log.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String>;

    /// Links a vertex/fragment pair. On failure the error carries the link log.
    fn link_program(
        &mut self,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
    ) -> Result<Self::Program, String>;

    fn delete_shader(&mut self, shader: Self::Shader);

    fn delete_program(&mut self, program: Self::Program);

    fn create_buffer(&mut self, kind: BufferKind, contents: &[u8]) -> Result<Self::Buffer>;

    fn delete_buffer(&mut self, buffer: Self::Buffer);

    fn attribute_location(&mut self, program: &Self::Program, name: &str) -> Option<u32>;

    /// Resolves a uniform by name. `None` means the program does not declare it.
    fn uniform_location(
        &mut self,
        program: &Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;

    /// Makes `program` current for subsequent uniform writes and draws.
    fn use_program(&mut self, program: &Self::Program);

    fn set_uniform(&mut self, location: &Self::UniformLocation, value: UniformValue);

    fn clear(&mut self, color: [f32; 4]);

    /// Draws `index_count` indices of the quad with the current program.
    fn draw(
        &mut self,
        quad: &QuadBuffers<Self::Buffer>,
        attributes: &AttributeLocations,
        index_count: u32,
    ) -> Result<()>;

    /// Resizes the drawable backing store to `size` pixels.
    fn resize(&mut self, size: CanvasSize);

    /// Current drawable size in pixels.
    fn drawable_size(&self) -> CanvasSize;
}
