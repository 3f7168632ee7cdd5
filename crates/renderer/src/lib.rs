//! Animated shader canvas for the Lagentry site.
//!
//! A canvas draws one full-screen quad with a fragment shader picked from a
//! [`ShaderRegistry`] and repaints it every frame. The overall flow is:
//!
//! ```text
//!   CanvasProps ─▶ CanvasHost::mount ─▶ resources::initialize ─▶ FrameLoop::start
//!                        │                                           │
//!                 update_props                              on_frame(request)
//!                        │                                           │
//!                        ▼                                           ▼
//!          cancel ─▶ release ─▶ initialize            use_program ─▶ uniforms::bind ─▶ draw
//! ```
//!
//! [`CanvasHost`] is independent of any windowing system and GPU API: it talks
//! to a [`RenderBackend`] and a [`FrameScheduler`]. [`gpu::WgpuBackend`] and
//! [`preview`] plug it into wgpu and winit for the desktop preview.

pub mod backend;
mod error;
pub mod frame;
pub mod gpu;
pub mod host;
pub mod preview;
pub mod registry;
pub mod resources;
pub mod uniforms;

pub use backend::{AttributeLocations, BufferKind, QuadBuffers, RenderBackend, UniformValue};
pub use error::{CanvasError, ShaderStage};
pub use frame::{FrameLoop, FrameOutcome, FrameRequest, FrameScheduler, CLEAR_COLOR};
pub use host::{
    BlankReason, CanvasCallbacks, CanvasElement, CanvasHost, CanvasPhase, CanvasProps, CanvasSize,
    PointerCallback,
};
pub use preview::{run_preview, PreviewCanvas, PreviewConfig};
pub use registry::{RegistryError, ShaderRegistry, ShaderRegistryBuilder, ShaderVariant};
pub use uniforms::{PointerPosition, RenderFlags, RenderState, UniformName};
