//! Lifecycle owner for one shader canvas.
//!
//! ```text
//!   Unmounted ──mount──▶ Initializing ──ok──▶ Running ◀──▶ Reinitializing
//!                            │                  │
//!                            ├─no context──▶ Blank(ContextUnavailable)
//!                            └─compile/link─▶ Blank(ShaderFailed)
//!   any ──unmount──▶ TornDown
//! ```
//!
//! The host owns the rendering context, the GPU resources and the frame loop
//! of exactly one canvas. Whenever resources go away (shader change, size
//! change, unmount, drop) the frame loop is cancelled first so no queued frame
//! can reach released handles.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::RenderBackend;
use crate::error::CanvasError;
use crate::frame::{FrameLoop, FrameOutcome, FrameRequest, FrameScheduler};
use crate::registry::ShaderRegistry;
use crate::resources::{self, GpuResources};
use crate::uniforms::{PointerPosition, RenderFlags, RenderState};

/// Canvas backing-store size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Inputs supplied by the hosting page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasProps {
    pub shader_id: i32,
    pub size: CanvasSize,
    pub flags: RenderFlags,
}

impl CanvasProps {
    pub fn new(shader_id: i32, size: CanvasSize) -> Self {
        Self {
            shader_id,
            size,
            flags: RenderFlags::default(),
        }
    }

    pub fn with_flags(mut self, flags: RenderFlags) -> Self {
        self.flags = flags;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankReason {
    /// No rendering context could be acquired; permanent for this instance.
    ContextUnavailable,
    /// The selected variant failed to compile or link.
    ShaderFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasPhase {
    Unmounted,
    Initializing,
    Running,
    Reinitializing,
    Blank(BlankReason),
    TornDown,
}

/// Source of a rendering context, e.g. a window or an offscreen surface.
pub trait CanvasElement {
    type Context: RenderBackend;

    /// Returns `None` when the environment cannot render on the GPU.
    fn acquire_context(&mut self, size: CanvasSize) -> Option<Self::Context>;
}

pub type PointerCallback = Box<dyn FnMut(PointerPosition)>;

/// Optional hooks invoked with the normalized pointer position.
#[derive(Default)]
pub struct CanvasCallbacks {
    pub on_click: Option<PointerCallback>,
    pub on_pointer_move: Option<PointerCallback>,
    pub on_pointer_leave: Option<PointerCallback>,
}

struct LiveCanvas<B: RenderBackend> {
    resources: GpuResources<B>,
    frames: FrameLoop,
}

pub struct CanvasHost<B: RenderBackend, S: FrameScheduler> {
    name: String,
    registry: Arc<ShaderRegistry>,
    props: CanvasProps,
    callbacks: CanvasCallbacks,
    scheduler: S,
    context: Option<B>,
    live: Option<LiveCanvas<B>>,
    phase: CanvasPhase,
    pointer: PointerPosition,
    fault: Option<CanvasError>,
}

impl<B: RenderBackend, S: FrameScheduler> CanvasHost<B, S> {
    pub fn new(
        name: impl Into<String>,
        registry: Arc<ShaderRegistry>,
        props: CanvasProps,
        scheduler: S,
    ) -> Self {
        Self {
            name: name.into(),
            registry,
            props,
            callbacks: CanvasCallbacks::default(),
            scheduler,
            context: None,
            live: None,
            phase: CanvasPhase::Unmounted,
            pointer: PointerPosition::CENTER,
            fault: None,
        }
    }

    pub fn with_callbacks(mut self, callbacks: CanvasCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Acquires the rendering context and builds the first program.
    pub fn mount<E>(&mut self, element: &mut E, now: Instant)
    where
        E: CanvasElement<Context = B>,
    {
        if self.phase != CanvasPhase::Unmounted {
            tracing::warn!(canvas = %self.name, phase = ?self.phase, "mount ignored; canvas already mounted");
            return;
        }

        self.set_phase(CanvasPhase::Initializing);
        match element.acquire_context(self.props.size) {
            Some(context) => {
                self.context = Some(context);
                self.build(now);
            }
            None => {
                tracing::error!(
                    canvas = %self.name,
                    "GPU rendering is not available; canvas will stay blank"
                );
                self.fault = Some(CanvasError::ContextUnavailable);
                self.set_phase(CanvasPhase::Blank(BlankReason::ContextUnavailable));
            }
        }
    }

    /// Applies new props. A different shader id or pixel size rebuilds the GPU
    /// state; flag changes take effect on the next frame.
    pub fn update_props(&mut self, next: CanvasProps, now: Instant) {
        let previous = std::mem::replace(&mut self.props, next);
        let rebuild = previous.shader_id != next.shader_id || previous.size != next.size;

        match self.phase {
            CanvasPhase::TornDown => {
                tracing::warn!(canvas = %self.name, "props update after unmount ignored");
            }
            CanvasPhase::Unmounted | CanvasPhase::Blank(BlankReason::ContextUnavailable) => {}
            _ if rebuild => {
                tracing::debug!(
                    canvas = %self.name,
                    from_shader = previous.shader_id,
                    to_shader = next.shader_id,
                    from_size = %previous.size,
                    to_size = %next.size,
                    "canvas props require reinitialization"
                );
                self.rebuild(now);
            }
            _ => {}
        }
    }

    /// Tears down and rebuilds the GPU state with the current props.
    pub fn reinitialize(&mut self, now: Instant) {
        match self.phase {
            CanvasPhase::Running | CanvasPhase::Blank(BlankReason::ShaderFailed) => {
                self.rebuild(now)
            }
            phase => {
                tracing::debug!(canvas = %self.name, ?phase, "reinitialize ignored");
            }
        }
    }

    /// Delivers a frame callback from the host environment.
    pub fn on_frame(&mut self, request: FrameRequest, now: Instant) -> FrameOutcome {
        let (Some(live), Some(context)) = (self.live.as_mut(), self.context.as_mut()) else {
            return FrameOutcome::Skipped;
        };
        let state = RenderState {
            elapsed_seconds: 0.0,
            pointer: self.pointer,
            flags: self.props.flags,
        };
        live.frames.tick(
            request,
            now,
            context,
            &live.resources,
            &state,
            &mut self.scheduler,
        )
    }

    /// Releases everything. The host cannot be mounted again.
    pub fn unmount(&mut self) {
        if self.phase == CanvasPhase::TornDown {
            return;
        }
        self.teardown_live();
        self.context = None;
        self.set_phase(CanvasPhase::TornDown);
    }

    /// Records a pointer move in canvas-local coordinates (origin top-left,
    /// same units as the canvas size).
    pub fn pointer_move(&mut self, x: f64, y: f64) -> PointerPosition {
        if self.phase == CanvasPhase::TornDown {
            return self.pointer;
        }
        self.pointer = PointerPosition::from_canvas(
            x,
            y,
            f64::from(self.props.size.width),
            f64::from(self.props.size.height),
        );
        if let Some(callback) = self.callbacks.on_pointer_move.as_mut() {
            callback(self.pointer);
        }
        self.pointer
    }

    pub fn pointer_leave(&mut self) {
        if self.phase == CanvasPhase::TornDown {
            return;
        }
        self.pointer = PointerPosition::CENTER;
        if let Some(callback) = self.callbacks.on_pointer_leave.as_mut() {
            callback(self.pointer);
        }
    }

    pub fn click(&mut self) {
        if self.phase == CanvasPhase::TornDown {
            return;
        }
        if let Some(callback) = self.callbacks.on_click.as_mut() {
            callback(self.pointer);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> CanvasPhase {
        self.phase
    }

    pub fn props(&self) -> &CanvasProps {
        &self.props
    }

    pub fn pointer(&self) -> PointerPosition {
        self.pointer
    }

    /// The most recent failure, cleared once a program builds successfully.
    pub fn fault(&self) -> Option<&CanvasError> {
        self.fault.as_ref()
    }

    /// Variant id of the program currently drawing, if any.
    pub fn active_variant(&self) -> Option<i32> {
        self.live.as_ref().map(|live| live.resources.variant_id)
    }

    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.live.as_ref().and_then(|live| live.frames.pending())
    }

    pub fn frames_drawn(&self) -> u64 {
        self.live
            .as_ref()
            .map(|live| live.frames.frames_drawn())
            .unwrap_or(0)
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn context(&self) -> Option<&B> {
        self.context.as_ref()
    }

    fn rebuild(&mut self, now: Instant) {
        self.set_phase(CanvasPhase::Reinitializing);
        self.teardown_live();
        self.build(now);
    }

    fn build(&mut self, now: Instant) {
        let Some(context) = self.context.as_mut() else {
            return;
        };

        let registry = Arc::clone(&self.registry);
        if !registry.contains(self.props.shader_id) {
            tracing::warn!(
                canvas = %self.name,
                requested = self.props.shader_id,
                fallback = registry.lookup(self.props.shader_id).id,
                "unknown shader id; using the default variant"
            );
        }
        let variant = registry.lookup(self.props.shader_id);

        if context.drawable_size() != self.props.size {
            context.resize(self.props.size);
        }

        match resources::initialize(context, &registry, variant, self.props.size) {
            Ok(resources) => {
                let frames = FrameLoop::start(&mut self.scheduler, now);
                self.live = Some(LiveCanvas { resources, frames });
                self.fault = None;
                tracing::info!(
                    canvas = %self.name,
                    variant = variant.id,
                    name = %variant.display_name,
                    size = %self.props.size,
                    "canvas running"
                );
                self.set_phase(CanvasPhase::Running);
            }
            Err(err) => {
                match err.diagnostic_log() {
                    Some(log) => tracing::error!(
                        canvas = %self.name,
                        variant = variant.id,
                        "shader build failed: {err}\n{log}"
                    ),
                    None => tracing::error!(canvas = %self.name, variant = variant.id, "shader build failed: {err}"),
                }
                self.fault = Some(err);
                self.set_phase(CanvasPhase::Blank(BlankReason::ShaderFailed));
            }
        }
    }

    /// Cancels the frame loop, then releases the resources it was drawing.
    fn teardown_live(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        live.frames.cancel(&mut self.scheduler);
        match self.context.as_mut() {
            Some(context) => live.resources.release(context),
            None => tracing::warn!(canvas = %self.name, "resources outlived their context"),
        }
    }

    fn set_phase(&mut self, next: CanvasPhase) {
        if self.phase != next {
            tracing::debug!(canvas = %self.name, from = ?self.phase, to = ?next, "canvas phase changed");
            self.phase = next;
        }
    }
}

impl<B: RenderBackend, S: FrameScheduler> Drop for CanvasHost<B, S> {
    fn drop(&mut self) {
        self.teardown_live();
    }
}
