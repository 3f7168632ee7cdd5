//! Desktop host environment: one winit window per canvas.
//!
//! Each window gets its own [`CanvasHost`] driving a [`WgpuBackend`]. The
//! per-frame facility is `Window::request_redraw`, answered by
//! `WindowEvent::RedrawRequested`.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::frame::{FrameRequest, FrameScheduler};
use crate::gpu::WgpuBackend;
use crate::host::{CanvasCallbacks, CanvasElement, CanvasHost, CanvasProps, CanvasSize};
use crate::registry::ShaderRegistry;

/// One window to open.
#[derive(Debug, Clone)]
pub struct PreviewCanvas {
    pub name: String,
    pub title: String,
    pub props: CanvasProps,
}

pub struct PreviewConfig {
    pub registry: Arc<ShaderRegistry>,
    pub canvases: Vec<PreviewCanvas>,
}

/// Frame scheduler backed by winit redraw requests.
pub struct RedrawScheduler {
    window: Arc<Window>,
    next: u64,
    due: Option<FrameRequest>,
}

impl RedrawScheduler {
    fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            next: 0,
            due: None,
        }
    }

    /// The request a `RedrawRequested` event answers, if one is outstanding.
    fn take_due(&mut self) -> Option<FrameRequest> {
        self.due.take()
    }
}

impl FrameScheduler for RedrawScheduler {
    fn request_frame(&mut self) -> FrameRequest {
        self.next += 1;
        let request = FrameRequest(self.next);
        self.due = Some(request);
        self.window.request_redraw();
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.due == Some(request) {
            self.due = None;
        }
    }
}

struct WindowElement {
    window: Arc<Window>,
}

impl CanvasElement for WindowElement {
    type Context = WgpuBackend;

    fn acquire_context(&mut self, size: CanvasSize) -> Option<WgpuBackend> {
        match WgpuBackend::new(Arc::clone(&self.window), size) {
            Ok(backend) => Some(backend),
            Err(err) => {
                tracing::warn!(error = ?err, "failed to create GPU context for window");
                None
            }
        }
    }
}

struct PreviewWindow {
    window: Arc<Window>,
    host: CanvasHost<WgpuBackend, RedrawScheduler>,
}

/// Opens every canvas and runs until the last window closes.
pub fn run_preview(config: PreviewConfig) -> Result<()> {
    if config.canvases.is_empty() {
        return Err(anyhow!("no canvases to preview"));
    }

    let event_loop = EventLoopBuilder::new()
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

    let mut windows = Vec::with_capacity(config.canvases.len());
    for canvas in config.canvases {
        let size = canvas.props.size;
        let window = WindowBuilder::new()
            .with_title(&canvas.title)
            .with_inner_size(PhysicalSize::new(size.width.max(1), size.height.max(1)))
            .build(&event_loop)
            .map_err(|err| anyhow!("failed to create window for canvas {}: {err}", canvas.name))?;
        let window = Arc::new(window);

        let callbacks = CanvasCallbacks {
            on_click: Some(Box::new({
                let name = canvas.name.clone();
                move |pointer| {
                    tracing::info!(canvas = %name, x = pointer.x, y = pointer.y, "canvas clicked")
                }
            })),
            ..CanvasCallbacks::default()
        };
        let mut host = CanvasHost::new(
            canvas.name,
            Arc::clone(&config.registry),
            canvas.props,
            RedrawScheduler::new(Arc::clone(&window)),
        )
        .with_callbacks(callbacks);
        host.mount(&mut WindowElement { window: Arc::clone(&window) }, Instant::now());
        windows.push(PreviewWindow { window, host });
    }

    tracing::info!(
        windows = windows.len(),
        "preview running; keys: 1 primary, 2 secondary, F center fade, Tab/Space next shader, R reinitialize, Esc close"
    );

    let registry = config.registry;
    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            let Event::WindowEvent { window_id, event } = event else {
                return;
            };
            let Some(index) = windows.iter().position(|entry| entry.window.id() == window_id)
            else {
                return;
            };

            let close = handle_window_event(&mut windows[index], &registry, event);
            if close {
                let mut closed = windows.remove(index);
                closed.host.unmount();
                tracing::debug!(canvas = closed.host.name(), "window closed");
                if windows.is_empty() {
                    elwt.exit();
                }
            }
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}

/// Returns true when the window should close.
fn handle_window_event(entry: &mut PreviewWindow, registry: &ShaderRegistry, event: WindowEvent) -> bool {
    let host = &mut entry.host;
    match event {
        WindowEvent::CloseRequested | WindowEvent::Destroyed => return true,
        WindowEvent::RedrawRequested => {
            if let Some(request) = host.scheduler_mut().take_due() {
                host.on_frame(request, Instant::now());
            }
        }
        WindowEvent::Resized(size) => {
            let mut props = *host.props();
            props.size = CanvasSize::new(size.width, size.height);
            if !props.size.is_empty() {
                host.update_props(props, Instant::now());
            }
        }
        WindowEvent::CursorMoved { position, .. } => {
            host.pointer_move(position.x, position.y);
        }
        WindowEvent::CursorLeft { .. } => host.pointer_leave(),
        WindowEvent::MouseInput {
            state: ElementState::Pressed,
            button: MouseButton::Left,
            ..
        } => host.click(),
        WindowEvent::KeyboardInput { event, .. } => {
            if event.state != ElementState::Pressed || event.repeat {
                return false;
            }
            match preview_key(&event.logical_key) {
                Some(PreviewKey::Close) => return true,
                Some(key) => apply_key(host, registry, key),
                None => {}
            }
        }
        _ => {}
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreviewKey {
    TogglePrimary,
    ToggleSecondary,
    ToggleCenterFade,
    NextShader,
    Reinitialize,
    Close,
}

fn preview_key(key: &Key) -> Option<PreviewKey> {
    match key {
        Key::Named(NamedKey::Tab | NamedKey::Space) => Some(PreviewKey::NextShader),
        Key::Named(NamedKey::Escape) => Some(PreviewKey::Close),
        Key::Character(value) => match value.to_ascii_lowercase().as_str() {
            "1" => Some(PreviewKey::TogglePrimary),
            "2" => Some(PreviewKey::ToggleSecondary),
            "f" => Some(PreviewKey::ToggleCenterFade),
            "r" => Some(PreviewKey::Reinitialize),
            _ => None,
        },
        _ => None,
    }
}

fn apply_key(
    host: &mut CanvasHost<WgpuBackend, RedrawScheduler>,
    registry: &ShaderRegistry,
    key: PreviewKey,
) {
    let now = Instant::now();
    let mut props = *host.props();
    match key {
        PreviewKey::TogglePrimary => props.flags.primary_condition = !props.flags.primary_condition,
        PreviewKey::ToggleSecondary => {
            props.flags.secondary_condition = !props.flags.secondary_condition
        }
        PreviewKey::ToggleCenterFade => {
            props.flags.suppress_center_fade = !props.flags.suppress_center_fade
        }
        PreviewKey::NextShader => props.shader_id = registry.next_id(props.shader_id),
        PreviewKey::Reinitialize => {
            host.reinitialize(now);
            return;
        }
        PreviewKey::Close => return,
    }
    tracing::info!(
        canvas = host.name(),
        shader = props.shader_id,
        primary = props.flags.primary_condition,
        secondary = props.flags.secondary_condition,
        suppress_center_fade = props.flags.suppress_center_fade,
        "canvas props changed"
    );
    host.update_props(props, now);
}
