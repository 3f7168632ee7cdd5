use std::time::Instant;

use crate::backend::RenderBackend;
use crate::resources::GpuResources;
use crate::uniforms::{self, RenderState};

/// Background cleared before each draw; the quad covers it entirely.
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Token for one scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// The host environment's "call me on the next frame" facility.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameRequest;
    /// Withdraws a request. The environment may still deliver it; the loop
    /// ignores deliveries it no longer expects.
    fn cancel_frame(&mut self, request: FrameRequest);
}

/// Result of delivering a frame callback to a [`FrameLoop`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Drawn { elapsed_seconds: f32, frame: u64 },
    /// The loop was cancelled or the request is stale; nothing was touched.
    Skipped,
}

/// Free-running repaint loop for one canvas.
///
/// The loop is its own cancellation handle: after [`FrameLoop::cancel`] every
/// delivery is skipped, including one that was already queued.
#[derive(Debug)]
pub struct FrameLoop {
    start_time: Instant,
    pending: Option<FrameRequest>,
    frames: u64,
    cancelled: bool,
}

impl FrameLoop {
    /// Captures the start time and schedules the first frame.
    pub fn start<S: FrameScheduler>(scheduler: &mut S, now: Instant) -> Self {
        let request = scheduler.request_frame();
        tracing::trace!(request = request.0, "frame loop started");
        Self {
            start_time: now,
            pending: Some(request),
            frames: 0,
            cancelled: false,
        }
    }

    pub fn tick<B, S>(
        &mut self,
        request: FrameRequest,
        now: Instant,
        backend: &mut B,
        resources: &GpuResources<B>,
        state: &RenderState,
        scheduler: &mut S,
    ) -> FrameOutcome
    where
        B: RenderBackend,
        S: FrameScheduler,
    {
        if self.cancelled || self.pending != Some(request) {
            return FrameOutcome::Skipped;
        }
        self.pending = None;

        let elapsed_seconds = now.saturating_duration_since(self.start_time).as_secs_f32();
        let frame_state = RenderState {
            elapsed_seconds,
            ..*state
        };

        backend.use_program(&resources.program);
        uniforms::bind(backend, resources, &frame_state);
        backend.clear(CLEAR_COLOR);
        if let Err(err) = backend.draw(&resources.quad, &resources.attributes, resources.index_count())
        {
            tracing::warn!(error = %err, "draw failed; retrying next frame");
        }

        let frame = self.frames;
        self.frames = self.frames.saturating_add(1);
        self.pending = Some(scheduler.request_frame());

        FrameOutcome::Drawn {
            elapsed_seconds,
            frame,
        }
    }

    /// Stops the loop. Safe to call more than once.
    pub fn cancel<S: FrameScheduler>(&mut self, scheduler: &mut S) {
        if let Some(request) = self.pending.take() {
            scheduler.cancel_frame(request);
        }
        if !self.cancelled {
            tracing::trace!(frames = self.frames, "frame loop cancelled");
        }
        self.cancelled = true;
    }

    pub fn is_active(&self) -> bool {
        !self.cancelled
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }
}
