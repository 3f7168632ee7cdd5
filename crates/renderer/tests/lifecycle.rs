mod support;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use renderer::{
    BlankReason, BufferKind, CanvasCallbacks, CanvasError, CanvasPhase, CanvasProps, CanvasSize,
    FrameOutcome, PointerPosition, RenderBackend, RenderFlags, ShaderRegistry, ShaderStage, ShaderVariant,
    UniformName, UniformValue,
};

use support::*;

const SIZE: CanvasSize = CanvasSize::new(600, 600);

fn is_release(call: &Call) -> bool {
    matches!(call, Call::DeleteProgram(_) | Call::DeleteBuffer(_))
}

fn is_cancel(call: &Call) -> bool {
    matches!(call, Call::CancelFrame(_))
}

#[test]
fn mount_initializes_once_and_starts_one_loop() {
    let now = Instant::now();
    let (host, log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(1, SIZE), now);

    assert_eq!(host.phase(), CanvasPhase::Running);
    assert_eq!(host.active_variant(), Some(1));
    assert_eq!(count(&log, |call| matches!(call, Call::LinkProgram { .. })), 1);
    assert_eq!(count(&log, |call| matches!(call, Call::RequestFrame(_))), 1);
    assert_eq!(
        count(&log, |call| matches!(call, Call::CreateBuffer { .. })),
        3
    );
    assert_eq!(
        count(&log, |call| matches!(call, Call::CreateBuffer { kind: BufferKind::Index, .. })),
        1
    );
    assert!(host.fault().is_none());

    let backend = host.context().unwrap();
    assert!(backend.live_shaders.is_empty(), "shaders are deleted after link");
    assert_eq!(backend.live_programs.len(), 1);
    assert_eq!(backend.live_buffers.len(), 3);
}

#[test]
fn frame_binds_uniforms_then_draws_and_reschedules() {
    let start = Instant::now();
    let (mut host, log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(2, SIZE), start);
    let request = host.pending_frame().unwrap();
    clear_log(&log);

    let outcome = host.on_frame(request, start + Duration::from_secs(2));
    assert_eq!(
        outcome,
        FrameOutcome::Drawn {
            elapsed_seconds: 2.0,
            frame: 0
        }
    );

    let calls = log.borrow().clone();
    assert!(matches!(calls.first(), Some(Call::UseProgram(_))));
    let uniform_writes = calls
        .iter()
        .filter(|call| matches!(call, Call::SetUniform { .. }))
        .count();
    assert_eq!(uniform_writes, UniformName::ALL.len());
    assert!(calls.contains(&Call::SetUniform {
        name: UniformName::Time,
        value: UniformValue::Float(2.0),
    }));
    assert!(calls.contains(&Call::SetUniform {
        name: UniformName::Resolution,
        value: UniformValue::Vec2([600.0, 600.0]),
    }));
    assert!(calls.contains(&Call::SetUniform {
        name: UniformName::Pointer,
        value: UniformValue::Vec2([0.5, 0.5]),
    }));

    let clear = position(&log, |call| matches!(call, Call::Clear)).unwrap();
    let draw = position(&log, |call| matches!(call, Call::Draw { index_count: 6, .. })).unwrap();
    let last_uniform = calls
        .iter()
        .rposition(|call| matches!(call, Call::SetUniform { .. }))
        .unwrap();
    assert!(last_uniform < draw);
    assert!(clear < draw);
    assert!(matches!(calls.last(), Some(Call::RequestFrame(_))));
    assert_eq!(host.frames_drawn(), 1);
}

#[test]
fn shader_change_runs_one_teardown_and_reinit_cycle() {
    let now = Instant::now();
    let (mut host, log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(1, SIZE), now);
    let old_program = match log
        .borrow()
        .iter()
        .find(|call| matches!(call, Call::LinkProgram { .. }))
    {
        Some(Call::LinkProgram { program }) => *program,
        _ => unreachable!(),
    };
    let old_request = host.pending_frame().unwrap();
    clear_log(&log);

    host.update_props(CanvasProps::new(2, SIZE), now);

    assert_eq!(host.phase(), CanvasPhase::Running);
    assert_eq!(host.active_variant(), Some(2));
    assert_eq!(count(&log, is_cancel), 1);
    assert!(log.borrow().contains(&Call::CancelFrame(old_request)));
    assert_eq!(count(&log, |call| *call == Call::DeleteProgram(old_program)), 1);
    assert_eq!(count(&log, |call| matches!(call, Call::LinkProgram { .. })), 1);
    assert_eq!(count(&log, |call| matches!(call, Call::RequestFrame(_))), 1);

    let cancel = position(&log, is_cancel).unwrap();
    let release = position(&log, is_release).unwrap();
    let link = position(&log, |call| matches!(call, Call::LinkProgram { .. })).unwrap();
    assert!(cancel < release, "loop must stop before resources are released");
    assert!(release < link);

    assert_eq!(host.on_frame(old_request, now), FrameOutcome::Skipped);
}

#[test]
fn compile_failure_leaves_canvas_blank_without_a_loop() {
    let now = Instant::now();
    let registry = registry_with(ShaderVariant::new(
        9,
        "Broken",
        format!("void main() {{ {SYNTAX_ERROR} }}"),
    ));
    let (mut host, log) = mounted_host(registry, CanvasProps::new(9, SIZE), now);

    assert_eq!(host.phase(), CanvasPhase::Blank(BlankReason::ShaderFailed));
    match host.fault() {
        Some(CanvasError::Compile {
            stage, variant, log, ..
        }) => {
            assert_eq!(*stage, ShaderStage::Fragment);
            assert_eq!(*variant, 9);
            assert!(log.contains("syntax error"));
        }
        other => panic!("unexpected fault {other:?}"),
    }
    assert_eq!(count(&log, |call| matches!(call, Call::RequestFrame(_))), 0);
    assert_eq!(count(&log, |call| matches!(call, Call::CreateBuffer { .. })), 0);
    assert!(host.pending_frame().is_none());
    assert!(host.context().unwrap().live_shaders.is_empty());

    assert_eq!(host.on_frame(renderer::FrameRequest(1), now), FrameOutcome::Skipped);
    assert_eq!(count(&log, |call| matches!(call, Call::Draw { .. })), 0);
}

#[test]
fn link_failure_is_reported_and_recoverable() {
    let now = Instant::now();
    let registry = registry_with(ShaderVariant::new(
        9,
        "Unlinkable",
        format!("// {LINK_ERROR}\nvoid main() {{}}"),
    ));
    let (mut host, log) = mounted_host(registry, CanvasProps::new(9, SIZE), now);

    assert_eq!(host.phase(), CanvasPhase::Blank(BlankReason::ShaderFailed));
    assert!(matches!(host.fault(), Some(CanvasError::Link { variant: 9, .. })));
    assert!(host.context().unwrap().live_shaders.is_empty());
    assert_eq!(count(&log, |call| matches!(call, Call::RequestFrame(_))), 0);

    host.update_props(CanvasProps::new(3, SIZE), now);
    assert_eq!(host.phase(), CanvasPhase::Running);
    assert_eq!(host.active_variant(), Some(3));
    assert!(host.fault().is_none());
}

#[test]
fn pending_frame_after_unmount_does_nothing() {
    let now = Instant::now();
    let (mut host, log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(1, SIZE), now);
    let request = host.pending_frame().unwrap();

    host.unmount();
    assert_eq!(host.phase(), CanvasPhase::TornDown);
    let calls_after_unmount = log.borrow().len();

    assert_eq!(host.on_frame(request, now), FrameOutcome::Skipped);
    assert_eq!(log.borrow().len(), calls_after_unmount);
}

#[test]
fn unmount_cancels_before_releasing_and_frees_everything() {
    let now = Instant::now();
    let (mut host, log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(4, SIZE), now);
    let request = host.pending_frame().unwrap();
    host.on_frame(request, now);

    host.unmount();

    let cancel = position(&log, is_cancel).unwrap();
    let release = position(&log, is_release).unwrap();
    assert!(cancel < release);
    assert_eq!(
        count(&log, |call| matches!(call, Call::CreateBuffer { .. })),
        count(&log, |call| matches!(call, Call::DeleteBuffer(_)))
    );
    assert_eq!(
        count(&log, |call| matches!(call, Call::LinkProgram { .. })),
        count(&log, |call| matches!(call, Call::DeleteProgram(_)))
    );
    assert!(host.context().is_none());

    host.unmount();
    host.update_props(CanvasProps::new(2, SIZE), now);
    assert_eq!(host.phase(), CanvasPhase::TornDown);
}

#[test]
fn size_change_cancels_before_release_and_resizes() {
    let now = Instant::now();
    let (mut host, log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(1, SIZE), now);
    clear_log(&log);

    let bigger = CanvasSize::new(1280, 720);
    host.update_props(CanvasProps::new(1, bigger), now);

    let cancel = position(&log, is_cancel).unwrap();
    let release = position(&log, is_release).unwrap();
    let resize = position(&log, |call| *call == Call::Resize(bigger)).unwrap();
    let link = position(&log, |call| matches!(call, Call::LinkProgram { .. })).unwrap();
    assert!(cancel < release);
    assert!(release < resize);
    assert!(resize < link);
    assert_eq!(host.context().unwrap().drawable_size(), bigger);

    let request = host.pending_frame().unwrap();
    clear_log(&log);
    host.on_frame(request, now);
    assert!(log.borrow().contains(&Call::SetUniform {
        name: UniformName::Resolution,
        value: UniformValue::Vec2([1280.0, 720.0]),
    }));
}

#[test]
fn repeated_reinitialization_does_not_leak() {
    let now = Instant::now();
    let (mut host, log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(3, SIZE), now);

    for _ in 0..5 {
        host.reinitialize(now);
        assert_eq!(host.phase(), CanvasPhase::Running);
    }

    let backend = host.context().unwrap();
    assert_eq!(backend.live_programs.len(), 1);
    assert_eq!(backend.live_buffers.len(), 3);
    assert!(backend.live_shaders.is_empty());
    assert_eq!(count(&log, |call| matches!(call, Call::LinkProgram { .. })), 6);
    assert_eq!(count(&log, is_cancel), 5);
    assert!(host.pending_frame().is_some());
}

#[test]
fn missing_context_stays_blank_without_retrying() {
    let now = Instant::now();
    let (mut host, log) = spy_host(ShaderRegistry::builtin(), CanvasProps::new(1, SIZE));
    let mut element = SpyElement::unavailable(std::rc::Rc::clone(&log));

    host.mount(&mut element, now);
    assert_eq!(host.phase(), CanvasPhase::Blank(BlankReason::ContextUnavailable));
    assert_eq!(host.fault(), Some(&CanvasError::ContextUnavailable));

    host.update_props(CanvasProps::new(2, CanvasSize::new(10, 10)), now);
    host.reinitialize(now);
    host.mount(&mut element, now);

    assert_eq!(element.acquisitions, 1);
    assert!(log.borrow().is_empty());
    assert_eq!(host.phase(), CanvasPhase::Blank(BlankReason::ContextUnavailable));
}

#[test]
fn flag_change_applies_without_reinitializing() {
    let now = Instant::now();
    let (mut host, log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(1, SIZE), now);
    clear_log(&log);

    let flags = RenderFlags {
        primary_condition: true,
        secondary_condition: false,
        suppress_center_fade: true,
    };
    host.update_props(CanvasProps::new(1, SIZE).with_flags(flags), now);
    assert!(log.borrow().is_empty());

    let request = host.pending_frame().unwrap();
    host.on_frame(request, now);
    let calls = log.borrow();
    assert!(calls.contains(&Call::SetUniform {
        name: UniformName::PrimaryCondition,
        value: UniformValue::Bool(true),
    }));
    assert!(calls.contains(&Call::SetUniform {
        name: UniformName::SecondaryCondition,
        value: UniformValue::Bool(false),
    }));
    assert!(calls.contains(&Call::SetUniform {
        name: UniformName::SuppressCenterFade,
        value: UniformValue::Bool(true),
    }));
}

#[test]
fn unknown_shader_id_falls_back_to_first_variant() {
    let now = Instant::now();
    let (host, _log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(77, SIZE), now);
    assert_eq!(host.phase(), CanvasPhase::Running);
    assert_eq!(host.active_variant(), Some(1));
}

#[test]
fn undeclared_uniform_is_skipped() {
    let now = Instant::now();
    let registry = registry_with(ShaderVariant::new(9, "No Pointer", NO_POINTER_FRAGMENT));
    let (mut host, log) = mounted_host(registry, CanvasProps::new(9, SIZE), now);
    let request = host.pending_frame().unwrap();
    clear_log(&log);

    host.on_frame(request, now);
    assert_eq!(
        count(&log, |call| matches!(call, Call::SetUniform { .. })),
        UniformName::ALL.len() - 1
    );
    assert_eq!(
        count(&log, |call| matches!(
            call,
            Call::SetUniform {
                name: UniformName::Pointer,
                ..
            }
        )),
        0
    );
    assert_eq!(count(&log, |call| matches!(call, Call::Draw { .. })), 1);
}

#[test]
fn stale_frame_request_is_ignored() {
    let now = Instant::now();
    let (mut host, log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(1, SIZE), now);
    let current = host.pending_frame().unwrap();
    clear_log(&log);

    let stale = renderer::FrameRequest(current.0 + 100);
    assert_eq!(host.on_frame(stale, now), FrameOutcome::Skipped);
    assert!(log.borrow().is_empty());
    assert_eq!(host.pending_frame(), Some(current));
}

#[test]
fn pointer_moves_are_normalized_and_leave_resets_to_center() {
    let now = Instant::now();
    let (mut host, log) = mounted_host(
        ShaderRegistry::builtin(),
        CanvasProps::new(1, CanvasSize::new(200, 100)),
        now,
    );
    clear_log(&log);

    let pointer = host.pointer_move(50.0, 25.0);
    assert_eq!(pointer, PointerPosition { x: 0.25, y: 0.75 });
    assert!(log.borrow().is_empty(), "pointer moves never reinitialize");

    let outside = host.pointer_move(-30.0, 500.0);
    assert_eq!(outside, PointerPosition { x: 0.0, y: 0.0 });

    host.pointer_leave();
    assert_eq!(host.pointer(), PointerPosition::CENTER);

    host.pointer_move(200.0, 0.0);
    let request = host.pending_frame().unwrap();
    host.on_frame(request, now);
    assert!(log.borrow().contains(&Call::SetUniform {
        name: UniformName::Pointer,
        value: UniformValue::Vec2([1.0, 1.0]),
    }));
}

#[test]
fn callbacks_receive_normalized_pointer() {
    let now = Instant::now();
    let seen: Rc<RefCell<Vec<(&'static str, PointerPosition)>>> = Rc::default();
    let callbacks = CanvasCallbacks {
        on_click: Some(Box::new({
            let seen = Rc::clone(&seen);
            move |pointer| seen.borrow_mut().push(("click", pointer))
        })),
        on_pointer_move: Some(Box::new({
            let seen = Rc::clone(&seen);
            move |pointer| seen.borrow_mut().push(("move", pointer))
        })),
        on_pointer_leave: Some(Box::new({
            let seen = Rc::clone(&seen);
            move |pointer| seen.borrow_mut().push(("leave", pointer))
        })),
    };
    let (host, log) = spy_host(
        ShaderRegistry::builtin(),
        CanvasProps::new(1, CanvasSize::new(100, 100)),
    );
    let mut host = host.with_callbacks(callbacks);
    host.mount(&mut SpyElement::new(Rc::clone(&log)), now);

    host.pointer_move(100.0, 100.0);
    host.click();
    host.pointer_leave();

    assert_eq!(
        *seen.borrow(),
        vec![
            ("move", PointerPosition { x: 1.0, y: 0.0 }),
            ("click", PointerPosition { x: 1.0, y: 0.0 }),
            ("leave", PointerPosition::CENTER),
        ]
    );
}

#[test]
fn pointer_events_after_unmount_are_ignored() {
    let now = Instant::now();
    let fired = Rc::new(RefCell::new(0u32));
    let callback = |fired: &Rc<RefCell<u32>>| {
        let fired = Rc::clone(fired);
        move |_: PointerPosition| *fired.borrow_mut() += 1
    };
    let callbacks = CanvasCallbacks {
        on_click: Some(Box::new(callback(&fired))),
        on_pointer_move: Some(Box::new(callback(&fired))),
        on_pointer_leave: Some(Box::new(callback(&fired))),
    };
    let (host, log) = spy_host(
        ShaderRegistry::builtin(),
        CanvasProps::new(1, CanvasSize::new(100, 100)),
    );
    let mut host = host.with_callbacks(callbacks);
    host.mount(&mut SpyElement::new(Rc::clone(&log)), now);
    host.pointer_move(25.0, 25.0);
    let before = host.pointer();
    host.unmount();

    assert_eq!(host.pointer_move(90.0, 90.0), before);
    host.click();
    host.pointer_leave();

    assert_eq!(*fired.borrow(), 1);
    assert_eq!(host.pointer(), before);
}

#[test]
fn dropping_a_running_host_cancels_and_releases() {
    let now = Instant::now();
    let (host, log) = mounted_host(ShaderRegistry::builtin(), CanvasProps::new(2, SIZE), now);
    drop(host);

    let cancel = position(&log, is_cancel).unwrap();
    let release = position(&log, is_release).unwrap();
    assert!(cancel < release);
    assert_eq!(count(&log, |call| matches!(call, Call::DeleteBuffer(_))), 3);
}
