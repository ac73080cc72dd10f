use super::*;
use crate::foundation::error::RenderError;
use crate::foundation::pixel::PixelFormat;
use crate::render::hardware::HardwareBackend;
use crate::render::reference::ReferenceDevice;
use crate::render::software::SoftwareBackend;
use crate::render::surface::FrameBufferSurface;
use crate::session::app::FrameResult;
use crate::session::config::{EngineConfig, Language};
use crate::session::events::{MouseButton, NoEvents, ScriptedEvents};

type FrameFn = Box<dyn FnMut(u64, &mut RenderContext<'_>) -> RenderResult<FrameResult>>;

struct TestApp {
    calls: u64,
    frame_fn: FrameFn,
    log: Vec<String>,
    accept_close: bool,
    cleaned_up: bool,
}

impl TestApp {
    fn new(frame_fn: impl FnMut(u64, &mut RenderContext<'_>) -> RenderResult<FrameResult> + 'static) -> Self {
        Self {
            calls: 0,
            frame_fn: Box::new(frame_fn),
            log: Vec::new(),
            accept_close: true,
            cleaned_up: false,
        }
    }

    /// Runs `n` frames, each marking the full buffer dirty.
    fn frames(n: u64) -> Self {
        Self::new(move |i, ctx| {
            let full = ctx.full_rect();
            Ok(if i >= n {
                FrameResult::finished(full)
            } else {
                FrameResult::dirty(full)
            })
        })
    }
}

impl App for TestApp {
    fn frame(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<FrameResult> {
        self.calls += 1;
        (self.frame_fn)(self.calls, ctx)
    }

    fn cleanup(&mut self, _ctx: &mut RenderContext<'_>) {
        self.cleaned_up = true;
    }

    fn mouse_down(&mut self, x: i32, y: i32, button: MouseButton) {
        self.log.push(format!("down {x},{y} {button:?}"));
    }

    fn mouse_move(&mut self, x: i32, y: i32) {
        self.log.push(format!("move {x},{y}"));
    }

    fn key_down(&mut self, key: Key) {
        self.log.push(format!("key_down {key:?}"));
    }

    fn key_up(&mut self, key: Key) {
        self.log.push(format!("key_up {key:?}"));
    }

    fn on_close_requested(&mut self, prompt: &str) -> bool {
        self.log.push(format!("close? {prompt}"));
        self.accept_close
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        window_width: 8,
        window_height: 8,
        ..EngineConfig::default()
    }
}

fn software_ctx(clock: &ManualClock) -> RenderContext<'static> {
    RenderContext::with_clock(
        Box::new(SoftwareBackend::new(8, 8, false).unwrap()),
        config(),
        Rc::new(clock.clone()),
    )
}

fn no_warm_up() -> FrameLoop {
    FrameLoop::new(FrameTiming {
        warm_up_frames: 0,
        ..FrameTiming::default()
    })
}

#[test]
fn hundred_frames_take_exactly_hundred_intervals_on_manual_clock() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let starts = Rc::new(std::cell::RefCell::new(Vec::new()));
    let starts_in = Rc::clone(&starts);
    let mut app = TestApp::new(move |i, ctx| {
        starts_in.borrow_mut().push(ctx.clock().now());
        Ok(if i > 100 {
            FrameResult::finished(PixelRect::empty())
        } else {
            FrameResult::unchanged()
        })
    });
    let mut surface = FrameBufferSurface::new(8, 8).unwrap();

    let stats = no_warm_up()
        .run(&mut ctx, &mut app, &mut NoEvents, &mut surface)
        .unwrap();

    assert_eq!(stats.exit, LoopExit::ScriptEnded);
    assert_eq!(stats.frames, 101);
    let starts = starts.borrow();
    let total = starts[100] - starts[0];
    assert!(total >= Duration::from_millis(100 * 33));
    assert!(total <= Duration::from_millis(100 * (33 + 5)));
    for pair in starts.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_millis(33));
    }
    assert!(app.cleaned_up);
}

#[test]
fn warm_up_delays_first_frame() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let first = Rc::new(Cell::new(None));
    let first_in = Rc::clone(&first);
    let mut app = TestApp::new(move |_, ctx| {
        first_in.set(Some(ctx.clock().now()));
        Ok(FrameResult::finished(PixelRect::empty()))
    });
    FrameLoop::default()
        .run(
            &mut ctx,
            &mut app,
            &mut NoEvents,
            &mut FrameBufferSurface::new(8, 8).unwrap(),
        )
        .unwrap();
    assert_eq!(first.get(), Some(Duration::from_millis(99)));
}

#[test]
fn slow_frame_is_not_padded() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let work = clock.clone();
    let starts = Rc::new(std::cell::RefCell::new(Vec::new()));
    let starts_in = Rc::clone(&starts);
    let mut app = TestApp::new(move |i, ctx| {
        starts_in.borrow_mut().push(ctx.clock().now());
        work.advance(Duration::from_millis(if i == 1 { 50 } else { 10 }));
        Ok(if i >= 3 {
            FrameResult::finished(PixelRect::empty())
        } else {
            FrameResult::unchanged()
        })
    });
    no_warm_up()
        .run(
            &mut ctx,
            &mut app,
            &mut NoEvents,
            &mut FrameBufferSurface::new(8, 8).unwrap(),
        )
        .unwrap();
    let starts = starts.borrow();
    assert_eq!(starts[1] - starts[0], Duration::from_millis(50));
    assert_eq!(starts[2] - starts[1], Duration::from_millis(33));
}

#[test]
fn dirty_rect_is_presented() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let mut app = TestApp::new(|_, _| Ok(FrameResult::finished(PixelRect::new(1, 1, 2, 3))));
    let mut surface = FrameBufferSurface::new(8, 8).unwrap();
    no_warm_up()
        .run(&mut ctx, &mut app, &mut NoEvents, &mut surface)
        .unwrap();
    assert_eq!(surface.presents(), 1);
    assert_eq!(surface.pixels_pushed(), 6);
}

#[test]
fn quit_event_stops_between_frames() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let mut app = TestApp::frames(1000);
    let mut events = ScriptedEvents::new()
        .next_pump()
        .next_pump()
        .push(HostEvent::Quit);
    let stats = no_warm_up()
        .run(
            &mut ctx,
            &mut app,
            &mut events,
            &mut FrameBufferSurface::new(8, 8).unwrap(),
        )
        .unwrap();
    assert_eq!(stats.exit, LoopExit::Quit);
    assert_eq!(stats.frames, 1);
    assert!(app.cleaned_up);
}

#[test]
fn quit_during_warm_up_renders_nothing() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let mut app = TestApp::frames(10);
    let mut events = ScriptedEvents::new().push(HostEvent::Quit);
    let stats = FrameLoop::default()
        .run(
            &mut ctx,
            &mut app,
            &mut events,
            &mut FrameBufferSurface::new(8, 8).unwrap(),
        )
        .unwrap();
    assert_eq!(stats.frames, 0);
    assert_eq!(app.calls, 0);
}

#[test]
fn declined_close_keeps_running() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let mut app = TestApp::frames(2);
    app.accept_close = false;
    let mut events = ScriptedEvents::new().push(HostEvent::CloseRequested);
    let stats = no_warm_up()
        .run(
            &mut ctx,
            &mut app,
            &mut events,
            &mut FrameBufferSurface::new(8, 8).unwrap(),
        )
        .unwrap();
    assert_eq!(stats.exit, LoopExit::ScriptEnded);
    assert_eq!(app.log, vec![format!("close? {}", Language::Japanese.quit_prompt())]);
}

#[test]
fn accepted_close_quits() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let mut app = TestApp::frames(100);
    let mut events = ScriptedEvents::new().push(HostEvent::CloseRequested);
    let stats = no_warm_up()
        .run(
            &mut ctx,
            &mut app,
            &mut events,
            &mut FrameBufferSurface::new(8, 8).unwrap(),
        )
        .unwrap();
    assert_eq!(stats.exit, LoopExit::Quit);
    assert_eq!(stats.frames, 0);
}

#[test]
fn input_is_translated_and_filtered() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    ctx.set_display_offset(100, 50);
    let mut app = TestApp::frames(1);
    let mut events = ScriptedEvents::new()
        .push(HostEvent::MouseMove { x: 103, y: 54 })
        .push(HostEvent::MouseDown {
            x: 100,
            y: 50,
            button: MouseButton::Left,
        })
        .push(HostEvent::KeyDown {
            key: Key::Return,
            repeat: false,
        })
        .push(HostEvent::KeyDown {
            key: Key::Return,
            repeat: true,
        })
        .push(HostEvent::Wheel { delta: 120 })
        .push(HostEvent::Wheel { delta: 0 })
        .push(HostEvent::Wheel { delta: -1 });
    no_warm_up()
        .run(
            &mut ctx,
            &mut app,
            &mut events,
            &mut FrameBufferSurface::new(8, 8).unwrap(),
        )
        .unwrap();
    assert_eq!(
        app.log,
        vec![
            "move 3,4",
            "down 0,0 Left",
            "key_down Return",
            "key_down Up",
            "key_up Up",
            "key_down Down",
            "key_up Down",
        ]
    );
}

#[test]
fn request_stop_ends_loop() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let mut app = TestApp::new(|i, ctx| {
        if i == 2 {
            ctx.request_stop();
        }
        Ok(FrameResult::unchanged())
    });
    let stats = no_warm_up()
        .run(
            &mut ctx,
            &mut app,
            &mut NoEvents,
            &mut FrameBufferSurface::new(8, 8).unwrap(),
        )
        .unwrap();
    assert_eq!(stats.exit, LoopExit::Stopped);
    assert_eq!(stats.frames, 2);
}

#[test]
fn expose_repaints_without_rendering() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let mut app = TestApp::frames(1);
    let mut events = ScriptedEvents::new().push(HostEvent::Expose {
        rect: PixelRect::new(0, 0, 2, 2),
    });
    let mut surface = FrameBufferSurface::new(8, 8).unwrap();
    no_warm_up()
        .run(&mut ctx, &mut app, &mut events, &mut surface)
        .unwrap();
    // One repaint plus the single frame.
    assert_eq!(surface.presents(), 2);
    assert_eq!(surface.pixels_pushed(), 4 + 64);
}

#[test]
fn expose_rect_is_mapped_through_display_offset() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    ctx.set_display_offset(4, 4);
    let mut app = TestApp::frames(1);
    let mut events = ScriptedEvents::new().push(HostEvent::Expose {
        rect: PixelRect::new(4, 4, 2, 2),
    });
    let mut surface = FrameBufferSurface::new(16, 16).unwrap();

    assert!(matches!(
        pump(&mut ctx, &mut app, &mut events, &mut surface),
        Step::Continue
    ));
    assert_eq!(surface.presents(), 1);
    assert_eq!(surface.last_rect(), Some(PixelRect::new(4, 4, 2, 2)));
    assert_eq!(app.calls, 0);
}

#[test]
fn device_loss_drops_one_frame_and_recovers() {
    let clock = ManualClock::new();
    let device = ReferenceDevice::new();
    let trigger = device.loss_trigger();
    let backend = HardwareBackend::new(device, 8, 8, false).unwrap();
    let mut ctx = RenderContext::with_clock(Box::new(backend), config(), Rc::new(clock.clone()));
    let redraws = Rc::new(std::cell::RefCell::new(Vec::new()));
    let redraws_in = Rc::clone(&redraws);
    let mut app = TestApp::new(move |i, ctx| {
        redraws_in.borrow_mut().push(ctx.needs_full_redraw());
        if i == 2 {
            trigger.lose();
        }
        let white = ctx.pixel_format().white();
        let full = ctx.full_rect();
        ctx.render_clear(full, white);
        Ok(if i >= 5 {
            FrameResult::finished(full)
        } else {
            FrameResult::dirty(full)
        })
    });
    let mut surface = FrameBufferSurface::new(8, 8).unwrap();
    let stats = no_warm_up()
        .run(&mut ctx, &mut app, &mut NoEvents, &mut surface)
        .unwrap();

    assert_eq!(stats.frames, 4);
    assert_eq!(stats.dropped_frames, 1);
    assert_eq!(stats.skipped_draws, 0);
    assert_eq!(*redraws.borrow(), vec![true, false, true, false, false]);
    assert_eq!(surface.presents(), 4);
    assert_eq!(surface.pixel(7, 7), Some(PixelFormat::Argb.white()));
}

#[test]
fn app_error_stops_loop_after_cleanup() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let mut app = TestApp::new(|i, _| {
        if i == 3 {
            Err(RenderError::decode("missing.png"))
        } else {
            Ok(FrameResult::unchanged())
        }
    });
    let err = no_warm_up()
        .run(
            &mut ctx,
            &mut app,
            &mut NoEvents,
            &mut FrameBufferSurface::new(8, 8).unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, RenderError::Decode(_)));
    assert!(app.cleaned_up);
}

#[test]
fn app_error_wins_over_failed_bracket_close() {
    let clock = ManualClock::new();
    let device = ReferenceDevice::new();
    let trigger = device.loss_trigger();
    let backend = HardwareBackend::new(device, 8, 8, false).unwrap();
    let mut ctx = RenderContext::with_clock(Box::new(backend), config(), Rc::new(clock.clone()));
    let mut app = TestApp::new(move |_, _| {
        trigger.lose();
        Err(RenderError::decode("missing.png"))
    });
    let err = no_warm_up()
        .run(
            &mut ctx,
            &mut app,
            &mut NoEvents,
            &mut FrameBufferSurface::new(8, 8).unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, RenderError::Decode(_)));
    assert_eq!(app.calls, 1);
    assert!(app.cleaned_up);
}

#[test]
fn zero_quantum_still_advances_manual_clock() {
    let clock = ManualClock::new();
    let mut ctx = software_ctx(&clock);
    let starts = Rc::new(std::cell::RefCell::new(Vec::new()));
    let starts_in = Rc::clone(&starts);
    let mut app = TestApp::new(move |i, ctx| {
        starts_in.borrow_mut().push(ctx.clock().now());
        Ok(if i >= 3 {
            FrameResult::finished(PixelRect::empty())
        } else {
            FrameResult::unchanged()
        })
    });
    let frame_loop = FrameLoop::new(FrameTiming {
        quantum: Duration::ZERO,
        warm_up_frames: 0,
        ..FrameTiming::default()
    });
    let stats = frame_loop
        .run(&mut ctx, &mut app, &mut NoEvents, &mut FrameBufferSurface::new(8, 8).unwrap())
        .unwrap();

    assert_eq!(stats.frames, 3);
    let starts = starts.borrow();
    assert_eq!(starts[1] - starts[0], Duration::from_millis(33));
    assert_eq!(starts[2] - starts[1], Duration::from_millis(33));
}

#[test]
fn stop_watch_follows_the_clock() {
    let clock = ManualClock::new();
    let mut sw = StopWatch::new(Rc::new(clock.clone()));
    clock.advance(Duration::from_millis(250));
    assert_eq!(sw.lap_millis(), 250);
    sw.reset();
    clock.advance(Duration::from_millis(7));
    assert_eq!(sw.lap_millis(), 7);
}

