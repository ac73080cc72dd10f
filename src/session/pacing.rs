use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::foundation::core::PixelRect;
use crate::foundation::error::RenderResult;
use crate::render::surface::DisplaySurface;
use crate::session::app::App;
use crate::session::context::RenderContext;
use crate::session::events::{EventSource, HostEvent, Key};

/// Shortest throttle sleep, whatever the configured quantum.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Monotonic time source the loop measures and sleeps with.
pub trait Clock {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Wall clock: `Instant` plus `thread::sleep`.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock: time only moves on `sleep` or `advance`. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate work taking `duration`.
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Elapsed-time helper for timed effects.
pub struct StopWatch {
    clock: Rc<dyn Clock>,
    start: Duration,
}

impl StopWatch {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        let start = clock.now();
        Self { clock, start }
    }

    pub fn reset(&mut self) {
        self.start = self.clock.now();
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.start)
    }

    pub fn lap_millis(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Fixed-interval pacing parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTiming {
    /// Target time between frame starts.
    pub interval: Duration,
    /// Longest single sleep while waiting for the next frame.
    pub quantum: Duration,
    /// Intervals spent only pumping events before the first frame.
    pub warm_up_frames: u32,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(33),
            quantum: Duration::from_millis(5),
            warm_up_frames: 3,
        }
    }
}

/// Why the loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoopExit {
    /// The application returned `keep_running == false`.
    ScriptEnded,
    /// The host sent quit, or a close request was accepted.
    Quit,
    /// The application called [`RenderContext::request_stop`].
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames presented.
    pub frames: u64,
    /// Frames discarded because the device was lost.
    pub dropped_frames: u64,
    /// Draw calls the backend rejected.
    pub skipped_draws: u64,
    pub exit: LoopExit,
}

/// Drives an [`App`] at a fixed frame interval.
///
/// Each iteration records its start time, pumps events, produces and presents one frame, pumps
/// again and then alternates pumping with sleeps of at most `quantum` until `interval` has
/// passed since the start. Only the frame's dirty rectangle is presented.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameLoop {
    timing: FrameTiming,
}

enum Step {
    Continue,
    Exit(LoopExit),
}

impl FrameLoop {
    pub fn new(timing: FrameTiming) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    /// Run `app` until it finishes, the host quits or the app requests a stop.
    ///
    /// Device loss drops the frame, recreates the device and continues. Other errors from the
    /// app or from recovery end the loop after `cleanup`.
    #[tracing::instrument(skip_all, fields(interval_ms = self.timing.interval.as_millis() as u64))]
    pub fn run(
        &self,
        ctx: &mut RenderContext<'_>,
        app: &mut dyn App,
        events: &mut dyn EventSource,
        surface: &mut dyn DisplaySurface,
    ) -> RenderResult<LoopStats> {
        app.init(ctx)?;
        let res = self.drive(ctx, app, events, surface);
        app.cleanup(ctx);
        let stats = res?;
        tracing::debug!(
            frames = stats.frames,
            dropped = stats.dropped_frames,
            skipped = stats.skipped_draws,
            exit = ?stats.exit,
            "frame loop finished"
        );
        Ok(stats)
    }

    fn drive(
        &self,
        ctx: &mut RenderContext<'_>,
        app: &mut dyn App,
        events: &mut dyn EventSource,
        surface: &mut dyn DisplaySurface,
    ) -> RenderResult<LoopStats> {
        let clock = ctx.clock();
        let mut stats = LoopStats {
            frames: 0,
            dropped_frames: 0,
            skipped_draws: 0,
            exit: LoopExit::Quit,
        };

        for _ in 0..self.timing.warm_up_frames {
            let start = clock.now();
            if let Step::Exit(exit) = self.throttle(start, &*clock, ctx, app, events, surface) {
                stats.exit = exit;
                return Ok(stats);
            }
        }

        stats.exit = loop {
            let start = clock.now();
            if let Step::Exit(exit) = pump(ctx, app, events, surface) {
                break exit;
            }

            let keep_running = match self.render_frame(ctx, app, surface) {
                Ok(keep_running) => {
                    stats.frames += 1;
                    keep_running
                }
                Err(err) if err.is_device_lost() => {
                    tracing::warn!(error = %err, "frame dropped; recreating device");
                    stats.dropped_frames += 1;
                    ctx.recover()?;
                    true
                }
                Err(err) => return Err(err),
            };
            stats.skipped_draws = ctx.skipped_draws();
            if !keep_running {
                break LoopExit::ScriptEnded;
            }

            if let Step::Exit(exit) = pump(ctx, app, events, surface) {
                break exit;
            }
            if let Step::Exit(exit) = self.throttle(start, &*clock, ctx, app, events, surface) {
                break exit;
            }
        };
        stats.skipped_draws = ctx.skipped_draws();
        Ok(stats)
    }

    /// One bracketed frame. `Ok(false)` means the app finished.
    fn render_frame(
        &self,
        ctx: &mut RenderContext<'_>,
        app: &mut dyn App,
        surface: &mut dyn DisplaySurface,
    ) -> RenderResult<bool> {
        ctx.begin_frame()?;
        match app.frame(ctx) {
            Ok(result) => {
                ctx.finish_frame(result.dirty, surface)?;
                Ok(result.keep_running)
            }
            Err(err) => {
                // Close the bracket; nothing is presented.
                if let Err(finish) = ctx.finish_frame(PixelRect::empty(), surface) {
                    tracing::warn!(error = %finish, "closing failed frame");
                }
                Err(err)
            }
        }
    }

    /// Pump and sleep until `interval` has passed since `start`.
    fn throttle(
        &self,
        start: Duration,
        clock: &dyn Clock,
        ctx: &mut RenderContext<'_>,
        app: &mut dyn App,
        events: &mut dyn EventSource,
        surface: &mut dyn DisplaySurface,
    ) -> Step {
        loop {
            if let Step::Exit(exit) = pump(ctx, app, events, surface) {
                return Step::Exit(exit);
            }
            let elapsed = clock.now().saturating_sub(start);
            if elapsed >= self.timing.interval {
                return Step::Continue;
            }
            let quantum = self.timing.quantum.max(MIN_SLEEP);
            clock.sleep(quantum.min(self.timing.interval - elapsed));
        }
    }
}

/// Drain pending host events into the app.
fn pump(
    ctx: &mut RenderContext<'_>,
    app: &mut dyn App,
    events: &mut dyn EventSource,
    surface: &mut dyn DisplaySurface,
) -> Step {
    while let Some(event) = events.poll_event() {
        match event {
            HostEvent::Quit => return Step::Exit(LoopExit::Quit),
            HostEvent::CloseRequested => {
                if app.on_close_requested(ctx.config().language().quit_prompt()) {
                    return Step::Exit(LoopExit::Quit);
                }
            }
            HostEvent::MouseDown { x, y, button } => {
                let (x, y) = ctx.to_buffer_coords(x, y);
                app.mouse_down(x, y, button);
            }
            HostEvent::MouseUp { x, y, button } => {
                let (x, y) = ctx.to_buffer_coords(x, y);
                app.mouse_up(x, y, button);
            }
            HostEvent::MouseMove { x, y } => {
                let (x, y) = ctx.to_buffer_coords(x, y);
                app.mouse_move(x, y);
            }
            HostEvent::KeyDown { repeat: true, .. } => {}
            HostEvent::KeyDown { key, .. } => app.key_down(key),
            HostEvent::KeyUp { key } => app.key_up(key),
            HostEvent::Wheel { delta } => {
                let key = match delta.signum() {
                    1 => Key::Up,
                    -1 => Key::Down,
                    _ => continue,
                };
                app.key_down(key);
                app.key_up(key);
            }
            HostEvent::Expose { rect } => {
                let (x, y) = ctx.to_buffer_coords(rect.x, rect.y);
                ctx.repaint(PixelRect::new(x, y, rect.width, rect.height), surface);
            }
        }
    }
    if ctx.stop_requested() {
        return Step::Exit(LoopExit::Stopped);
    }
    Step::Continue
}

#[cfg(test)]
#[path = "../../tests/unit/session/pacing.rs"]
mod tests;
