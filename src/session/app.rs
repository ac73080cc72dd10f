use crate::foundation::core::PixelRect;
use crate::foundation::error::RenderResult;
use crate::session::context::RenderContext;
use crate::session::events::{Key, MouseButton};

/// What one produced frame changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameResult {
    /// Back-buffer region to push to the display; empty when nothing changed.
    pub dirty: PixelRect,
    /// `false` ends the loop after this frame is presented (the script finished).
    pub keep_running: bool,
}

impl FrameResult {
    pub fn dirty(rect: PixelRect) -> Self {
        Self {
            dirty: rect,
            keep_running: true,
        }
    }

    pub fn unchanged() -> Self {
        Self::dirty(PixelRect::empty())
    }

    /// Present `rect` and stop.
    pub fn finished(rect: PixelRect) -> Self {
        Self {
            dirty: rect,
            keep_running: false,
        }
    }
}

/// The application/script layer driven by [`FrameLoop`](crate::FrameLoop).
///
/// Input hooks receive coordinates already translated into back-buffer space. They default to
/// doing nothing.
pub trait App {
    /// Called once before the first frame.
    fn init(&mut self, _ctx: &mut RenderContext<'_>) -> RenderResult<()> {
        Ok(())
    }

    /// Produce one frame with the context's render calls.
    ///
    /// Returning an error stops the loop, except for device loss, which the loop recovers from.
    fn frame(&mut self, ctx: &mut RenderContext<'_>) -> RenderResult<FrameResult>;

    /// Called once after the last frame, also when the loop stops on an error.
    fn cleanup(&mut self, _ctx: &mut RenderContext<'_>) {}

    fn mouse_down(&mut self, _x: i32, _y: i32, _button: MouseButton) {}

    fn mouse_up(&mut self, _x: i32, _y: i32, _button: MouseButton) {}

    fn mouse_move(&mut self, _x: i32, _y: i32) {}

    /// Key press. Auto-repeat presses are not delivered.
    fn key_down(&mut self, _key: Key) {}

    fn key_up(&mut self, _key: Key) {}

    /// The user asked to close the window; `prompt` is the localized confirmation text.
    /// Return `false` to keep running.
    fn on_close_requested(&mut self, _prompt: &str) -> bool {
        true
    }
}
