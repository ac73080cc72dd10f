use std::rc::Rc;

use crate::assets::source::AssetSource;
use crate::bitmap::{Image, ImageLock};
use crate::compose::blend::BlendType;
use crate::foundation::core::{PixelRect, TransferRect};
use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::pixel::{Pixel, PixelFormat};
use crate::render::backend::{Backend, BackendKind, create_backend};
use crate::render::surface::DisplaySurface;
use crate::session::config::EngineConfig;
use crate::session::pacing::{Clock, StopWatch, SystemClock};

/// Everything a frame needs: the backend, the startup config and the loop clock.
///
/// Render calls never fail the frame. A draw the backend rejects is logged and skipped;
/// a device loss is recorded and handled by the loop after the frame.
pub struct RenderContext<'buf> {
    backend: Box<dyn Backend + 'buf>,
    config: EngineConfig,
    clock: Rc<dyn Clock>,
    display_offset: (i32, i32),
    stop_requested: bool,
    device_lost: bool,
    full_redraw: bool,
    skipped_draws: u64,
}

impl RenderContext<'static> {
    /// Create the configured backend.
    pub fn from_config(config: EngineConfig) -> RenderResult<Self> {
        let backend = create_backend(config.backend, &config)?;
        Ok(Self::new(backend, config))
    }
}

impl<'buf> RenderContext<'buf> {
    pub fn new(backend: Box<dyn Backend + 'buf>, config: EngineConfig) -> Self {
        Self::with_clock(backend, config, Rc::new(SystemClock::new()))
    }

    pub fn with_clock(
        backend: Box<dyn Backend + 'buf>,
        config: EngineConfig,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            config,
            clock,
            display_offset: (0, 0),
            stop_requested: false,
            device_lost: false,
            full_redraw: true,
            skipped_draws: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.backend.pixel_format()
    }

    /// Whole back buffer.
    pub fn full_rect(&self) -> PixelRect {
        let (w, h) = self.backend.size();
        PixelRect::from_size(w, h)
    }

    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    /// Stop watch running on the loop clock, started now.
    pub fn stop_watch(&self) -> StopWatch {
        StopWatch::new(self.clock())
    }

    /// `true` on the first frame and on the first frame after a device was recreated: the
    /// back buffer holds nothing the application drew.
    pub fn needs_full_redraw(&self) -> bool {
        self.full_redraw
    }

    /// Draw calls skipped because the backend rejected them.
    pub fn skipped_draws(&self) -> u64 {
        self.skipped_draws
    }

    /// Ask the loop to stop after the current iteration.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Shift presentation (fullscreen centering). Mouse input is translated back.
    pub fn set_display_offset(&mut self, x: i32, y: i32) {
        self.display_offset = (x, y);
        self.backend.set_display_offset(x, y);
    }

    /// Host window coordinates to back-buffer coordinates.
    pub fn to_buffer_coords(&self, x: i32, y: i32) -> (i32, i32) {
        (
            x.saturating_sub(self.display_offset.0),
            y.saturating_sub(self.display_offset.1),
        )
    }

    pub fn create_image(&self, width: u32, height: u32) -> RenderResult<Image<'static>> {
        Image::create(width, height, self.pixel_format())
    }

    pub fn create_image_from_color(
        &self,
        width: u32,
        height: u32,
        color: &str,
    ) -> RenderResult<Image<'static>> {
        Image::create_from_color(width, height, color, self.pixel_format())
    }

    pub fn load_image(
        &self,
        source: &dyn AssetSource,
        dir: &str,
        name: &str,
    ) -> RenderResult<Image<'static>> {
        Image::create_from_file(source, dir, name, self.pixel_format())
    }

    /// Lock `image` with texture synchronization through this context's backend.
    pub fn lock_image<'a, 'i>(
        &'a mut self,
        image: &'a mut Image<'i>,
    ) -> RenderResult<ImageLock<'a, 'i>> {
        image.lock_with(&mut *self.backend)
    }

    pub fn destroy_image(&mut self, image: Image<'_>) {
        image.destroy(&mut *self.backend);
    }

    pub fn render_image(
        &mut self,
        src: &mut Image<'_>,
        rect: TransferRect,
        alpha: u8,
        blend: BlendType,
    ) {
        let res = self.backend.render_image(src, rect, alpha, blend);
        self.absorb(res, "render_image");
    }

    pub fn render_image_mask(&mut self, src: &mut Image<'_>, rect: TransferRect, level: u8) {
        let res = self.backend.render_image_mask(src, rect, level);
        self.absorb(res, "render_image_mask");
    }

    pub fn render_clear(&mut self, rect: PixelRect, color: Pixel) {
        let res = self.backend.render_clear(rect, color);
        self.absorb(res, "render_clear");
    }

    /// Direct backend access, e.g. for [`Backend::snapshot`].
    pub fn backend_mut(&mut self) -> &mut (dyn Backend + 'buf) {
        &mut *self.backend
    }

    fn absorb(&mut self, res: RenderResult<()>, op: &str) {
        let Err(err) = res else {
            return;
        };
        if err.is_device_lost() {
            if !self.device_lost {
                tracing::warn!(op, error = %err, "device lost during frame");
            }
            self.device_lost = true;
        } else {
            tracing::warn!(op, error = %err, "draw skipped");
            self.skipped_draws += 1;
        }
    }

    pub(crate) fn begin_frame(&mut self) -> RenderResult<()> {
        self.backend.start_frame()
    }

    /// Close the frame. Returns the device-loss error if any call of this frame saw one.
    pub(crate) fn finish_frame(
        &mut self,
        dirty: PixelRect,
        surface: &mut dyn DisplaySurface,
    ) -> RenderResult<()> {
        let res = self.backend.end_frame(dirty, surface);
        if self.device_lost {
            self.device_lost = false;
            return Err(res.err().unwrap_or_else(|| {
                RenderError::device_lost("device lost during frame")
            }));
        }
        if res.is_ok() {
            self.full_redraw = false;
        }
        res
    }

    pub(crate) fn recover(&mut self) -> RenderResult<()> {
        self.device_lost = false;
        self.backend.recover()?;
        self.full_redraw = true;
        Ok(())
    }

    pub(crate) fn repaint(&mut self, rect: PixelRect, surface: &mut dyn DisplaySurface) {
        if let Err(err) = self.backend.repaint(rect, surface) {
            tracing::warn!(error = %err, ?rect, "repaint failed");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/context.rs"]
mod tests;
