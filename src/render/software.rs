use crate::bitmap::Image;
use crate::compose::blend::{BlendType, draw};
use crate::compose::mask::draw_mask;
use crate::foundation::core::{PixelRect, TransferRect};
use crate::foundation::error::RenderResult;
use crate::foundation::pixel::{Pixel, PixelFormat};
use crate::render::backend::{Backend, BackendKind, TextureHost, TextureId};
use crate::render::surface::{DisplaySurface, PixelView};

/// CPU backend compositing straight into a back buffer.
///
/// The back buffer is owned, or borrowed from the host via [`SoftwareBackend::with_pixels`]
/// (e.g. a DIB section the window system reads from).
pub struct SoftwareBackend<'buf> {
    back: Image<'buf>,
    in_frame: bool,
    offset: (i32, i32),
}

impl SoftwareBackend<'static> {
    /// Allocate a back buffer cleared to white or black.
    pub fn new(width: u32, height: u32, white: bool) -> RenderResult<Self> {
        Self::from_image(Image::create(width, height, PixelFormat::Argb)?, white)
    }
}

impl<'buf> SoftwareBackend<'buf> {
    /// Use caller-owned memory as the back buffer.
    pub fn with_pixels(
        width: u32,
        height: u32,
        pixels: &'buf mut [Pixel],
        white: bool,
    ) -> RenderResult<Self> {
        Self::from_image(
            Image::create_with_pixels(width, height, pixels, PixelFormat::Argb)?,
            white,
        )
    }

    fn from_image(mut back: Image<'buf>, white: bool) -> RenderResult<Self> {
        {
            let mut lock = back.lock();
            if white {
                lock.clear_white();
            } else {
                lock.clear_black();
            }
        }
        Ok(Self {
            back,
            in_frame: false,
            offset: (0, 0),
        })
    }

    /// The back buffer as of the last render call.
    pub fn back_buffer(&self) -> &Image<'buf> {
        &self.back
    }

    fn assert_in_frame(&self, op: &str) {
        assert!(
            self.in_frame,
            "{op} called outside start_frame/end_frame"
        );
    }

    fn view(&self) -> PixelView<'_> {
        PixelView {
            pixels: self.back.pixels(),
            width: self.back.width(),
            height: self.back.height(),
            format: self.back.format(),
        }
    }
}

impl TextureHost for SoftwareBackend<'_> {
    fn lock_texture(
        &mut self,
        _width: u32,
        _height: u32,
        _texture: &mut Option<TextureId>,
    ) -> RenderResult<()> {
        Ok(())
    }

    fn unlock_texture(
        &mut self,
        _width: u32,
        _height: u32,
        _pixels: &[Pixel],
        _texture: &mut Option<TextureId>,
    ) -> RenderResult<()> {
        Ok(())
    }

    fn destroy_texture(&mut self, _texture: TextureId) {}
}

impl Backend for SoftwareBackend<'_> {
    fn kind(&self) -> BackendKind {
        BackendKind::Software
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Argb
    }

    fn size(&self) -> (u32, u32) {
        (self.back.width(), self.back.height())
    }

    fn start_frame(&mut self) -> RenderResult<()> {
        assert!(!self.in_frame, "start_frame called while a frame is active");
        self.in_frame = true;
        Ok(())
    }

    fn end_frame(
        &mut self,
        dirty: PixelRect,
        surface: &mut dyn DisplaySurface,
    ) -> RenderResult<()> {
        assert!(self.in_frame, "end_frame called without start_frame");
        self.in_frame = false;
        let dirty = dirty.intersect(self.back.bounds());
        if dirty.is_empty() {
            return Ok(());
        }
        surface.present(self.view(), dirty, self.offset)
    }

    fn render_image(
        &mut self,
        src: &mut Image<'_>,
        rect: TransferRect,
        alpha: u8,
        blend: BlendType,
    ) -> RenderResult<()> {
        self.assert_in_frame("render_image");
        draw(&mut self.back.lock(), src, rect, alpha, blend);
        Ok(())
    }

    fn render_image_mask(
        &mut self,
        src: &mut Image<'_>,
        rect: TransferRect,
        level: u8,
    ) -> RenderResult<()> {
        self.assert_in_frame("render_image_mask");
        draw_mask(&mut self.back.lock(), src, rect, level);
        Ok(())
    }

    fn render_clear(&mut self, rect: PixelRect, color: Pixel) -> RenderResult<()> {
        self.assert_in_frame("render_clear");
        self.back.lock().clear_color_rect(rect, color);
        Ok(())
    }

    fn set_display_offset(&mut self, x: i32, y: i32) {
        self.offset = (x, y);
    }

    fn repaint(&mut self, rect: PixelRect, surface: &mut dyn DisplaySurface) -> RenderResult<()> {
        let rect = rect.intersect(self.back.bounds());
        if rect.is_empty() {
            return Ok(());
        }
        surface.present(self.view(), rect, self.offset)
    }

    fn recover(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn snapshot(&mut self) -> RenderResult<Image<'static>> {
        let mut copy = Image::create(self.back.width(), self.back.height(), PixelFormat::Argb)?;
        copy.lock().pixels_mut().copy_from_slice(self.back.pixels());
        Ok(copy)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/software.rs"]
mod tests;
