use super::Image;
use crate::foundation::core::PixelRect;
use crate::foundation::error::RenderResult;
use crate::foundation::pixel::{Pixel, PixelFormat};
use crate::render::backend::TextureHost;

/// Exclusive write access to an [`Image`].
///
/// Obtained from [`Image::lock`] or [`Image::lock_with`]. While the guard lives the image cannot
/// be locked again or used as a compositing source. Releasing the guard marks the texture stale
/// and, for `lock_with`, hands the pixels to the texture host. Prefer [`ImageLock::unlock`] to
/// see upload errors; dropping the guard logs them instead.
pub struct ImageLock<'a, 'buf> {
    image: &'a mut Image<'buf>,
    host: Option<&'a mut dyn TextureHost>,
    released: bool,
}

impl<'a, 'buf> ImageLock<'a, 'buf> {
    pub(super) fn new(image: &'a mut Image<'buf>, host: Option<&'a mut dyn TextureHost>) -> Self {
        Self {
            image,
            host,
            released: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width
    }

    pub fn height(&self) -> u32 {
        self.image.height
    }

    pub fn format(&self) -> PixelFormat {
        self.image.format
    }

    pub fn bounds(&self) -> PixelRect {
        self.image.bounds()
    }

    pub fn pixels(&self) -> &[Pixel] {
        self.image.store.as_slice()
    }

    pub fn pixels_mut(&mut self) -> &mut [Pixel] {
        self.image.store.as_mut_slice()
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Pixel> {
        self.image.pixel(x, y)
    }

    /// Write one pixel. Returns `false` (and writes nothing) outside the image.
    pub fn set_pixel(&mut self, x: i32, y: i32, value: Pixel) -> bool {
        if !self.bounds().contains(x, y) {
            return false;
        }
        let idx = y as usize * self.image.width as usize + x as usize;
        self.pixels_mut()[idx] = value;
        true
    }

    pub fn clear_black(&mut self) {
        let p = self.format().black();
        self.clear_color(p);
    }

    pub fn clear_white(&mut self) {
        let p = self.format().white();
        self.clear_color(p);
    }

    pub fn clear_color(&mut self, value: Pixel) {
        self.pixels_mut().fill(value);
    }

    pub fn clear_black_rect(&mut self, rect: PixelRect) {
        let p = self.format().black();
        self.clear_color_rect(rect, p);
    }

    pub fn clear_white_rect(&mut self, rect: PixelRect) {
        let p = self.format().white();
        self.clear_color_rect(rect, p);
    }

    /// Fill `rect`, clipped to the image. Out-of-bounds parts are ignored.
    pub fn clear_color_rect(&mut self, rect: PixelRect, value: Pixel) {
        let r = rect.intersect(self.bounds());
        if r.is_empty() {
            return;
        }
        let stride = self.image.width as usize;
        let (x0, w) = (r.x as usize, r.width as usize);
        let pixels = self.pixels_mut();
        for y in r.y as usize..(r.y + r.height) as usize {
            let row = y * stride + x0;
            pixels[row..row + w].fill(value);
        }
    }

    /// Release the lock, surfacing texture upload failures.
    pub fn unlock(mut self) -> RenderResult<()> {
        self.released = true;
        self.sync()
    }

    fn sync(&mut self) -> RenderResult<()> {
        let image = &mut *self.image;
        image.texture_stale = true;
        if let Some(host) = self.host.as_deref_mut() {
            host.unlock_texture(
                image.width,
                image.height,
                image.store.as_slice(),
                &mut image.texture,
            )?;
            image.texture_stale = false;
        }
        Ok(())
    }
}

impl Drop for ImageLock<'_, '_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.sync() {
            tracing::error!(error = %err, "texture upload failed while releasing image lock");
        }
    }
}
