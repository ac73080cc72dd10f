//! Display surfaces receive finished frames.

use crate::compose::clip::clip_transfer;
use crate::foundation::core::{PixelRect, TransferRect};
use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::pixel::{Pixel, PixelFormat};

/// Borrowed view of a frame's pixels.
#[derive(Clone, Copy, Debug)]
pub struct PixelView<'a> {
    pub pixels: &'a [Pixel],
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl PixelView<'_> {
    pub fn bounds(&self) -> PixelRect {
        PixelRect::from_size(self.width, self.height)
    }
}

/// Where presented pixels go (a window, a DIB section, a test buffer).
pub trait DisplaySurface {
    /// Copy `rect` of `view` to the surface at `rect` shifted by `offset`.
    fn present(
        &mut self,
        view: PixelView<'_>,
        rect: PixelRect,
        offset: (i32, i32),
    ) -> RenderResult<()>;
}

/// In-memory display surface storing `Argb` pixels.
#[derive(Clone, Debug)]
pub struct FrameBufferSurface {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
    presents: u64,
    pixels_pushed: u64,
    last_rect: Option<PixelRect>,
}

impl FrameBufferSurface {
    /// A black `width x height` surface.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                RenderError::allocation(format!("invalid surface size {width}x{height}"))
            })?;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|e| RenderError::allocation(format!("surface allocation failed: {e}")))?;
        pixels.resize(len, PixelFormat::Argb.black());
        Ok(Self {
            width,
            height,
            pixels,
            presents: 0,
            pixels_pushed: 0,
            last_rect: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Surface content in `Argb`.
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Pixel> {
        if !PixelRect::from_size(self.width, self.height).contains(x, y) {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }

    /// Number of `present` calls that copied at least one pixel.
    pub fn presents(&self) -> u64 {
        self.presents
    }

    /// Total pixels copied.
    pub fn pixels_pushed(&self) -> u64 {
        self.pixels_pushed
    }

    /// Surface-space rectangle of the last copy.
    pub fn last_rect(&self) -> Option<PixelRect> {
        self.last_rect
    }

    pub fn to_rgba_image(&self) -> image::RgbaImage {
        let mut out = image::RgbaImage::new(self.width, self.height);
        for (dst, &p) in out.pixels_mut().zip(&self.pixels) {
            *dst = image::Rgba(PixelFormat::Argb.to_rgba(p));
        }
        out
    }
}

impl DisplaySurface for FrameBufferSurface {
    fn present(
        &mut self,
        view: PixelView<'_>,
        rect: PixelRect,
        offset: (i32, i32),
    ) -> RenderResult<()> {
        let r = rect.intersect(view.bounds());
        if r.is_empty() {
            return Ok(());
        }
        let mut t = TransferRect::new(
            r.x.saturating_add(offset.0),
            r.y.saturating_add(offset.1),
            r.width,
            r.height,
            r.x,
            r.y,
        );
        if !clip_transfer(view.width, view.height, self.width, self.height, &mut t) {
            return Ok(());
        }

        let (dst_stride, src_stride) = (self.width as usize, view.width as usize);
        for row in 0..t.height {
            let d0 = (t.dst_y + row) as usize * dst_stride + t.dst_x as usize;
            let s0 = (t.src_y + row) as usize * src_stride + t.src_x as usize;
            let w = t.width as usize;
            for (d, &s) in self.pixels[d0..d0 + w]
                .iter_mut()
                .zip(&view.pixels[s0..s0 + w])
            {
                *d = view.format.convert(s, PixelFormat::Argb);
            }
        }
        self.presents += 1;
        self.pixels_pushed += t.dst_rect().area();
        self.last_rect = Some(t.dst_rect());
        Ok(())
    }
}
