//! Image buffers: owned or borrowed pixel stores with scoped write access.

mod lock;

pub use lock::ImageLock;

use crate::assets::color::parse_color;
use crate::assets::decode::decode_image;
use crate::assets::source::AssetSource;
use crate::foundation::core::PixelRect;
use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::pixel::{Pixel, PixelFormat};
use crate::render::backend::{TextureHost, TextureId};

enum PixelStore<'buf> {
    Owned(Vec<Pixel>),
    Borrowed(&'buf mut [Pixel]),
}

impl PixelStore<'_> {
    fn as_slice(&self) -> &[Pixel] {
        match self {
            Self::Owned(v) => v,
            Self::Borrowed(s) => s,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [Pixel] {
        match self {
            Self::Owned(v) => v,
            Self::Borrowed(s) => s,
        }
    }
}

/// A rectangular pixel buffer.
///
/// Width and height are fixed at creation. Pixels are only written through an [`ImageLock`];
/// holding `&Image` guarantees nobody is writing, which is what compositing sources need.
///
/// The image owns its pixels unless it was built with [`Image::create_with_pixels`], in which
/// case it borrows the caller's memory for `'buf` and never frees it.
pub struct Image<'buf> {
    width: u32,
    height: u32,
    format: PixelFormat,
    store: PixelStore<'buf>,
    texture: Option<TextureId>,
    texture_stale: bool,
}

impl Image<'static> {
    /// Allocate a zero-filled (transparent black) `width x height` image.
    pub fn create(width: u32, height: u32, format: PixelFormat) -> RenderResult<Self> {
        let len = pixel_count(width, height)?;
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).map_err(|e| {
            RenderError::allocation(format!("cannot allocate {width}x{height} image: {e}"))
        })?;
        pixels.resize(len, 0);
        Ok(Self::from_store(width, height, format, PixelStore::Owned(pixels)))
    }

    /// Decode `dir/name` from `source`. The image takes the decoded bitmap's dimensions.
    #[tracing::instrument(skip(source))]
    pub fn create_from_file(
        source: &dyn AssetSource,
        dir: &str,
        name: &str,
        format: PixelFormat,
    ) -> RenderResult<Self> {
        if !source.exists(dir, name) {
            return Err(RenderError::decode(format!(
                "image file '{}' not found",
                display_name(dir, name)
            )));
        }
        let bytes = source.read(dir, name)?;
        let decoded = decode_image(&display_name(dir, name), &bytes, format)?;
        Ok(Self::from_store(
            decoded.width,
            decoded.height,
            format,
            PixelStore::Owned(decoded.pixels),
        ))
    }

    /// Create a solid image from a color string such as `#RRGGBB` or `white`.
    pub fn create_from_color(
        width: u32,
        height: u32,
        color: &str,
        format: PixelFormat,
    ) -> RenderResult<Self> {
        let color = parse_color(color)?;
        let mut img = Self::create(width, height, format)?;
        img.lock().clear_color(color.to_pixel(format));
        Ok(img)
    }
}

impl<'buf> Image<'buf> {
    /// Wrap caller-owned memory holding at least `width * height` pixels.
    ///
    /// The image borrows the memory; dropping or destroying the image leaves it untouched.
    pub fn create_with_pixels(
        width: u32,
        height: u32,
        pixels: &'buf mut [Pixel],
        format: PixelFormat,
    ) -> RenderResult<Self> {
        let len = pixel_count(width, height)?;
        if pixels.len() < len {
            return Err(RenderError::allocation(format!(
                "caller buffer holds {} pixels, {width}x{height} needs {len}",
                pixels.len()
            )));
        }
        Ok(Self::from_store(
            width,
            height,
            format,
            PixelStore::Borrowed(&mut pixels[..len]),
        ))
    }

    fn from_store(width: u32, height: u32, format: PixelFormat, store: PixelStore<'buf>) -> Self {
        Self {
            width,
            height,
            format,
            store,
            texture: None,
            texture_stale: true,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Channel order of the pixels.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Whole-image rectangle.
    pub fn bounds(&self) -> PixelRect {
        PixelRect::from_size(self.width, self.height)
    }

    /// Row-major pixels, `width * height` long.
    pub fn pixels(&self) -> &[Pixel] {
        self.store.as_slice()
    }

    /// Pixel at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Pixel> {
        if !self.bounds().contains(x, y) {
            return None;
        }
        Some(self.pixels()[y as usize * self.width as usize + x as usize])
    }

    /// Backend texture currently associated with the image.
    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    /// `true` when the pixels changed since the texture was last uploaded.
    pub fn is_texture_stale(&self) -> bool {
        self.texture_stale
    }

    /// Lock for CPU-only writes. Any associated texture is re-uploaded lazily before the next
    /// time a backend samples it.
    pub fn lock(&mut self) -> ImageLock<'_, 'buf> {
        ImageLock::new(self, None)
    }

    /// Lock with texture synchronization: the host prepares the texture now and receives the
    /// pixels when the lock is released.
    pub fn lock_with<'a>(
        &'a mut self,
        host: &'a mut dyn TextureHost,
    ) -> RenderResult<ImageLock<'a, 'buf>> {
        host.lock_texture(self.width, self.height, &mut self.texture)?;
        Ok(ImageLock::new(self, Some(host)))
    }

    /// Release the image and any texture the host holds for it.
    pub fn destroy(mut self, host: &mut dyn TextureHost) {
        if let Some(texture) = self.texture.take() {
            host.destroy_texture(texture);
        }
    }

    /// Split borrow used by backends to (re)upload the texture.
    pub(crate) fn texture_parts(&mut self) -> (&mut Option<TextureId>, &[Pixel]) {
        (&mut self.texture, self.store.as_slice())
    }

    pub(crate) fn mark_texture_fresh(&mut self) {
        self.texture_stale = false;
    }

    /// Copy out as straight-alpha RGBA8, e.g. to save as PNG.
    pub fn to_rgba_image(&self) -> image::RgbaImage {
        let format = self.format;
        let mut out = image::RgbaImage::new(self.width, self.height);
        for (dst, &p) in out.pixels_mut().zip(self.pixels()) {
            *dst = image::Rgba(format.to_rgba(p));
        }
        out
    }
}

impl Drop for Image<'_> {
    fn drop(&mut self) {
        if let Some(texture) = self.texture {
            tracing::warn!(
                ?texture,
                width = self.width,
                height = self.height,
                "image dropped without destroy(); its texture stays allocated until the backend is reset"
            );
        }
    }
}

impl std::fmt::Debug for Image<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field(
                "owned",
                &matches!(self.store, PixelStore::Owned(_)),
            )
            .field("texture", &self.texture)
            .finish()
    }
}

fn pixel_count(width: u32, height: u32) -> RenderResult<usize> {
    if width == 0 || height == 0 {
        return Err(RenderError::allocation(format!(
            "image dimensions must be non-zero (got {width}x{height})"
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| RenderError::allocation(format!("image size overflow: {width}x{height}")))
}

fn display_name(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{dir}/{name}")
    }
}

#[cfg(test)]
#[path = "../../tests/unit/bitmap/image.rs"]
mod tests;
