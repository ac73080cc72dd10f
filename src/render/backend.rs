use std::str::FromStr;

use crate::bitmap::Image;
use crate::compose::blend::BlendType;
use crate::foundation::core::{PixelRect, TransferRect};
use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::pixel::{Pixel, PixelFormat};
use crate::render::surface::DisplaySurface;
use crate::session::config::EngineConfig;

/// Opaque handle to a backend texture.
///
/// The generation changes whenever the backend recreates its device, so a handle that survived
/// a device loss is recognized as stale instead of aliasing a new texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl TextureId {
    pub(crate) const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    pub fn slot(self) -> u32 {
        self.slot
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Texture synchronization used by [`Image::lock_with`].
pub trait TextureHost {
    /// Prepare `texture` for a CPU write of a `width x height` image, creating it if absent.
    fn lock_texture(
        &mut self,
        width: u32,
        height: u32,
        texture: &mut Option<TextureId>,
    ) -> RenderResult<()>;

    /// Receive the written pixels and make the texture ready for sampling.
    fn unlock_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[Pixel],
        texture: &mut Option<TextureId>,
    ) -> RenderResult<()>;

    /// Release a texture. Unknown or stale handles are ignored.
    fn destroy_texture(&mut self, texture: TextureId);
}

/// A rendering backend: software compositing into a back buffer, or GPU blits into a render
/// target.
///
/// Every render call must sit between [`Backend::start_frame`] and [`Backend::end_frame`];
/// calling one outside that bracket panics. Source images must use [`Backend::pixel_format`].
pub trait Backend: TextureHost {
    fn kind(&self) -> BackendKind;

    /// Channel order images must use with this backend.
    fn pixel_format(&self) -> PixelFormat;

    /// Back buffer / render target size.
    fn size(&self) -> (u32, u32);

    fn start_frame(&mut self) -> RenderResult<()>;

    /// Finish the frame and push the `dirty` region to `surface`.
    ///
    /// A frame that hit a device loss is discarded and this returns the loss error.
    fn end_frame(&mut self, dirty: PixelRect, surface: &mut dyn DisplaySurface)
    -> RenderResult<()>;

    /// Composite `rect` of `src` into the back buffer.
    fn render_image(
        &mut self,
        src: &mut Image<'_>,
        rect: TransferRect,
        alpha: u8,
        blend: BlendType,
    ) -> RenderResult<()>;

    /// Mask-dissolve `rect` of `src` into the back buffer at `level`.
    fn render_image_mask(
        &mut self,
        src: &mut Image<'_>,
        rect: TransferRect,
        level: u8,
    ) -> RenderResult<()>;

    /// Fill `rect` of the back buffer with `color`.
    fn render_clear(&mut self, rect: PixelRect, color: Pixel) -> RenderResult<()>;

    /// Shift applied to every presented rectangle.
    fn set_display_offset(&mut self, x: i32, y: i32);

    /// Re-present `rect` of the last finished frame without rendering.
    fn repaint(&mut self, rect: PixelRect, surface: &mut dyn DisplaySurface) -> RenderResult<()>;

    /// Recreate the device after a loss. No-op for backends that cannot lose it.
    fn recover(&mut self) -> RenderResult<()>;

    /// Copy of the last finished frame.
    fn snapshot(&mut self) -> RenderResult<Image<'static>>;
}

/// Available backend kinds.
///
/// - `Software` and `Hardware` are always available; `Hardware` runs on the CPU reference
///   device.
/// - `Gpu` requires the `gpu` feature.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Software,
    Hardware,
    Gpu,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Software => "software",
            Self::Hardware => "hardware",
            Self::Gpu => "gpu",
        }
    }
}

impl FromStr for BackendKind {
    type Err = RenderError;

    fn from_str(s: &str) -> RenderResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "software" | "sw" => Ok(Self::Software),
            "hardware" | "hw" => Ok(Self::Hardware),
            "gpu" | "wgpu" => Ok(Self::Gpu),
            other => Err(RenderError::config(format!(
                "unknown backend \"{other}\" (expected software, hardware or gpu)"
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create the backend selected by `kind`, sized and seeded from `config`.
#[tracing::instrument(skip(config), fields(width = config.window_width, height = config.window_height))]
pub fn create_backend(
    kind: BackendKind,
    config: &EngineConfig,
) -> RenderResult<Box<dyn Backend + 'static>> {
    config.validate()?;
    let (w, h, white) = (config.window_width, config.window_height, config.window_white);
    let backend: Box<dyn Backend> = match kind {
        BackendKind::Software => Box::new(crate::render::software::SoftwareBackend::new(
            w, h, white,
        )?),
        BackendKind::Hardware => Box::new(crate::render::hardware::HardwareBackend::new(
            crate::render::reference::ReferenceDevice::new(),
            w,
            h,
            white,
        )?),
        #[cfg(feature = "gpu")]
        BackendKind::Gpu => Box::new(crate::render::hardware::HardwareBackend::new(
            crate::render::gpu::WgpuDevice::new()?,
            w,
            h,
            white,
        )?),
        #[cfg(not(feature = "gpu"))]
        BackendKind::Gpu => {
            return Err(RenderError::config(
                "gpu backend requested but vn-render was built without the `gpu` feature",
            ));
        }
    };
    tracing::debug!(backend = %kind, format = ?backend.pixel_format(), "backend created");
    Ok(backend)
}
