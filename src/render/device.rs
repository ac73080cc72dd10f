use crate::compose::blend::BlendType;
use crate::foundation::core::{PixelRect, TransferRect};
use crate::foundation::error::RenderResult;
use crate::foundation::pixel::Pixel;
use crate::render::backend::BackendKind;
use crate::render::surface::DisplaySurface;

/// Device-local texture slot.
pub type DeviceTexture = u32;

/// One accelerated draw into the render target. Rectangles arrive already clipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOp {
    Blit {
        texture: DeviceTexture,
        rect: TransferRect,
        alpha: u8,
        blend: BlendType,
    },
    Mask {
        texture: DeviceTexture,
        rect: TransferRect,
        level: u8,
    },
    Clear {
        rect: PixelRect,
        color: Pixel,
    },
}

/// What the hardware backend needs from a GPU: textures, a persistent render target and a
/// blending unit.
///
/// The render target keeps its content across scenes. `end_scene` commits it as the front
/// buffer; `discard_scene` rolls it back to the last committed front buffer.
/// Any call may fail with [`RenderError::DeviceLost`](crate::RenderError::DeviceLost); after
/// that only [`GpuDevice::reset`] is expected to succeed.
pub trait GpuDevice {
    fn kind(&self) -> BackendKind;

    /// Create the render target and fill it with `clear`.
    fn initialize(&mut self, width: u32, height: u32, clear: Pixel) -> RenderResult<()>;

    fn create_texture(&mut self, width: u32, height: u32) -> RenderResult<DeviceTexture>;

    fn upload_texture(&mut self, texture: DeviceTexture, pixels: &[Pixel]) -> RenderResult<()>;

    fn release_texture(&mut self, texture: DeviceTexture);

    fn begin_scene(&mut self) -> RenderResult<()>;

    fn draw(&mut self, op: &DrawOp) -> RenderResult<()>;

    fn end_scene(&mut self) -> RenderResult<()>;

    fn discard_scene(&mut self);

    /// Push `rect` of the front buffer to `surface`.
    fn present(
        &mut self,
        rect: PixelRect,
        offset: (i32, i32),
        surface: &mut dyn DisplaySurface,
    ) -> RenderResult<()>;

    /// Read the whole front buffer.
    fn read_front(&mut self) -> RenderResult<Vec<Pixel>>;

    /// Drop every device resource so `initialize` can run again.
    fn reset(&mut self) -> RenderResult<()>;
}
