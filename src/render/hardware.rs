use crate::bitmap::Image;
use crate::compose::blend::BlendType;
use crate::compose::clip::clip_transfer;
use crate::compose::mask::MASK_LEVELS;
use crate::foundation::core::{PixelRect, TransferRect};
use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::pixel::{Pixel, PixelFormat};
use crate::render::backend::{Backend, BackendKind, TextureHost, TextureId};
use crate::render::device::{DeviceTexture, DrawOp, GpuDevice};
use crate::render::surface::DisplaySurface;

/// Lifecycle of a [`HardwareBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Uninitialized,
    Initialized,
    FrameActive,
    /// The device was lost; only [`Backend::recover`] leaves this state.
    Lost,
    Destroyed,
}

/// GPU backend: images become textures, draws become blended blits into a render target.
///
/// Textures are uploaded lazily: an image whose pixels changed since its last upload (or whose
/// texture belongs to a previous device generation) is re-uploaded right before it is sampled.
pub struct HardwareBackend<D: GpuDevice> {
    device: D,
    state: DeviceState,
    width: u32,
    height: u32,
    clear: Pixel,
    generation: u32,
    offset: (i32, i32),
}

impl<D: GpuDevice> HardwareBackend<D> {
    /// Initialize `device` with a `width x height` render target cleared to white or black.
    #[tracing::instrument(skip(device))]
    pub fn new(device: D, width: u32, height: u32, white: bool) -> RenderResult<Self> {
        let format = PixelFormat::Abgr;
        let mut backend = Self {
            device,
            state: DeviceState::Uninitialized,
            width,
            height,
            clear: if white { format.white() } else { format.black() },
            generation: 1,
            offset: (0, 0),
        };
        backend.device.initialize(width, height, backend.clear)?;
        backend.state = DeviceState::Initialized;
        Ok(backend)
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Incremented every time the device is recreated.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Release the device's resources. The backend is unusable afterwards.
    pub fn destroy(&mut self) {
        if self.state == DeviceState::Destroyed {
            return;
        }
        if let Err(err) = self.device.reset() {
            tracing::warn!(error = %err, "device reset failed during destroy");
        }
        self.state = DeviceState::Destroyed;
    }

    fn check_usable(&self, op: &str) -> RenderResult<()> {
        match self.state {
            DeviceState::Lost => Err(RenderError::device_lost(format!(
                "{op}: device lost, call recover()"
            ))),
            DeviceState::Destroyed => panic!("{op} called on a destroyed backend"),
            DeviceState::Uninitialized => panic!("{op} called before initialization"),
            DeviceState::Initialized | DeviceState::FrameActive => Ok(()),
        }
    }

    fn check_in_frame(&self, op: &str) -> RenderResult<()> {
        self.check_usable(op)?;
        assert!(
            self.state == DeviceState::FrameActive,
            "{op} called outside start_frame/end_frame"
        );
        Ok(())
    }

    /// Record a device failure. A loss discards the frame in progress.
    fn fail(&mut self, err: RenderError) -> RenderError {
        if err.is_device_lost() && self.state != DeviceState::Lost {
            tracing::warn!(error = %err, "device lost; discarding frame");
            self.device.discard_scene();
            self.state = DeviceState::Lost;
        }
        err
    }

    fn live_slot(&self, texture: Option<TextureId>) -> Option<DeviceTexture> {
        texture
            .filter(|t| t.generation == self.generation)
            .map(|t| t.slot)
    }

    fn ensure_texture(
        &mut self,
        width: u32,
        height: u32,
        texture: &mut Option<TextureId>,
    ) -> RenderResult<DeviceTexture> {
        if let Some(slot) = self.live_slot(*texture) {
            return Ok(slot);
        }
        let slot = self
            .device
            .create_texture(width, height)
            .map_err(|e| self.fail(e))?;
        *texture = Some(TextureId::new(slot, self.generation));
        Ok(slot)
    }

    /// Make sure `src` has an up-to-date texture on the current device.
    fn prepare_source(&mut self, src: &mut Image<'_>) -> RenderResult<DeviceTexture> {
        let needs_upload = src.is_texture_stale() || self.live_slot(src.texture()).is_none();
        let (w, h) = (src.width(), src.height());
        let (texture, pixels) = src.texture_parts();
        let slot = self.ensure_texture(w, h, texture)?;
        if needs_upload {
            self.device
                .upload_texture(slot, pixels)
                .map_err(|e| self.fail(e))?;
            src.mark_texture_fresh();
        }
        Ok(slot)
    }

    fn clip_source(&self, src: &Image<'_>, rect: TransferRect) -> Option<TransferRect> {
        let mut r = rect;
        clip_transfer(src.width(), src.height(), self.width, self.height, &mut r).then_some(r)
    }

    fn submit(&mut self, op: DrawOp) -> RenderResult<()> {
        self.device.draw(&op).map_err(|e| self.fail(e))
    }
}

impl<D: GpuDevice> TextureHost for HardwareBackend<D> {
    fn lock_texture(
        &mut self,
        width: u32,
        height: u32,
        texture: &mut Option<TextureId>,
    ) -> RenderResult<()> {
        self.check_usable("lock_texture")?;
        self.ensure_texture(width, height, texture).map(|_| ())
    }

    fn unlock_texture(
        &mut self,
        width: u32,
        height: u32,
        pixels: &[Pixel],
        texture: &mut Option<TextureId>,
    ) -> RenderResult<()> {
        self.check_usable("unlock_texture")?;
        let slot = self.ensure_texture(width, height, texture)?;
        self.device
            .upload_texture(slot, pixels)
            .map_err(|e| self.fail(e))
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if texture.generation == self.generation
            && matches!(
                self.state,
                DeviceState::Initialized | DeviceState::FrameActive
            )
        {
            self.device.release_texture(texture.slot);
        }
    }
}

impl<D: GpuDevice> Backend for HardwareBackend<D> {
    fn kind(&self) -> BackendKind {
        self.device.kind()
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Abgr
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn start_frame(&mut self) -> RenderResult<()> {
        self.check_usable("start_frame")?;
        assert!(
            self.state != DeviceState::FrameActive,
            "start_frame called while a frame is active"
        );
        self.device.begin_scene().map_err(|e| self.fail(e))?;
        self.state = DeviceState::FrameActive;
        Ok(())
    }

    fn end_frame(
        &mut self,
        dirty: PixelRect,
        surface: &mut dyn DisplaySurface,
    ) -> RenderResult<()> {
        if self.state == DeviceState::Lost {
            return Err(RenderError::device_lost("frame discarded after device loss"));
        }
        self.check_in_frame("end_frame")?;
        self.device.end_scene().map_err(|e| self.fail(e))?;
        self.state = DeviceState::Initialized;
        let dirty = dirty.intersect(PixelRect::from_size(self.width, self.height));
        if dirty.is_empty() {
            return Ok(());
        }
        self.device
            .present(dirty, self.offset, surface)
            .map_err(|e| self.fail(e))
    }

    fn render_image(
        &mut self,
        src: &mut Image<'_>,
        rect: TransferRect,
        alpha: u8,
        blend: BlendType,
    ) -> RenderResult<()> {
        self.check_in_frame("render_image")?;
        debug_assert_eq!(src.format(), PixelFormat::Abgr, "source pixel format differs");
        if alpha == 0 && blend != BlendType::None {
            return Ok(());
        }
        let Some(rect) = self.clip_source(src, rect) else {
            return Ok(());
        };
        let texture = self.prepare_source(src)?;
        self.submit(DrawOp::Blit {
            texture,
            rect,
            alpha,
            blend,
        })
    }

    fn render_image_mask(
        &mut self,
        src: &mut Image<'_>,
        rect: TransferRect,
        level: u8,
    ) -> RenderResult<()> {
        assert!(
            level < MASK_LEVELS,
            "mask level {level} out of range 0..{MASK_LEVELS}"
        );
        self.check_in_frame("render_image_mask")?;
        let Some(rect) = self.clip_source(src, rect) else {
            return Ok(());
        };
        let texture = self.prepare_source(src)?;
        self.submit(DrawOp::Mask {
            texture,
            rect,
            level,
        })
    }

    fn render_clear(&mut self, rect: PixelRect, color: Pixel) -> RenderResult<()> {
        self.check_in_frame("render_clear")?;
        let rect = rect.intersect(PixelRect::from_size(self.width, self.height));
        if rect.is_empty() {
            return Ok(());
        }
        self.submit(DrawOp::Clear { rect, color })
    }

    fn set_display_offset(&mut self, x: i32, y: i32) {
        self.offset = (x, y);
    }

    fn repaint(&mut self, rect: PixelRect, surface: &mut dyn DisplaySurface) -> RenderResult<()> {
        self.check_usable("repaint")?;
        let rect = rect.intersect(PixelRect::from_size(self.width, self.height));
        if rect.is_empty() {
            return Ok(());
        }
        self.device
            .present(rect, self.offset, surface)
            .map_err(|e| self.fail(e))
    }

    #[tracing::instrument(skip(self), fields(generation = self.generation))]
    fn recover(&mut self) -> RenderResult<()> {
        match self.state {
            DeviceState::Lost => {}
            DeviceState::Destroyed => panic!("recover called on a destroyed backend"),
            _ => return Ok(()),
        }
        self.device.reset()?;
        self.device.initialize(self.width, self.height, self.clear)?;
        self.generation = self.generation.wrapping_add(1);
        self.state = DeviceState::Initialized;
        tracing::info!(generation = self.generation, "device recreated");
        Ok(())
    }

    fn snapshot(&mut self) -> RenderResult<Image<'static>> {
        self.check_usable("snapshot")?;
        let front = self.device.read_front().map_err(|e| self.fail(e))?;
        let mut copy = Image::create(self.width, self.height, PixelFormat::Abgr)?;
        {
            let mut lock = copy.lock();
            let dst = lock.pixels_mut();
            if front.len() != dst.len() {
                return Err(RenderError::device(format!(
                    "front buffer holds {} pixels, expected {}",
                    front.len(),
                    dst.len()
                )));
            }
            dst.copy_from_slice(&front);
        }
        Ok(copy)
    }
}

impl<D: GpuDevice> Drop for HardwareBackend<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/hardware.rs"]
mod tests;
