//! CPU reference device: emulates a GPU blending unit in normalized floating point.

use std::cell::Cell;
use std::rc::Rc;

use crate::compose::blend::BlendType;
use crate::compose::clip::clip_transfer;
use crate::compose::mask::mask_covers;
use crate::foundation::core::{PixelRect, TransferRect};
use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::pixel::{Pixel, PixelFormat};
use crate::render::backend::BackendKind;
use crate::render::device::{DeviceTexture, DrawOp, GpuDevice};
use crate::render::surface::{DisplaySurface, PixelView};

const FORMAT: PixelFormat = PixelFormat::Abgr;

struct Texture {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

/// Handle that makes a [`ReferenceDevice`] report a device loss on its next call.
#[derive(Clone, Debug, Default)]
pub struct DeviceLossTrigger(Rc<Cell<bool>>);

impl DeviceLossTrigger {
    pub fn lose(&self) {
        self.0.set(true);
    }

    pub fn is_lost(&self) -> bool {
        self.0.get()
    }
}

/// Software emulation of a GPU with `Rgba8Unorm` textures and a fixed-function blender.
///
/// Every channel is converted to `[0, 1]`, blended in `f32` and rounded back to 8 bits, the
/// way a blending unit does, so results may differ from the integer compositor by one step.
#[derive(Default)]
pub struct ReferenceDevice {
    width: u32,
    height: u32,
    target: Vec<Pixel>,
    front: Vec<Pixel>,
    textures: Vec<Option<Texture>>,
    in_scene: bool,
    lost: DeviceLossTrigger,
    draws: u64,
}

impl ReferenceDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fault injection handle; stays valid after the device is moved into a backend.
    pub fn loss_trigger(&self) -> DeviceLossTrigger {
        self.lost.clone()
    }

    /// Number of draw operations executed since creation.
    pub fn draw_count(&self) -> u64 {
        self.draws
    }

    fn check_alive(&self) -> RenderResult<()> {
        if self.lost.is_lost() {
            return Err(RenderError::device_lost("reference device was lost"));
        }
        Ok(())
    }

    fn blit(
        &mut self,
        id: DeviceTexture,
        rect: TransferRect,
        mut op: impl FnMut(i32, i32, Pixel, Pixel) -> Pixel,
    ) -> RenderResult<()> {
        let tex = self
            .textures
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RenderError::device(format!("unknown texture slot {id}")))?;
        let mut r = rect;
        if !clip_transfer(tex.width, tex.height, self.width, self.height, &mut r) {
            return Ok(());
        }
        let (src_stride, dst_stride) = (tex.width as usize, self.width as usize);
        for row in 0..r.height {
            let (sy, dy) = (r.src_y + row, r.dst_y + row);
            for col in 0..r.width {
                let (sx, dx) = (r.src_x + col, r.dst_x + col);
                let s = tex.pixels[sy as usize * src_stride + sx as usize];
                let d = &mut self.target[dy as usize * dst_stride + dx as usize];
                *d = op(dx, dy, *d, s);
            }
        }
        Ok(())
    }
}

impl GpuDevice for ReferenceDevice {
    fn kind(&self) -> BackendKind {
        BackendKind::Hardware
    }

    fn initialize(&mut self, width: u32, height: u32, clear: Pixel) -> RenderResult<()> {
        self.check_alive()?;
        let len = (width as usize) * (height as usize);
        self.width = width;
        self.height = height;
        self.target = vec![clear; len];
        self.front = self.target.clone();
        self.in_scene = false;
        Ok(())
    }

    fn create_texture(&mut self, width: u32, height: u32) -> RenderResult<DeviceTexture> {
        self.check_alive()?;
        let texture = Texture {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize)],
        };
        let slot = match self.textures.iter().position(Option::is_none) {
            Some(free) => {
                self.textures[free] = Some(texture);
                free
            }
            None => {
                self.textures.push(Some(texture));
                self.textures.len() - 1
            }
        };
        u32::try_from(slot).map_err(|_| RenderError::allocation("texture slots exhausted"))
    }

    fn upload_texture(&mut self, texture: DeviceTexture, pixels: &[Pixel]) -> RenderResult<()> {
        self.check_alive()?;
        let tex = self
            .textures
            .get_mut(texture as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| RenderError::device(format!("unknown texture slot {texture}")))?;
        if pixels.len() < tex.pixels.len() {
            return Err(RenderError::device(format!(
                "upload of {} pixels into {}x{} texture",
                pixels.len(),
                tex.width,
                tex.height
            )));
        }
        let n = tex.pixels.len();
        tex.pixels.copy_from_slice(&pixels[..n]);
        Ok(())
    }

    fn release_texture(&mut self, texture: DeviceTexture) {
        if let Some(slot) = self.textures.get_mut(texture as usize) {
            *slot = None;
        }
    }

    fn begin_scene(&mut self) -> RenderResult<()> {
        self.check_alive()?;
        self.in_scene = true;
        Ok(())
    }

    fn draw(&mut self, op: &DrawOp) -> RenderResult<()> {
        self.check_alive()?;
        if !self.in_scene {
            return Err(RenderError::device("draw outside begin_scene/end_scene"));
        }
        self.draws += 1;
        match *op {
            DrawOp::Blit {
                texture,
                rect,
                alpha,
                blend,
            } => self.blit(texture, rect, |_, _, d, s| blend_unit(blend, d, s, alpha)),
            DrawOp::Mask {
                texture,
                rect,
                level,
            } => self.blit(texture, rect, |x, y, d, s| {
                if mask_covers(x, y, level) {
                    blend_unit(BlendType::Normal, d, s, 255)
                } else {
                    d
                }
            }),
            DrawOp::Clear { rect, color } => {
                let r = rect.intersect(PixelRect::from_size(self.width, self.height));
                let stride = self.width as usize;
                for y in r.y..r.y + r.height {
                    let row = y as usize * stride + r.x as usize;
                    self.target[row..row + r.width as usize].fill(color);
                }
                Ok(())
            }
        }
    }

    fn end_scene(&mut self) -> RenderResult<()> {
        self.check_alive()?;
        self.in_scene = false;
        self.front.copy_from_slice(&self.target);
        Ok(())
    }

    fn discard_scene(&mut self) {
        self.in_scene = false;
        self.target.copy_from_slice(&self.front);
    }

    fn present(
        &mut self,
        rect: PixelRect,
        offset: (i32, i32),
        surface: &mut dyn DisplaySurface,
    ) -> RenderResult<()> {
        self.check_alive()?;
        let view = PixelView {
            pixels: &self.front,
            width: self.width,
            height: self.height,
            format: FORMAT,
        };
        surface.present(view, rect, offset)
    }

    fn read_front(&mut self) -> RenderResult<Vec<Pixel>> {
        self.check_alive()?;
        Ok(self.front.clone())
    }

    fn reset(&mut self) -> RenderResult<()> {
        self.textures.clear();
        self.target.clear();
        self.front.clear();
        self.in_scene = false;
        self.lost.0.set(false);
        Ok(())
    }
}

fn unorm(v: u32) -> f32 {
    (v & 0xFF) as f32 / 255.0
}

fn to_byte(v: f32) -> u32 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u32
}

/// Fixed-function blend of one fragment, mirroring the pipeline blend states of the GPU device.
fn blend_unit(blend: BlendType, d: Pixel, s: Pixel, alpha: u8) -> Pixel {
    if blend == BlendType::None {
        return s;
    }
    let w = unorm(s >> 24) * (f32::from(alpha) / 255.0);
    let da = unorm(d >> 24);
    let mut out = 0;
    for shift in [0, 8, 16] {
        let (dc, sc) = (unorm(d >> shift), unorm(s >> shift));
        let c = match blend {
            BlendType::Add => dc + sc * w,
            BlendType::Sub => dc - sc * w,
            _ => sc * w + dc * (1.0 - w),
        };
        out |= to_byte(c) << shift;
    }
    let a = match blend {
        BlendType::Add | BlendType::Sub => da,
        _ => w + da * (1.0 - w),
    };
    out | (to_byte(a) << 24)
}

#[cfg(test)]
#[path = "../../tests/unit/render/reference.rs"]
mod tests;
