use std::str::FromStr;

use super::clip::clip_transfer;
use crate::bitmap::{Image, ImageLock};
use crate::foundation::core::TransferRect;
use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::pixel::Pixel;

/// How a source pixel combines with the destination pixel under it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendType {
    /// Straight copy, alpha parameter ignored.
    None,
    /// Shift-based approximation of `Normal`.
    Fast,
    /// Source-over with rounded division by 255.
    #[default]
    Normal,
    /// Saturating add of the weighted source.
    Add,
    /// Saturating subtract of the weighted source.
    Sub,
}

impl BlendType {
    pub const ALL: [Self; 5] = [Self::None, Self::Fast, Self::Normal, Self::Add, Self::Sub];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Fast => "fast",
            Self::Normal => "normal",
            Self::Add => "add",
            Self::Sub => "sub",
        }
    }
}

impl FromStr for BlendType {
    type Err = RenderError;

    fn from_str(s: &str) -> RenderResult<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RenderError::parse(format!("unknown blend type \"{s}\"")))
    }
}

impl std::fmt::Display for BlendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite the `rect` block of `src` into `dst`.
///
/// The block is clipped against both images first; a block that clips away is a no-op.
/// The per-pixel coverage is `src.a * alpha / 255`. Both images must share a pixel format.
pub fn draw(
    dst: &mut ImageLock<'_, '_>,
    src: &Image<'_>,
    rect: TransferRect,
    alpha: u8,
    blend: BlendType,
) {
    debug_assert_eq!(
        dst.format(),
        src.format(),
        "source and destination pixel formats differ"
    );
    if alpha == 0 && blend != BlendType::None {
        return;
    }
    let mut r = rect;
    if !clip_transfer(src.width(), src.height(), dst.width(), dst.height(), &mut r) {
        return;
    }

    let dst_stride = dst.width() as usize;
    for_each_row(
        dst.pixels_mut(),
        dst_stride,
        src.pixels(),
        src.width() as usize,
        r,
        |d, s, _| match blend {
            BlendType::None => d.copy_from_slice(s),
            _ => {
                for (d, &s) in d.iter_mut().zip(s) {
                    *d = blend_pixel(blend, *d, s, alpha);
                }
            }
        },
    );
}

/// Visit the clipped block row by row as `(dst_row, src_row, y_in_dst)`.
pub(crate) fn for_each_row(
    dst: &mut [Pixel],
    dst_stride: usize,
    src: &[Pixel],
    src_stride: usize,
    r: TransferRect,
    mut f: impl FnMut(&mut [Pixel], &[Pixel], i32),
) {
    let w = r.width as usize;
    for row in 0..r.height {
        let d0 = (r.dst_y + row) as usize * dst_stride + r.dst_x as usize;
        let s0 = (r.src_y + row) as usize * src_stride + r.src_x as usize;
        f(&mut dst[d0..d0 + w], &src[s0..s0 + w], r.dst_y + row);
    }
}

/// Combine one destination pixel with one source pixel.
///
/// Color channels sit at bits 0, 8 and 16 and alpha at bit 24 in every [`PixelFormat`], so the
/// math is channel-order independent.
///
/// [`PixelFormat`]: crate::PixelFormat
#[inline]
pub fn blend_pixel(blend: BlendType, d: Pixel, s: Pixel, alpha: u8) -> Pixel {
    if blend == BlendType::None {
        return s;
    }
    let w = mul_div255(channel(s, 24), u32::from(alpha));
    if w == 0 {
        return d;
    }
    match blend {
        BlendType::None => s,
        BlendType::Normal => {
            let inv = 255 - w;
            let mut out = (w + mul_div255(channel(d, 24), inv)).min(255) << 24;
            for shift in COLOR_SHIFTS {
                let c = (channel(d, shift) * inv + channel(s, shift) * w + 127) / 255;
                out |= c << shift;
            }
            out
        }
        BlendType::Fast => {
            let inv = 255 - w;
            let w8 = w + (w >> 7);
            let mut out = (w + mul_div255(channel(d, 24), inv)).min(255) << 24;
            for shift in COLOR_SHIFTS {
                let c = (channel(d, shift) * (256 - w8) + channel(s, shift) * w8) >> 8;
                out |= c << shift;
            }
            out
        }
        BlendType::Add => {
            let mut out = d & 0xFF00_0000;
            for shift in COLOR_SHIFTS {
                let c = (channel(d, shift) + mul_div255(channel(s, shift), w)).min(255);
                out |= c << shift;
            }
            out
        }
        BlendType::Sub => {
            let mut out = d & 0xFF00_0000;
            for shift in COLOR_SHIFTS {
                let c = channel(d, shift).saturating_sub(mul_div255(channel(s, shift), w));
                out |= c << shift;
            }
            out
        }
    }
}

const COLOR_SHIFTS: [u32; 3] = [0, 8, 16];

#[inline]
fn channel(p: Pixel, shift: u32) -> u32 {
    (p >> shift) & 0xFF
}

#[inline]
pub(crate) fn mul_div255(x: u32, y: u32) -> u32 {
    (x * y + 127) / 255
}

#[cfg(test)]
#[path = "../../tests/unit/compose/blend.rs"]
mod tests;
