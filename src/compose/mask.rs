use super::blend::{BlendType, blend_pixel, for_each_row};
use super::clip::clip_transfer;
use crate::bitmap::{Image, ImageLock};
use crate::foundation::core::TransferRect;

/// Number of dissolve steps; valid mask levels are `0..MASK_LEVELS`.
pub const MASK_LEVELS: u8 = 28;

/// Index of `(x, y)` in the 8x8 ordered-dither (Bayer) matrix, in `0..64`.
pub const fn bayer8(x: u32, y: u32) -> u32 {
    let mut v = 0;
    let mut bit = 0;
    while bit < 3 {
        let bx = (x >> bit) & 1;
        let by = (y >> bit) & 1;
        v |= (((bx ^ by) << 1) | by) << (2 * (2 - bit));
        bit += 1;
    }
    v
}

/// Dissolve threshold of destination pixel `(x, y)`, in `0..MASK_LEVELS`.
///
/// The pattern tiles every 8 pixels in destination coordinates, so a dissolve drawn over
/// several calls lines up with itself.
pub const fn mask_threshold(x: i32, y: i32) -> u8 {
    let b = bayer8((x & 7) as u32, (y & 7) as u32);
    (b * MASK_LEVELS as u32 / 64) as u8
}

/// `true` when level `level` covers destination pixel `(x, y)`.
pub const fn mask_covers(x: i32, y: i32, level: u8) -> bool {
    mask_threshold(x, y) <= level
}

/// Graduated dissolve: copy `src` over `dst` (source-over at full opacity) at the positions
/// covered by `level`, leaving the rest untouched.
///
/// Coverage only grows with `level`; `MASK_LEVELS - 1` covers every pixel.
///
/// # Panics
///
/// Panics if `level >= MASK_LEVELS`.
pub fn draw_mask(dst: &mut ImageLock<'_, '_>, src: &Image<'_>, rect: TransferRect, level: u8) {
    assert!(
        level < MASK_LEVELS,
        "mask level {level} out of range 0..{MASK_LEVELS}"
    );
    debug_assert_eq!(
        dst.format(),
        src.format(),
        "source and destination pixel formats differ"
    );
    let mut r = rect;
    if !clip_transfer(src.width(), src.height(), dst.width(), dst.height(), &mut r) {
        return;
    }

    let dst_stride = dst.width() as usize;
    let x0 = r.dst_x;
    for_each_row(
        dst.pixels_mut(),
        dst_stride,
        src.pixels(),
        src.width() as usize,
        r,
        |d, s, y| {
            for (i, (d, &s)) in d.iter_mut().zip(s).enumerate() {
                if mask_covers(x0 + i as i32, y, level) {
                    *d = blend_pixel(BlendType::Normal, *d, s, 255);
                }
            }
        },
    );
}

#[cfg(test)]
#[path = "../../tests/unit/compose/mask.rs"]
mod tests;
