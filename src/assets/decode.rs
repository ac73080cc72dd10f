use anyhow::Context;

use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::pixel::{Pixel, PixelFormat};

/// Largest decoded dimension accepted from a file.
const MAX_DIM: u32 = 16_384;

/// Straight-alpha pixels decoded from a file, packed in the requested format.
#[derive(Debug, Clone)]
pub(crate) struct DecodedImage {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) pixels: Vec<Pixel>,
}

/// Decode an image file. SVG documents are rasterized at their intrinsic size; everything else
/// goes through the `image` crate's format detection.
#[tracing::instrument(skip(bytes), fields(len = bytes.len()))]
pub(crate) fn decode_image(
    name: &str,
    bytes: &[u8],
    format: PixelFormat,
) -> RenderResult<DecodedImage> {
    let decoded = if looks_like_svg(name, bytes) {
        decode_svg(bytes, format)
    } else {
        decode_raster(bytes, format)
    };
    decoded.map_err(|e| RenderError::decode(format!("{name}: {e:#}")))
}

fn decode_raster(bytes: &[u8], format: PixelFormat) -> anyhow::Result<DecodedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    check_dims(width, height)?;

    let pixels = rgba.pixels().map(|px| format.from_rgba(px.0)).collect();
    Ok(DecodedImage {
        width,
        height,
        pixels,
    })
}

fn decode_svg(bytes: &[u8], format: PixelFormat) -> anyhow::Result<DecodedImage> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;

    fn to_px(v: f32) -> anyhow::Result<u32> {
        if !v.is_finite() || v <= 0.0 {
            anyhow::bail!("svg has invalid width/height");
        }
        Ok((v.ceil() as u32).max(1))
    }

    let size = tree.size();
    let width = to_px(size.width())?;
    let height = to_px(size.height())?;
    check_dims(width, height)?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| anyhow::anyhow!("failed to allocate svg pixmap"))?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::identity(),
        &mut pixmap.as_mut(),
    );

    // tiny-skia produces premultiplied pixels; images here are straight alpha.
    let pixels = pixmap
        .pixels()
        .iter()
        .map(|px| {
            let c = px.demultiply();
            format.make_pixel(c.alpha(), c.red(), c.green(), c.blue())
        })
        .collect();

    Ok(DecodedImage {
        width,
        height,
        pixels,
    })
}

fn check_dims(width: u32, height: u32) -> anyhow::Result<()> {
    if width == 0 || height == 0 {
        anyhow::bail!("image has zero width or height");
    }
    if width > MAX_DIM || height > MAX_DIM {
        anyhow::bail!("image too large: {width}x{height} (max {MAX_DIM}x{MAX_DIM})");
    }
    Ok(())
}

fn looks_like_svg(name: &str, bytes: &[u8]) -> bool {
    if name.to_ascii_lowercase().ends_with(".svg") {
        return true;
    }
    let head = &bytes[..bytes.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
