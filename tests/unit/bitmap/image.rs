use super::*;
use crate::assets::source::MemoryAssetSource;
use crate::foundation::error::RenderError;

#[derive(Default)]
struct RecordingHost {
    locks: u32,
    uploads: Vec<Vec<Pixel>>,
    destroyed: Vec<TextureId>,
    fail_upload: bool,
}

impl TextureHost for RecordingHost {
    fn lock_texture(
        &mut self,
        _width: u32,
        _height: u32,
        texture: &mut Option<TextureId>,
    ) -> RenderResult<()> {
        self.locks += 1;
        if texture.is_none() {
            *texture = Some(TextureId::new(7, 1));
        }
        Ok(())
    }

    fn unlock_texture(
        &mut self,
        _width: u32,
        _height: u32,
        pixels: &[Pixel],
        _texture: &mut Option<TextureId>,
    ) -> RenderResult<()> {
        if self.fail_upload {
            return Err(RenderError::device("upload rejected"));
        }
        self.uploads.push(pixels.to_vec());
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.destroyed.push(texture);
    }
}

#[test]
fn create_is_zero_filled() {
    let img = Image::create(3, 2, PixelFormat::Argb).unwrap();
    assert_eq!(img.width(), 3);
    assert_eq!(img.height(), 2);
    assert_eq!(img.pixels(), &[0; 6]);
    assert!(img.texture().is_none());
}

#[test]
fn create_rejects_zero_dimensions() {
    let err = Image::create(0, 4, PixelFormat::Argb).unwrap_err();
    assert!(matches!(err, RenderError::Allocation(_)));
}

#[test]
fn borrowed_pixels_are_written_in_place() {
    let mut mem = vec![0u32; 4];
    {
        let mut img = Image::create_with_pixels(2, 2, &mut mem, PixelFormat::Argb).unwrap();
        let mut lock = img.lock();
        assert!(lock.set_pixel(1, 1, 0xFF11_2233));
        lock.unlock().unwrap();
    }
    assert_eq!(mem, vec![0, 0, 0, 0xFF11_2233]);
}

#[test]
fn borrowed_buffer_too_small_is_rejected() {
    let mut mem = vec![0u32; 3];
    let err = Image::create_with_pixels(2, 2, &mut mem, PixelFormat::Argb).unwrap_err();
    assert!(matches!(err, RenderError::Allocation(_)));
}

#[test]
fn create_from_color_fills_every_pixel() {
    let img = Image::create_from_color(2, 2, "#ff0000", PixelFormat::Abgr).unwrap();
    assert!(img.pixels().iter().all(|&p| p == 0xFF00_00FF));
}

#[test]
fn create_from_color_rejects_bad_string() {
    let err = Image::create_from_color(2, 2, "not-a-color", PixelFormat::Argb).unwrap_err();
    assert!(matches!(err, RenderError::Parse(_)));
}

#[test]
fn create_from_file_missing_is_decode_error() {
    let source = MemoryAssetSource::new();
    let err = Image::create_from_file(&source, "bg", "nope.png", PixelFormat::Argb).unwrap_err();
    assert!(matches!(err, RenderError::Decode(_)));
    assert!(err.to_string().contains("bg/nope.png"));
}

#[test]
fn create_from_file_takes_decoded_size() {
    let mut png = Vec::new();
    let rgba = image::RgbaImage::from_pixel(5, 3, image::Rgba([0, 0, 255, 255]));
    rgba.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    let mut source = MemoryAssetSource::new();
    source.insert("bg", "blue.png", png);

    let img = Image::create_from_file(&source, "bg", "blue.png", PixelFormat::Argb).unwrap();
    assert_eq!((img.width(), img.height()), (5, 3));
    assert_eq!(img.pixel(4, 2), Some(0xFF00_00FF));
}

#[test]
fn clear_rect_is_clipped() {
    let mut img = Image::create(4, 4, PixelFormat::Argb).unwrap();
    let mut lock = img.lock();
    lock.clear_white_rect(PixelRect::new(2, 2, 10, 10));
    lock.clear_black_rect(PixelRect::new(-5, -5, 6, 6));
    drop(lock);

    assert_eq!(img.pixel(0, 0), Some(0xFF00_0000));
    assert_eq!(img.pixel(1, 1), Some(0));
    assert_eq!(img.pixel(3, 3), Some(0xFFFF_FFFF));
    assert_eq!(img.pixel(2, 1), Some(0));
    assert_eq!(img.pixel(4, 4), None);
}

#[test]
fn set_pixel_out_of_bounds_is_ignored() {
    let mut img = Image::create(2, 2, PixelFormat::Argb).unwrap();
    let mut lock = img.lock();
    assert!(!lock.set_pixel(2, 0, 1));
    assert!(!lock.set_pixel(0, -1, 1));
    drop(lock);
    assert!(img.pixels().iter().all(|&p| p == 0));
}

#[test]
fn lock_with_uploads_on_release() {
    let mut host = RecordingHost::default();
    let mut img = Image::create(2, 1, PixelFormat::Argb).unwrap();
    {
        let mut lock = img.lock_with(&mut host).unwrap();
        lock.clear_white();
        lock.unlock().unwrap();
    }
    assert_eq!(host.locks, 1);
    assert_eq!(host.uploads, vec![vec![0xFFFF_FFFF; 2]]);
    assert_eq!(img.texture(), Some(TextureId::new(7, 1)));
    assert!(!img.is_texture_stale());

    img.destroy(&mut host);
    assert_eq!(host.destroyed, vec![TextureId::new(7, 1)]);
}

#[test]
fn dropped_lock_still_uploads() {
    let mut host = RecordingHost::default();
    let mut img = Image::create(1, 1, PixelFormat::Argb).unwrap();
    {
        let mut lock = img.lock_with(&mut host).unwrap();
        lock.clear_black();
    }
    assert_eq!(host.uploads.len(), 1);
    img.destroy(&mut host);
}

#[test]
fn failed_upload_is_reported_and_leaves_texture_stale() {
    let mut host = RecordingHost {
        fail_upload: true,
        ..RecordingHost::default()
    };
    let mut img = Image::create(1, 1, PixelFormat::Argb).unwrap();
    let lock = img.lock_with(&mut host).unwrap();
    let err = lock.unlock().unwrap_err();
    assert!(matches!(err, RenderError::Device(_)));
    assert!(img.is_texture_stale());
    img.destroy(&mut host);
}

#[test]
fn cpu_lock_marks_texture_stale() {
    let mut host = RecordingHost::default();
    let mut img = Image::create(1, 1, PixelFormat::Argb).unwrap();
    img.lock_with(&mut host).unwrap().unlock().unwrap();
    assert!(!img.is_texture_stale());
    img.lock().clear_white();
    assert!(img.is_texture_stale());
    img.destroy(&mut host);
}

#[test]
fn to_rgba_image_is_straight_rgba() {
    let img = Image::create_from_color(1, 1, "#11223380", PixelFormat::Argb).unwrap();
    let rgba = img.to_rgba_image();
    assert_eq!(rgba.get_pixel(0, 0).0, [0x11, 0x22, 0x33, 0x80]);
}
