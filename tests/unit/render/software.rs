use super::*;
use crate::render::surface::FrameBufferSurface;

const F: PixelFormat = PixelFormat::Argb;

#[test]
fn back_buffer_is_seeded_from_window_color() {
    let white = SoftwareBackend::new(2, 2, true).unwrap();
    assert!(white.back_buffer().pixels().iter().all(|&p| p == F.white()));
    let black = SoftwareBackend::new(2, 2, false).unwrap();
    assert!(black.back_buffer().pixels().iter().all(|&p| p == F.black()));
}

#[test]
fn end_frame_presents_only_dirty_rect() {
    let mut b = SoftwareBackend::new(8, 8, false).unwrap();
    let mut src = Image::create_from_color(8, 8, "white", F).unwrap();
    let mut surface = FrameBufferSurface::new(8, 8).unwrap();

    b.start_frame().unwrap();
    b.render_image(&mut src, TransferRect::new(0, 0, 8, 8, 0, 0), 255, BlendType::Normal)
        .unwrap();
    b.end_frame(PixelRect::new(2, 2, 3, 1), &mut surface).unwrap();

    assert_eq!(surface.pixels_pushed(), 3);
    assert_eq!(surface.pixel(2, 2), Some(F.white()));
    assert_eq!(surface.pixel(1, 2), Some(F.black()));
    assert!(b.back_buffer().pixels().iter().all(|&p| p == F.white()));
}

#[test]
fn display_offset_shifts_presentation() {
    let mut b = SoftwareBackend::new(2, 2, true).unwrap();
    let mut surface = FrameBufferSurface::new(4, 4).unwrap();
    b.set_display_offset(2, 2);
    b.start_frame().unwrap();
    b.end_frame(PixelRect::new(0, 0, 2, 2), &mut surface).unwrap();
    assert_eq!(surface.pixel(1, 1), Some(F.black()));
    assert_eq!(surface.pixel(2, 2), Some(F.white()));
    assert_eq!(surface.pixel(3, 3), Some(F.white()));
}

#[test]
fn caller_memory_receives_frames() {
    let mut mem = vec![0u32; 4];
    {
        let mut b = SoftwareBackend::with_pixels(2, 2, &mut mem, false).unwrap();
        b.start_frame().unwrap();
        b.render_clear(PixelRect::new(1, 0, 1, 2), F.white()).unwrap();
        b.end_frame(PixelRect::empty(), &mut FrameBufferSurface::new(2, 2).unwrap())
            .unwrap();
    }
    assert_eq!(mem, vec![F.black(), F.white(), F.black(), F.white()]);
}

#[test]
fn mask_render_matches_compositor() {
    let mut b = SoftwareBackend::new(8, 8, false).unwrap();
    let mut src = Image::create_from_color(8, 8, "red", F).unwrap();
    b.start_frame().unwrap();
    b.render_image_mask(&mut src, TransferRect::new(0, 0, 8, 8, 0, 0), 5)
        .unwrap();
    b.end_frame(PixelRect::empty(), &mut FrameBufferSurface::new(8, 8).unwrap())
        .unwrap();

    let red = F.make_pixel(255, 255, 0, 0);
    for y in 0..8 {
        for x in 0..8 {
            let covered = crate::compose::mask::mask_covers(x, y, 5);
            let expect = if covered { red } else { F.black() };
            assert_eq!(b.back_buffer().pixel(x, y), Some(expect));
        }
    }
}

#[test]
fn repaint_pushes_last_frame() {
    let mut b = SoftwareBackend::new(4, 4, true).unwrap();
    let mut surface = FrameBufferSurface::new(4, 4).unwrap();
    b.repaint(PixelRect::new(0, 0, 1, 1), &mut surface).unwrap();
    assert_eq!(surface.pixel(0, 0), Some(F.white()));
    assert_eq!(surface.pixel(1, 1), Some(F.black()));
}

#[test]
fn snapshot_copies_back_buffer() {
    let mut b = SoftwareBackend::new(3, 3, true).unwrap();
    let snap = b.snapshot().unwrap();
    assert_eq!(snap.pixels(), b.back_buffer().pixels());
}

#[test]
#[should_panic(expected = "outside start_frame")]
fn render_outside_frame_panics() {
    let mut b = SoftwareBackend::new(2, 2, false).unwrap();
    b.render_clear(PixelRect::new(0, 0, 1, 1), F.white()).unwrap();
}

#[test]
#[should_panic(expected = "while a frame is active")]
fn nested_start_frame_panics() {
    let mut b = SoftwareBackend::new(2, 2, false).unwrap();
    b.start_frame().unwrap();
    let _ = b.start_frame();
}
