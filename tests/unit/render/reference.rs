use super::*;
use crate::render::surface::FrameBufferSurface;

fn device(w: u32, h: u32) -> ReferenceDevice {
    let mut d = ReferenceDevice::new();
    d.initialize(w, h, FORMAT.black()).unwrap();
    d
}

#[test]
fn blend_unit_matches_integer_math_within_one() {
    let cases = [
        (FORMAT.make_pixel(255, 0, 0, 0), FORMAT.make_pixel(255, 255, 255, 255), 128),
        (FORMAT.make_pixel(90, 12, 200, 64), FORMAT.make_pixel(170, 250, 3, 99), 77),
        (FORMAT.make_pixel(255, 100, 10, 250), FORMAT.make_pixel(255, 200, 20, 10), 255),
    ];
    for blend in [BlendType::Normal, BlendType::Add, BlendType::Sub] {
        for (d, s, alpha) in cases {
            let gpu = blend_unit(blend, d, s, alpha);
            let cpu = crate::compose::blend::blend_pixel(blend, d, s, alpha);
            for (g, c) in FORMAT.to_rgba(gpu).into_iter().zip(FORMAT.to_rgba(cpu)) {
                assert!(g.abs_diff(c) <= 1, "{blend}: {gpu:08x} vs {cpu:08x}");
            }
        }
    }
}

#[test]
fn blit_writes_target_and_end_scene_commits() {
    let mut d = device(4, 4);
    let t = d.create_texture(2, 2).unwrap();
    d.upload_texture(t, &[FORMAT.white(); 4]).unwrap();
    d.begin_scene().unwrap();
    d.draw(&DrawOp::Blit {
        texture: t,
        rect: TransferRect::new(1, 1, 2, 2, 0, 0),
        alpha: 255,
        blend: BlendType::Normal,
    })
    .unwrap();
    assert_eq!(d.read_front().unwrap()[5], FORMAT.black());
    d.end_scene().unwrap();
    let front = d.read_front().unwrap();
    assert_eq!(front[5], FORMAT.white());
    assert_eq!(front[0], FORMAT.black());
    assert_eq!(d.draw_count(), 1);
}

#[test]
fn discard_rolls_back_to_front() {
    let mut d = device(2, 2);
    d.begin_scene().unwrap();
    d.draw(&DrawOp::Clear {
        rect: PixelRect::new(0, 0, 2, 2),
        color: FORMAT.white(),
    })
    .unwrap();
    d.discard_scene();
    d.begin_scene().unwrap();
    d.end_scene().unwrap();
    assert!(d.read_front().unwrap().iter().all(|&p| p == FORMAT.black()));
}

#[test]
fn lost_device_fails_until_reset() {
    let mut d = device(2, 2);
    let trigger = d.loss_trigger();
    trigger.lose();
    assert!(d.begin_scene().unwrap_err().is_device_lost());
    assert!(d.create_texture(1, 1).unwrap_err().is_device_lost());
    d.reset().unwrap();
    assert!(!trigger.is_lost());
    d.initialize(2, 2, FORMAT.white()).unwrap();
    d.begin_scene().unwrap();
}

#[test]
fn released_slots_are_reused() {
    let mut d = device(1, 1);
    let a = d.create_texture(1, 1).unwrap();
    let b = d.create_texture(1, 1).unwrap();
    assert_ne!(a, b);
    d.release_texture(a);
    assert_eq!(d.create_texture(1, 1).unwrap(), a);
}

#[test]
fn upload_too_short_is_rejected() {
    let mut d = device(1, 1);
    let t = d.create_texture(2, 2).unwrap();
    assert!(matches!(
        d.upload_texture(t, &[0; 3]),
        Err(RenderError::Device(_))
    ));
}

#[test]
fn present_converts_to_surface_format() {
    let mut d = ReferenceDevice::new();
    d.initialize(2, 1, FORMAT.make_pixel(255, 1, 2, 3)).unwrap();
    let mut s = FrameBufferSurface::new(2, 1).unwrap();
    d.present(PixelRect::new(0, 0, 2, 1), (0, 0), &mut s).unwrap();
    assert_eq!(s.pixel(1, 0), Some(PixelFormat::Argb.make_pixel(255, 1, 2, 3)));
}
