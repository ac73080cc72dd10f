use super::*;
use crate::foundation::pixel::PixelFormat;

#[test]
fn bayer_is_a_permutation() {
    let mut seen = [false; 64];
    for y in 0..8 {
        for x in 0..8 {
            let v = bayer8(x, y) as usize;
            assert!(!seen[v], "duplicate {v}");
            seen[v] = true;
        }
    }
    assert!(seen.iter().all(|&s| s));
    assert_eq!(bayer8(0, 0), 0);
    assert_eq!(bayer8(1, 0), 32);
    assert_eq!(bayer8(0, 1), 48);
    assert_eq!(bayer8(1, 1), 16);
}

#[test]
fn coverage_is_monotone_and_complete() {
    let count = |level: u8| {
        (0..8)
            .flat_map(|y| (0..8).map(move |x| (x, y)))
            .filter(|&(x, y)| mask_covers(x, y, level))
            .count()
    };
    assert_eq!(count(0), 3);
    assert_eq!(count(MASK_LEVELS - 1), 64);
    for level in 1..MASK_LEVELS {
        for y in -8..16 {
            for x in -8..16 {
                if mask_covers(x, y, level - 1) {
                    assert!(mask_covers(x, y, level));
                }
            }
        }
        assert!(count(level) >= count(level - 1));
    }
}

#[test]
fn pattern_tiles_in_destination_space() {
    for y in 0..8 {
        for x in 0..8 {
            assert_eq!(mask_threshold(x, y), mask_threshold(x + 8, y - 16));
        }
    }
}

#[test]
fn draw_mask_replaces_covered_pixels_only() {
    let f = PixelFormat::Argb;
    let mut dst = Image::create_from_color(8, 8, "black", f).unwrap();
    let src = Image::create_from_color(8, 8, "white", f).unwrap();
    draw_mask(&mut dst.lock(), &src, TransferRect::new(0, 0, 8, 8, 0, 0), 0);
    for y in 0..8 {
        for x in 0..8 {
            let expect = if mask_covers(x, y, 0) { f.white() } else { f.black() };
            assert_eq!(dst.pixel(x, y), Some(expect));
        }
    }
}

#[test]
fn draw_mask_is_idempotent() {
    let f = PixelFormat::Abgr;
    let mut once = Image::create_from_color(9, 5, "#204060", f).unwrap();
    let src = Image::create_from_color(9, 5, "#ffcc00", f).unwrap();
    let rect = TransferRect::new(-1, 0, 9, 5, 0, 0);
    draw_mask(&mut once.lock(), &src, rect, 13);
    let snapshot = once.pixels().to_vec();
    draw_mask(&mut once.lock(), &src, rect, 13);
    assert_eq!(once.pixels(), snapshot.as_slice());
}

#[test]
#[should_panic(expected = "mask level")]
fn level_out_of_range_panics() {
    let f = PixelFormat::Argb;
    let mut dst = Image::create(2, 2, f).unwrap();
    let src = Image::create(2, 2, f).unwrap();
    draw_mask(&mut dst.lock(), &src, TransferRect::new(0, 0, 2, 2, 0, 0), MASK_LEVELS);
}
