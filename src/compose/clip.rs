use crate::foundation::core::{TransferRect, clamp_i32};

/// Shrink `rect` so its source block lies inside a `src_w x src_h` image.
///
/// Destination offsets move by the same amount as the source offsets. Returns `false` when
/// nothing is left to transfer.
pub fn clip_by_source(src_w: u32, src_h: u32, rect: &mut TransferRect) -> bool {
    clip(src_w, src_h, rect, Side::Source)
}

/// Shrink `rect` so its destination block lies inside a `dst_w x dst_h` image.
pub fn clip_by_dest(dst_w: u32, dst_h: u32, rect: &mut TransferRect) -> bool {
    clip(dst_w, dst_h, rect, Side::Dest)
}

/// Apply both clips. The result does not depend on the order they run in.
pub fn clip_transfer(
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
    rect: &mut TransferRect,
) -> bool {
    clip_by_source(src_w, src_h, rect) && clip_by_dest(dst_w, dst_h, rect)
}

#[derive(Clone, Copy)]
enum Side {
    Source,
    Dest,
}

struct Axis {
    pos: i64,
    other: i64,
    len: i64,
}

impl Axis {
    fn clip(&mut self, limit: i64) {
        if self.pos < 0 {
            self.len += self.pos;
            self.other -= self.pos;
            self.pos = 0;
        }
        let overflow = self.pos + self.len - limit;
        if overflow > 0 {
            self.len -= overflow;
        }
    }
}

fn clip(limit_w: u32, limit_h: u32, rect: &mut TransferRect, side: Side) -> bool {
    if rect.is_empty() {
        return false;
    }

    let (x, ox, y, oy) = match side {
        Side::Source => (rect.src_x, rect.dst_x, rect.src_y, rect.dst_y),
        Side::Dest => (rect.dst_x, rect.src_x, rect.dst_y, rect.src_y),
    };
    let mut h = Axis {
        pos: i64::from(x),
        other: i64::from(ox),
        len: i64::from(rect.width),
    };
    let mut v = Axis {
        pos: i64::from(y),
        other: i64::from(oy),
        len: i64::from(rect.height),
    };
    h.clip(i64::from(limit_w));
    v.clip(i64::from(limit_h));

    if h.len <= 0 || v.len <= 0 {
        rect.width = clamp_i32(h.len.max(0));
        rect.height = clamp_i32(v.len.max(0));
        return false;
    }

    let (pos_x, other_x, pos_y, other_y) = (
        clamp_i32(h.pos),
        clamp_i32(h.other),
        clamp_i32(v.pos),
        clamp_i32(v.other),
    );
    match side {
        Side::Source => {
            (rect.src_x, rect.dst_x, rect.src_y, rect.dst_y) = (pos_x, other_x, pos_y, other_y);
        }
        Side::Dest => {
            (rect.dst_x, rect.src_x, rect.dst_y, rect.src_y) = (pos_x, other_x, pos_y, other_y);
        }
    }
    rect.width = clamp_i32(h.len);
    rect.height = clamp_i32(v.len);
    true
}

#[cfg(test)]
#[path = "../../tests/unit/compose/clip.rs"]
mod tests;
