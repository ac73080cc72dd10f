/// Integer rectangle in pixel space: `[x, x + width) x [y, y + height)`.
///
/// Used for dirty regions, clear regions and presentation. A rectangle with a non-positive
/// width or height is empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PixelRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl PixelRect {
    /// Create a rectangle from origin and size.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a `width x height` surface from the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, clamp_i32(width as i64), clamp_i32(height as i64))
    }

    /// The empty rectangle.
    pub const fn empty() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Return `true` when the rectangle covers no pixels.
    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Exclusive right edge.
    pub fn right(self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// Number of pixels covered (0 for empty rectangles).
    pub fn area(self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        (self.width as u64) * (self.height as u64)
    }

    /// Return `true` when `(x, y)` lies inside the rectangle.
    pub fn contains(self, x: i32, y: i32) -> bool {
        !self.is_empty()
            && x >= self.x
            && y >= self.y
            && i64::from(x) < self.right()
            && i64::from(y) < self.bottom()
    }

    /// Intersection of two rectangles; empty when they do not overlap.
    pub fn intersect(self, other: Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= i64::from(x0) || y1 <= i64::from(y0) {
            return Self::empty();
        }
        Self::new(
            x0,
            y0,
            clamp_i32(x1 - i64::from(x0)),
            clamp_i32(y1 - i64::from(y0)),
        )
    }

    /// Smallest rectangle containing both; empty inputs are ignored.
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Self::new(
            x0,
            y0,
            clamp_i32(x1 - i64::from(x0)),
            clamp_i32(y1 - i64::from(y0)),
        )
    }

    /// Translate by `(dx, dy)` using saturating arithmetic.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }
}

/// Transfer descriptor for a single draw: a `width x height` block read at `(src_x, src_y)` in
/// the source and written at `(dst_x, dst_y)` in the destination.
///
/// Offsets may be negative (partially off-screen draws); the clipper shrinks the block and
/// shifts both origins by the same amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TransferRect {
    /// Block width.
    pub width: i32,
    /// Block height.
    pub height: i32,
    /// Destination left edge.
    pub dst_x: i32,
    /// Destination top edge.
    pub dst_y: i32,
    /// Source left edge.
    pub src_x: i32,
    /// Source top edge.
    pub src_y: i32,
}

impl TransferRect {
    /// Create a descriptor using the argument order of the draw calls.
    pub const fn new(dst_x: i32, dst_y: i32, width: i32, height: i32, src_x: i32, src_y: i32) -> Self {
        Self {
            width,
            height,
            dst_x,
            dst_y,
            src_x,
            src_y,
        }
    }

    /// Return `true` when the block covers no pixels.
    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Destination area touched by the block.
    pub fn dst_rect(self) -> PixelRect {
        PixelRect::new(self.dst_x, self.dst_y, self.width, self.height)
    }

    /// Source area read by the block.
    pub fn src_rect(self) -> PixelRect {
        PixelRect::new(self.src_x, self.src_y, self.width, self.height)
    }
}

pub(crate) fn clamp_i32(v: i64) -> i32 {
    v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
