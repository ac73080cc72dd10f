//! Packed 32-bit pixels and the channel-order policy.
//!
//! Every pixel packs alpha in the top byte. The order of the color bytes depends on where the
//! pixels end up: the software path writes into a system bitmap that expects BGRA bytes
//! ([`PixelFormat::Argb`]), GPU textures take RGBA bytes ([`PixelFormat::Abgr`]). A format is
//! chosen once per backend; images created for that backend carry it along.

/// A packed pixel. Its channel layout is given by the [`PixelFormat`] of the owning image.
pub type Pixel = u32;

/// Channel-order policy for packed pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// `0xAARRGGBB`: BGRA in memory on little-endian hosts.
    #[default]
    Argb,
    /// `0xAABBGGRR`: RGBA in memory on little-endian hosts.
    Abgr,
}

/// Bit offsets of the color channels for one [`PixelFormat`]. Alpha is always at 24.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelShifts {
    /// Red channel shift.
    pub r: u32,
    /// Green channel shift.
    pub g: u32,
    /// Blue channel shift.
    pub b: u32,
}

impl ChannelShifts {
    /// Alpha channel shift (same for every format).
    pub const A: u32 = 24;
}

impl PixelFormat {
    /// Channel offsets for this format.
    #[inline]
    pub const fn shifts(self) -> ChannelShifts {
        match self {
            Self::Argb => ChannelShifts { r: 16, g: 8, b: 0 },
            Self::Abgr => ChannelShifts { r: 0, g: 8, b: 16 },
        }
    }

    /// Pack four channels into a pixel.
    #[inline]
    pub const fn make_pixel(self, a: u8, r: u8, g: u8, b: u8) -> Pixel {
        let s = self.shifts();
        ((a as u32) << ChannelShifts::A)
            | ((r as u32) << s.r)
            | ((g as u32) << s.g)
            | ((b as u32) << s.b)
    }

    /// Alpha channel.
    #[inline]
    pub const fn a(self, p: Pixel) -> u8 {
        (p >> ChannelShifts::A) as u8
    }

    /// Red channel.
    #[inline]
    pub const fn r(self, p: Pixel) -> u8 {
        (p >> self.shifts().r) as u8
    }

    /// Green channel.
    #[inline]
    pub const fn g(self, p: Pixel) -> u8 {
        (p >> self.shifts().g) as u8
    }

    /// Blue channel.
    #[inline]
    pub const fn b(self, p: Pixel) -> u8 {
        (p >> self.shifts().b) as u8
    }

    /// Unpack into straight `[r, g, b, a]` bytes.
    #[inline]
    pub const fn to_rgba(self, p: Pixel) -> [u8; 4] {
        [self.r(p), self.g(p), self.b(p), self.a(p)]
    }

    /// Pack straight `[r, g, b, a]` bytes.
    #[inline]
    pub const fn from_rgba(self, rgba: [u8; 4]) -> Pixel {
        self.make_pixel(rgba[3], rgba[0], rgba[1], rgba[2])
    }

    /// Re-pack a pixel of this format into `target`.
    #[inline]
    pub const fn convert(self, p: Pixel, target: PixelFormat) -> Pixel {
        target.from_rgba(self.to_rgba(p))
    }

    /// Opaque black.
    pub const fn black(self) -> Pixel {
        self.make_pixel(255, 0, 0, 0)
    }

    /// Opaque white.
    pub const fn white(self) -> Pixel {
        self.make_pixel(255, 255, 255, 255)
    }
}
