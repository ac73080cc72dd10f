use crate::foundation::error::{RenderError, RenderResult};
use crate::foundation::pixel::{Pixel, PixelFormat};
use std::str::FromStr;

/// Straight-alpha RGBA8 color parsed from a textual description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Color {
    /// Build a color from its channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Pack into a pixel of the given format.
    pub const fn to_pixel(self, format: PixelFormat) -> Pixel {
        format.make_pixel(self.a, self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = RenderError;

    fn from_str(s: &str) -> RenderResult<Self> {
        parse_color(s)
    }
}

/// Parse `#RGB`, `#RRGGBB`, `#RRGGBBAA` (the `#` is optional) or a basic color name.
pub fn parse_color(s: &str) -> RenderResult<Color> {
    let s = s.trim();
    if s.is_empty() {
        return Err(RenderError::parse("color string must be non-empty"));
    }

    if let Some(c) = named_color(s) {
        return Ok(c);
    }

    parse_hex(s).map_err(|msg| RenderError::parse(format!("invalid color \"{s}\": {msg}")))
}

fn parse_hex(s: &str) -> Result<Color, String> {
    let s = s.strip_prefix('#').unwrap_or(s);
    if !s.is_ascii() {
        return Err("hex color must be ASCII".to_owned());
    }

    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    fn hex_nibble(c: &str) -> Result<u8, String> {
        let v = u8::from_str_radix(c, 16).map_err(|_| format!("invalid hex digit \"{c}\""))?;
        Ok(v * 17)
    }

    match s.len() {
        3 => Ok(Color::rgba(
            hex_nibble(&s[0..1])?,
            hex_nibble(&s[1..2])?,
            hex_nibble(&s[2..3])?,
            255,
        )),
        6 => Ok(Color::rgba(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            255,
        )),
        8 => Ok(Color::rgba(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            hex_byte(&s[6..8])?,
        )),
        _ => Err("expected #RGB, #RRGGBB or #RRGGBBAA (case-insensitive)".to_owned()),
    }
}

fn named_color(name: &str) -> Option<Color> {
    let c = match name.to_ascii_lowercase().as_str() {
        "black" => Color::rgba(0, 0, 0, 255),
        "white" => Color::rgba(255, 255, 255, 255),
        "red" => Color::rgba(255, 0, 0, 255),
        "green" => Color::rgba(0, 128, 0, 255),
        "lime" => Color::rgba(0, 255, 0, 255),
        "blue" => Color::rgba(0, 0, 255, 255),
        "yellow" => Color::rgba(255, 255, 0, 255),
        "cyan" | "aqua" => Color::rgba(0, 255, 255, 255),
        "magenta" | "fuchsia" => Color::rgba(255, 0, 255, 255),
        "gray" | "grey" => Color::rgba(128, 128, 128, 255),
        "transparent" => Color::rgba(0, 0, 0, 0),
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/color.rs"]
mod tests;
