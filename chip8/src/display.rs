//! Display compositor.
//!
//! Translates the monochrome display buffer into colored pixels on a
//! surface owned by whatever is doing the actual rendering.
use crate::constants::*;

/// 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[cfg_attr(feature = "serde", serde(default = "opaque"))]
    pub a: u8,
}

#[cfg(feature = "serde")]
fn opaque() -> u8 {
    0xFF
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const fn to_rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Colors used for pixels that are off and on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Palette {
    pub background: Color,
    pub foreground: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::BLACK,
            foreground: Color::WHITE,
        }
    }
}

impl Palette {
    #[inline(always)]
    pub fn color(&self, pixel: bool) -> Color {
        if pixel {
            self.foreground
        } else {
            self.background
        }
    }
}

/// Drawing target for a render pass.
pub trait Surface {
    /// Fill the display cell at the given coordinate.
    fn draw_pixel(&mut self, x: usize, y: usize, color: Color);
}

/// Draw every pixel of the display buffer to the surface, row by row.
pub fn compose<S>(display: &[bool; DISPLAY_BUFFER_SIZE], palette: &Palette, surface: &mut S)
where
    S: Surface + ?Sized,
{
    for (i, px) in display.iter().enumerate() {
        surface.draw_pixel(i % DISPLAY_WIDTH, i / DISPLAY_WIDTH, palette.color(*px));
    }
}

/// RGBA8 pixel buffer the size of the display, ready to be uploaded as a texture.
pub struct FrameBuffer {
    pixels: Box<[u8; DISPLAY_BUFFER_SIZE * 4]>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self {
            pixels: Box::new([0; DISPLAY_BUFFER_SIZE * 4]),
        }
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Raw pixel data, rows top to bottom.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels[..]
    }

    pub fn pixel(&self, x: usize, y: usize) -> Color {
        let i = (x + y * DISPLAY_WIDTH) * 4;
        let [r, g, b, a] = [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ];
        Color { r, g, b, a }
    }
}

impl Surface for FrameBuffer {
    fn draw_pixel(&mut self, x: usize, y: usize, color: Color) {
        let i = (x + y * DISPLAY_WIDTH) * 4;
        self.pixels[i..i + 4].copy_from_slice(&color.to_rgba());
    }
}
