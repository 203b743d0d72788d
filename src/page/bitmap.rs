//! Owned pixel buffers produced by page rendering

use std::fmt;

use image::RgbaImage;

use crate::error::ConfigError;

/// Packed 0xAARRGGBB color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    pub const WHITE: Color = Color(0xFFFF_FFFF);
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const TRANSPARENT: Color = Color(0);

    #[must_use]
    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::argb(0xFF, r, g, b)
    }

    pub const fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// Parse `#RRGGBB` (opaque) or `#AARRGGBB`
    pub fn from_hex(s: &str) -> Result<Self, ConfigError> {
        let digits = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| ConfigError::InvalidColor(s.to_string()))?;
        let value =
            u32::from_str_radix(digits, 16).map_err(|_| ConfigError::InvalidColor(s.to_string()))?;
        match digits.len() {
            6 => Ok(Color(0xFF00_0000 | value)),
            8 => Ok(Color(value)),
            _ => Err(ConfigError::InvalidColor(s.to_string())),
        }
    }

    /// `#RRGGBB` for opaque colors, `#AARRGGBB` otherwise
    pub fn to_hex(self) -> String {
        if self.a() == 0xFF {
            format!("#{:06X}", self.0 & 0x00FF_FFFF)
        } else {
            format!("#{:08X}", self.0)
        }
    }
}

/// Pixel storage formats, ordered by how much color information they carry
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PixelFormat {
    Alpha8,
    Rgb565,
    Rgba8888,
}

impl PixelFormat {
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Alpha8 => 1,
            PixelFormat::Rgb565 => 2,
            PixelFormat::Rgba8888 => 4,
        }
    }

    fn encode(self, color: Color, out: &mut [u8]) {
        match self {
            PixelFormat::Alpha8 => out[0] = color.a(),
            PixelFormat::Rgb565 => {
                let packed = (u16::from(color.r() >> 3) << 11)
                    | (u16::from(color.g() >> 2) << 5)
                    | u16::from(color.b() >> 3);
                out[..2].copy_from_slice(&packed.to_le_bytes());
            }
            PixelFormat::Rgba8888 => {
                out[0] = color.r();
                out[1] = color.g();
                out[2] = color.b();
                out[3] = color.a();
            }
        }
    }

    fn decode(self, px: &[u8]) -> Color {
        match self {
            PixelFormat::Alpha8 => Color::argb(px[0], 0, 0, 0),
            PixelFormat::Rgb565 => {
                let packed = u16::from_le_bytes([px[0], px[1]]);
                let r = ((packed >> 11) & 0x1F) as u8;
                let g = ((packed >> 5) & 0x3F) as u8;
                let b = (packed & 0x1F) as u8;
                Color::rgb(
                    (r << 3) | (r >> 2),
                    (g << 2) | (g >> 4),
                    (b << 3) | (b >> 2),
                )
            }
            PixelFormat::Rgba8888 => Color::argb(px[3], px[0], px[1], px[2]),
        }
    }
}

/// Row-major pixel buffer
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Zeroed bitmap; `None` for an empty size so degenerate geometry never allocates
    #[must_use]
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Some(Self {
            width,
            height,
            format,
            pixels: vec![0; len],
        })
    }

    #[must_use]
    pub fn filled(width: u32, height: u32, format: PixelFormat, color: Color) -> Option<Self> {
        let mut bitmap = Self::new(width, height, format)?;
        bitmap.erase(color);
        Some(bitmap)
    }

    /// Wrap an RGBA image without copying
    #[must_use]
    pub fn from_rgba(image: RgbaImage) -> Option<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            width,
            height,
            format: PixelFormat::Rgba8888,
            pixels: image.into_raw(),
        })
    }

    /// Wrap raw bytes in the given format; `None` when the length does not match
    #[must_use]
    pub fn from_raw(width: u32, height: u32, format: PixelFormat, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if width == 0 || height == 0 || pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Fill every pixel with `color`
    pub fn erase(&mut self, color: Color) {
        let bpp = self.format.bytes_per_pixel();
        let mut encoded = [0u8; 4];
        self.format.encode(color, &mut encoded);
        for px in self.pixels.chunks_exact_mut(bpp) {
            px.copy_from_slice(&encoded[..bpp]);
        }
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = self.offset_of(x, y);
        Some(self.format.decode(&self.pixels[offset..]))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = self.offset_of(x, y);
        self.format.encode(color, &mut self.pixels[offset..]);
    }

    /// Copy `src` with its top-left corner at (`left`, `top`), clipped to this bitmap
    pub fn draw_bitmap(&mut self, src: &Bitmap, left: i32, top: i32) {
        let x0 = left.max(0);
        let y0 = top.max(0);
        let x1 = (left + src.width as i32).min(self.width as i32);
        let y1 = (top + src.height as i32).min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let same_format = src.format == self.format;
        let bpp = self.format.bytes_per_pixel();
        for y in y0..y1 {
            let sy = (y - top) as u32;
            if same_format {
                let sx = (x0 - left) as u32;
                let run = (x1 - x0) as usize * bpp;
                let src_off = src.offset_of(sx, sy);
                let dst_off = self.offset_of(x0 as u32, y as u32);
                self.pixels[dst_off..dst_off + run]
                    .copy_from_slice(&src.pixels[src_off..src_off + run]);
            } else {
                for x in x0..x1 {
                    let sx = (x - left) as u32;
                    let color = src.format.decode(&src.pixels[src.offset_of(sx, sy)..]);
                    let dst_off = self.offset_of(x as u32, y as u32);
                    self.format.encode(color, &mut self.pixels[dst_off..]);
                }
            }
        }
    }

    /// Expand to RGBA for encoding or resampling
    #[must_use]
    pub fn to_rgba_image(&self) -> RgbaImage {
        if self.format == PixelFormat::Rgba8888 {
            if let Some(image) = RgbaImage::from_raw(self.width, self.height, self.pixels.clone()) {
                return image;
            }
        }
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.format.decode(&self.pixels[self.offset_of(x, y)..]);
            image::Rgba([c.r(), c.g(), c.b(), c.a()])
        })
    }

    fn offset_of(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.bytes_per_pixel()
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish_non_exhaustive()
    }
}
