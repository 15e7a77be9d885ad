use alloc::vec;
use alloc::vec::Vec;

use log::{debug, trace};

use crate::error::{Error, Result};

/// A decoded RGBA frame, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRgba {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    delay_ms: Option<u32>,
}

impl FrameRgba {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::CorruptBuffer {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
            delay_ms: None,
        })
    }

    /// A frame where every pixel has the same RGBA value
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat(width as usize * height as usize);
        Self {
            width,
            height,
            pixels,
            delay_ms: None,
        }
    }

    pub fn with_delay(mut self, delay_ms: Option<u32>) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn delay_ms(&self) -> Option<u32> {
        self.delay_ms
    }

    fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }
}

/// Where an invert request was resolved during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Inversion {
    #[default]
    NotRequested,
    /// Bits were flipped by the converter
    Applied,
    /// Bits are unflipped, the packer must invert its output
    Deferred,
}

/// 1-bit bitmap. Pixel `(x, y)` is bit `i % 8` of byte `i / 8`, `i = y * width + x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMono {
    width: u32,
    height: u32,
    bits: Vec<u8>,
    inversion: Inversion,
    delay_ms: Option<u32>,
}

impl FrameMono {
    pub fn buffer_size(width: u32, height: u32) -> usize {
        (width as usize * height as usize).div_ceil(8)
    }

    pub fn new(width: u32, height: u32, bits: Vec<u8>) -> Result<Self> {
        let expected = Self::buffer_size(width, height);
        if bits.len() != expected {
            return Err(Error::CorruptBuffer {
                expected,
                actual: bits.len(),
            });
        }
        Ok(Self {
            width,
            height,
            bits,
            inversion: Inversion::NotRequested,
            delay_ms: None,
        })
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut frame = Self {
            width,
            height,
            bits: vec![0; Self::buffer_size(width, height)],
            inversion: Inversion::NotRequested,
            delay_ms: None,
        };
        for y in 0..height {
            for x in 0..width {
                if f(x, y) {
                    frame.set(x, y);
                }
            }
        }
        frame
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bits(&self) -> &[u8] {
        &self.bits
    }

    pub fn inversion(&self) -> Inversion {
        self.inversion
    }

    pub fn delay_ms(&self) -> Option<u32> {
        self.delay_ms
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let index = y as usize * self.width as usize + x as usize;
        (self.bits[index / 8] >> (index % 8)) & 1 == 1
    }

    fn set(&mut self, x: u32, y: u32) {
        let index = y as usize * self.width as usize + x as usize;
        self.bits[index / 8] |= 1 << (index % 8);
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum_macros::EnumString,
    strum_macros::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum Dithering {
    #[default]
    None,
    Bayer4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonochromeOptions {
    pub threshold: u8,
    pub dithering: Dithering,
    pub invert: bool,
}

impl Default for MonochromeOptions {
    fn default() -> Self {
        Self {
            threshold: 128,
            dithering: Dithering::None,
            invert: false,
        }
    }
}

impl MonochromeOptions {
    /// Out-of-range thresholds are clamped into `0..=255`.
    pub fn new(threshold: i32, dithering: Dithering, invert: bool) -> Self {
        let clamped = threshold.clamp(0, 255);
        if clamped != threshold {
            debug!("Clamped threshold {} to {}", threshold, clamped);
        }
        Self {
            threshold: clamped as u8,
            dithering,
            invert,
        }
    }
}

const BAYER4: [[u8; 4]; 4] = [
    [0, 8, 2, 10],
    [12, 4, 14, 6],
    [3, 11, 1, 9],
    [15, 7, 13, 5],
];

/// Per-cell threshold: 16 levels centred in equal bands across 0..=255.
const fn bayer_level(x: u32, y: u32) -> u8 {
    let m = BAYER4[(y % 4) as usize][(x % 4) as usize] as u32;
    ((2 * m + 1) * 255 / 32) as u8
}

/// `round(0.299 R + 0.587 G + 0.114 B)`
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

pub fn convert_frame(frame: &FrameRgba, options: &MonochromeOptions) -> FrameMono {
    let (inversion, flip) = match (options.dithering, options.invert) {
        (_, false) => (Inversion::NotRequested, false),
        (Dithering::None, true) => (Inversion::Applied, true),
        (Dithering::Bayer4, true) => (Inversion::Deferred, false),
    };
    let mut mono = FrameMono::from_fn(frame.width, frame.height, |x, y| {
        let [r, g, b, _] = frame.rgba(x, y);
        let luma = luminance(r, g, b);
        let on = match options.dithering {
            Dithering::None => luma >= options.threshold,
            Dithering::Bayer4 => luma >= bayer_level(x, y),
        };
        on ^ flip
    });
    mono.inversion = inversion;
    mono.delay_ms = frame.delay_ms;
    mono
}

pub fn convert(frames: &[FrameRgba], options: &MonochromeOptions) -> Vec<FrameMono> {
    trace!("Converting {} frames with {:?}", frames.len(), options);
    frames
        .iter()
        .map(|frame| convert_frame(frame, options))
        .collect()
}
