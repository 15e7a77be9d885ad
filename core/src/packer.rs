use alloc::vec;
use alloc::vec::Vec;

use log::debug;

use crate::{
    error::{Error, Result},
    geometry::{DevicePreset, PresetId},
    mono::{FrameMono, Inversion},
};

/// How 8 pixels are grouped into one byte
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum_macros::EnumString,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum Addressing {
    /// Page-major: 8 vertically stacked pixels of one column (native controller RAM layout)
    #[default]
    Vertical,
    /// Row-major: 8 horizontally adjacent pixels
    Horizontal,
}

/// Which bit holds the first pixel of a group
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum_macros::EnumString,
    strum_macros::Display,
    strum_macros::EnumIter,
)]
pub enum BitOrder {
    #[default]
    #[strum(to_string = "lsb-first", serialize = "lsb")]
    LsbFirst,
    #[strum(to_string = "msb-first", serialize = "msb")]
    MsbFirst,
}

impl BitOrder {
    /// Bit position of the `n`th pixel in a group
    pub fn shift(self, n: u32) -> u32 {
        match self {
            BitOrder::LsbFirst => n,
            BitOrder::MsbFirst => 7 - n,
        }
    }
}

/// Byte layout shared by the packer and the preview renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    pub addressing: Addressing,
    pub bit_order: BitOrder,
}

impl Layout {
    /// Byte index and bit position holding physical pixel `(x, y)`.
    pub fn locate(&self, preset: &DevicePreset, x: u32, y: u32) -> (usize, u32) {
        match self.addressing {
            Addressing::Vertical => {
                let page = y / preset.page_height;
                let index = page as usize * preset.width as usize + x as usize;
                (index, self.bit_order.shift(y % preset.page_height))
            }
            Addressing::Horizontal => {
                // Row-major bit stream: identical to `y * W/8 + x/8` when W is a
                // multiple of 8, and keeps the W*H/8 budget when it is not.
                let bit = y as usize * preset.width as usize + x as usize;
                (bit / 8, self.bit_order.shift((bit % 8) as u32))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackingOptions {
    pub preset: PresetId,
    pub addressing: Addressing,
    pub bit_order: BitOrder,
    pub invert: bool,
}

impl PackingOptions {
    pub fn new(preset: PresetId) -> Self {
        Self {
            preset,
            addressing: Addressing::default(),
            bit_order: BitOrder::default(),
            invert: false,
        }
    }

    pub fn layout(&self) -> Layout {
        Layout {
            addressing: self.addressing,
            bit_order: self.bit_order,
        }
    }
}

/// Controller-ready bytes for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedFrame {
    pub bytes: Vec<u8>,
    pub preset: &'static DevicePreset,
    pub delay_ms: Option<u32>,
}

impl PackedFrame {
    pub fn width(&self) -> u32 {
        self.preset.width
    }

    pub fn height(&self) -> u32 {
        self.preset.height
    }

    pub fn preset_name(&self) -> &'static str {
        self.preset.name
    }

    /// Fails with `CorruptBuffer` when the bytes cannot hold a full frame.
    pub fn validate(&self) -> Result<()> {
        let expected = self.preset.buffer_size();
        if self.bytes.len() < expected {
            return Err(Error::CorruptBuffer {
                expected,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }
}

fn pack_frame(
    frame: &FrameMono,
    preset: &'static DevicePreset,
    options: &PackingOptions,
) -> PackedFrame {
    let layout = options.layout();
    let mut bytes = vec![0u8; preset.buffer_size()];
    for y in 0..preset.height {
        for x in 0..preset.width {
            if frame.get(x, y) {
                let (index, bit) = layout.locate(preset, x, y);
                bytes[index] |= 1 << bit;
            }
        }
    }

    let invert = match frame.inversion() {
        Inversion::Deferred => true,
        Inversion::Applied => false,
        Inversion::NotRequested => options.invert,
    };
    if invert {
        bytes.iter_mut().for_each(|b| *b ^= 0xFF);
    }

    PackedFrame {
        bytes,
        preset,
        delay_ms: frame.delay_ms(),
    }
}

/// Packs every frame or none: all dimensions are checked before any output is produced.
pub fn pack(frames: &[FrameMono], options: &PackingOptions) -> Result<Vec<PackedFrame>> {
    let preset = options.preset.preset();
    for (index, frame) in frames.iter().enumerate() {
        if frame.width() != preset.width || frame.height() != preset.height {
            return Err(Error::DimensionMismatch {
                frame: index,
                expected: (preset.width, preset.height),
                actual: (frame.width(), frame.height()),
            });
        }
    }
    debug!(
        "Packing {} frames for {} ({}, {})",
        frames.len(),
        preset.name,
        options.addressing,
        options.bit_order
    );
    Ok(frames
        .iter()
        .map(|frame| pack_frame(frame, preset, options))
        .collect())
}

/// Like [`pack`], with the preset given by name.
pub fn pack_named(
    frames: &[FrameMono],
    preset: &str,
    addressing: Addressing,
    bit_order: BitOrder,
    invert: bool,
) -> Result<Vec<PackedFrame>> {
    let preset = DevicePreset::by_name(preset)?;
    pack(
        frames,
        &PackingOptions {
            preset: preset.id,
            addressing,
            bit_order,
            invert,
        },
    )
}
