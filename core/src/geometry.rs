use core::str::FromStr;

use embedded_graphics::prelude::Size;

use crate::error::{Error, Result};

/// Rows per page for every controller in the SSD1306/SH1106 family.
pub const PAGE_HEIGHT: u32 = 8;

/// Known controller presets
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::EnumIter,
    strum_macros::EnumString,
    strum_macros::Display,
)]
pub enum PresetId {
    #[strum(serialize = "SSD1306_128x32")]
    Ssd1306_128x32,
    #[strum(serialize = "SSD1306_128x64")]
    Ssd1306_128x64,
    #[strum(serialize = "SH1106_132x64")]
    Sh1106_132x64,
}

/// Visible window of a physical buffer that is wider than the glass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub visible_width: u32,
    /// First physical column shown on glass, `(width - visible_width) / 2`
    pub offset: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub struct DevicePreset {
    pub id: PresetId,
    pub name: &'static str,
    /// Physical buffer width in columns
    pub width: u32,
    /// Physical buffer height in rows
    pub height: u32,
    pub page_height: u32,
    pub viewport: Option<Viewport>,
}

pub static SSD1306_128X32: DevicePreset = DevicePreset {
    id: PresetId::Ssd1306_128x32,
    name: "SSD1306_128x32",
    width: 128,
    height: 32,
    page_height: PAGE_HEIGHT,
    viewport: None,
};

pub static SSD1306_128X64: DevicePreset = DevicePreset {
    id: PresetId::Ssd1306_128x64,
    name: "SSD1306_128x64",
    width: 128,
    height: 64,
    page_height: PAGE_HEIGHT,
    viewport: None,
};

pub static SH1106_132X64: DevicePreset = DevicePreset {
    id: PresetId::Sh1106_132x64,
    name: "SH1106_132x64",
    width: 132,
    height: 64,
    page_height: PAGE_HEIGHT,
    viewport: Some(Viewport {
        visible_width: 128,
        offset: (132 - 128) / 2,
    }),
};

pub static PRESETS: [&DevicePreset; 3] = [&SSD1306_128X32, &SSD1306_128X64, &SH1106_132X64];

impl PresetId {
    pub fn preset(self) -> &'static DevicePreset {
        match self {
            PresetId::Ssd1306_128x32 => &SSD1306_128X32,
            PresetId::Ssd1306_128x64 => &SSD1306_128X64,
            PresetId::Sh1106_132x64 => &SH1106_132X64,
        }
    }
}

impl DevicePreset {
    pub fn by_name(name: &str) -> Result<&'static DevicePreset> {
        PresetId::from_str(name)
            .map(PresetId::preset)
            .map_err(|_| Error::UnknownPreset)
    }

    pub fn pages(&self) -> u32 {
        self.height / self.page_height
    }

    /// Packed size of one frame in bytes
    pub fn buffer_size(&self) -> usize {
        self.width as usize * self.pages() as usize
    }

    pub fn visible_width(&self) -> u32 {
        self.viewport.map_or(self.width, |v| v.visible_width)
    }

    pub fn column_offset(&self) -> u32 {
        self.viewport.map_or(0, |v| v.offset)
    }

    pub fn visible_size(&self) -> Size {
        Size::new(self.visible_width(), self.height)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn table_matches_hardware() {
        assert_eq!(SSD1306_128X32.buffer_size(), 512);
        assert_eq!(SSD1306_128X64.buffer_size(), 1024);
        assert_eq!(SH1106_132X64.buffer_size(), 132 * 8);
        assert_eq!(SH1106_132X64.column_offset(), 2);
        assert_eq!(SH1106_132X64.visible_size(), Size::new(128, 64));
        assert_eq!(SSD1306_128X64.column_offset(), 0);
    }

    #[test]
    fn viewports_are_centered() {
        for preset in PRESETS {
            assert_eq!(preset.height % preset.page_height, 0);
            if let Some(viewport) = preset.viewport {
                assert!(viewport.visible_width <= preset.width);
                assert_eq!(viewport.offset * 2, preset.width - viewport.visible_width);
            }
        }
    }

    #[test]
    fn lookup_by_name() {
        for id in PresetId::iter() {
            let preset = DevicePreset::by_name(id.preset().name).unwrap();
            assert_eq!(preset.id, id);
        }
        assert_eq!(DevicePreset::by_name("SSD1309_128x64"), Err(Error::UnknownPreset));
    }
}
