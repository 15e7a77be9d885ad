use embedded_graphics::{
    pixelcolor::{BinaryColor, Rgb888},
    prelude::{DrawTarget, Point, RgbColor, Size},
    primitives::Rectangle,
};
use log::warn;

use crate::{
    geometry::DevicePreset,
    packer::{Layout, PackedFrame},
};

/// Colors used when painting a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette<C> {
    pub on: C,
    pub off: C,
    pub grid: C,
}

impl Default for Palette<BinaryColor> {
    fn default() -> Self {
        Self {
            on: BinaryColor::On,
            off: BinaryColor::Off,
            grid: BinaryColor::Off,
        }
    }
}

impl Default for Palette<Rgb888> {
    fn default() -> Self {
        Self {
            on: Rgb888::new(0x9F, 0xDF, 0xFF),
            off: Rgb888::BLACK,
            grid: Rgb888::new(0x20, 0x20, 0x20),
        }
    }
}

/// Largest block size a preview is drawn with; larger scales are clamped
pub const MAX_SCALE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions<C> {
    /// Must match the layout the bytes were packed with
    pub layout: Layout,
    /// Each pixel becomes a `scale x scale` block, clamped to `1..=MAX_SCALE`
    pub scale: u32,
    pub show_grid: bool,
    /// Display-only flip, independent of any inversion baked into the bytes
    pub invert: bool,
    pub palette: Palette<C>,
}

impl<C> Default for RenderOptions<C>
where
    Palette<C>: Default,
{
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            scale: 1,
            show_grid: false,
            invert: false,
            palette: Palette::default(),
        }
    }
}

impl<C> RenderOptions<C> {
    fn scale(&self) -> u32 {
        self.scale.clamp(1, MAX_SCALE)
    }

    /// Distance between the origins of neighbouring blocks
    fn pitch(&self) -> u32 {
        self.scale() + self.show_grid as u32
    }
}

/// Reads visible pixel `(x, y)` back out of packed bytes.
///
/// Visible column `x` maps to physical column `x + offset`, so columns outside
/// the viewport can never be observed. Coordinates off the glass and bytes
/// missing from a short buffer read as `Off`.
pub fn render_pixel(packed: &PackedFrame, x: u32, y: u32, layout: &Layout) -> BinaryColor {
    let preset = packed.preset;
    if x >= preset.visible_width() || y >= preset.height {
        return BinaryColor::Off;
    }
    let (index, bit) = layout.locate(preset, x + preset.column_offset(), y);
    match packed.bytes.get(index) {
        Some(byte) if (byte >> bit) & 1 == 1 => BinaryColor::On,
        _ => BinaryColor::Off,
    }
}

/// Size of the area painted by [`render_frame`].
pub fn surface_size<C>(preset: &DevicePreset, options: &RenderOptions<C>) -> Size {
    let span = |n: u32| n * options.pitch() - options.show_grid as u32;
    Size::new(span(preset.visible_width()), span(preset.height))
}

/// Paints the visible part of `packed` onto `target`, starting at the origin.
pub fn render_frame<D>(
    target: &mut D,
    packed: &PackedFrame,
    options: &RenderOptions<D::Color>,
) -> Result<(), D::Error>
where
    D: DrawTarget,
{
    if let Err(err) = packed.validate() {
        warn!("Rendering {} with missing data: {}", packed.preset_name(), err);
    }
    let preset = packed.preset;
    let scale = options.scale();
    let pitch = options.pitch();

    if options.show_grid {
        let area = Rectangle::new(Point::zero(), surface_size(preset, options));
        target.fill_solid(&area, options.palette.grid)?;
    }

    for y in 0..preset.height {
        for x in 0..preset.visible_width() {
            let on = render_pixel(packed, x, y, &options.layout).is_on() ^ options.invert;
            let color = if on {
                options.palette.on
            } else {
                options.palette.off
            };
            let block = Rectangle::new(
                Point::new((x * pitch) as i32, (y * pitch) as i32),
                Size::new(scale, scale),
            );
            target.fill_solid(&block, color)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::{
        canvas::Canvas,
        geometry::{SH1106_132X64, SSD1306_128X32},
        packer::{Addressing, BitOrder},
    };

    fn frame(preset: &'static DevicePreset, bytes: alloc::vec::Vec<u8>) -> PackedFrame {
        PackedFrame {
            bytes,
            preset,
            delay_ms: None,
        }
    }

    #[test]
    fn reads_vertical_lsb() {
        let mut bytes = vec![0u8; 512];
        bytes[128 + 5] = 0b0000_0100;
        let packed = frame(&SSD1306_128X32, bytes);
        let layout = Layout::default();
        assert_eq!(render_pixel(&packed, 5, 10, &layout), BinaryColor::On);
        assert_eq!(render_pixel(&packed, 5, 11, &layout), BinaryColor::Off);
        let msb = Layout {
            addressing: Addressing::Vertical,
            bit_order: BitOrder::MsbFirst,
        };
        assert_eq!(render_pixel(&packed, 5, 13, &msb), BinaryColor::On);
    }

    #[test]
    fn short_buffer_reads_off() {
        let packed = frame(&SSD1306_128X32, vec![0xFF; 10]);
        let layout = Layout::default();
        assert_eq!(render_pixel(&packed, 3, 0, &layout), BinaryColor::On);
        assert_eq!(render_pixel(&packed, 100, 31, &layout), BinaryColor::Off);

        let mut canvas = Canvas::new(Size::new(128, 32), BinaryColor::On);
        render_frame(&mut canvas, &packed, &RenderOptions::default()).unwrap();
        assert_eq!(canvas.pixel(127, 31), Some(BinaryColor::Off));
        assert_eq!(canvas.pixel(0, 0), Some(BinaryColor::On));
    }

    #[test]
    fn out_of_viewport_reads_off() {
        let packed = frame(&SH1106_132X64, vec![0xFF; 132 * 8]);
        let layout = Layout::default();
        assert_eq!(render_pixel(&packed, 127, 63, &layout), BinaryColor::On);
        assert_eq!(render_pixel(&packed, 128, 0, &layout), BinaryColor::Off);
        assert_eq!(render_pixel(&packed, 0, 64, &layout), BinaryColor::Off);
    }

    #[test]
    fn scaled_with_grid() {
        let mut bytes = vec![0u8; 512];
        bytes[0] = 0b0000_0001;
        let packed = frame(&SSD1306_128X32, bytes);
        let options = RenderOptions {
            scale: 3,
            show_grid: true,
            ..RenderOptions::<Rgb888>::default()
        };
        let size = surface_size(&SSD1306_128X32, &options);
        assert_eq!(size, Size::new(128 * 4 - 1, 32 * 4 - 1));

        let mut canvas = Canvas::new(size, Rgb888::RED);
        render_frame(&mut canvas, &packed, &options).unwrap();
        let palette = options.palette;
        for y in 0..3 {
            for x in 0..3 {
                assert_eq!(canvas.pixel(x, y), Some(palette.on));
            }
        }
        assert_eq!(canvas.pixel(3, 0), Some(palette.grid));
        assert_eq!(canvas.pixel(0, 3), Some(palette.grid));
        assert_eq!(canvas.pixel(4, 0), Some(palette.off));
        assert!(!canvas.pixels().contains(&Rgb888::RED));
    }

    #[test]
    fn oversized_scale_is_clamped() {
        let huge = RenderOptions::<BinaryColor> {
            scale: u32::MAX,
            show_grid: true,
            ..Default::default()
        };
        let capped = RenderOptions::<BinaryColor> {
            scale: MAX_SCALE,
            ..huge
        };
        let size = surface_size(&SSD1306_128X32, &huge);
        assert_eq!(size, surface_size(&SSD1306_128X32, &capped));
        assert_eq!(size, Size::new(128 * 65 - 1, 32 * 65 - 1));

        let mut canvas = Canvas::new(size, BinaryColor::Off);
        let packed = frame(&SSD1306_128X32, vec![0xFF; 512]);
        render_frame(&mut canvas, &packed, &huge).unwrap();
        assert_eq!(canvas.pixel(127 * 65, 31 * 65), Some(BinaryColor::On));
    }

    #[test]
    fn display_invert_flips_colors() {
        let packed = frame(&SSD1306_128X32, vec![0u8; 512]);
        let options = RenderOptions {
            invert: true,
            ..RenderOptions::<BinaryColor>::default()
        };
        let mut canvas = Canvas::new(Size::new(128, 32), BinaryColor::Off);
        render_frame(&mut canvas, &packed, &options).unwrap();
        assert!(canvas.pixels().iter().all(|&c| c == BinaryColor::On));
    }
}
