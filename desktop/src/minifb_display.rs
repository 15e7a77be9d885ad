use embedded_graphics::{
    Pixel,
    pixelcolor::Rgb888,
    prelude::{DrawTarget, OriginDimensions, RgbColor, Size},
};
use log::info;

/// Preview surface backed by a minifb window.
pub struct MinifbSurface {
    window: minifb::Window,
    buffer: Vec<u32>,
    size: Size,
}

fn to_argb(color: Rgb888) -> u32 {
    0xFF00_0000 | (color.r() as u32) << 16 | (color.g() as u32) << 8 | color.b() as u32
}

impl MinifbSurface {
    pub fn new(title: &str, size: Size) -> Result<Self, minifb::Error> {
        let options = minifb::WindowOptions {
            borderless: false,
            title: true,
            resize: false,
            scale: minifb::Scale::X1,
            ..minifb::WindowOptions::default()
        };
        let mut window =
            minifb::Window::new(title, size.width as usize, size.height as usize, options)?;
        window.set_target_fps(60);
        info!("Opened {}x{} preview window", size.width, size.height);
        Ok(Self {
            window,
            buffer: vec![to_argb(Rgb888::BLACK); size.width as usize * size.height as usize],
            size,
        })
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(minifb::Key::Escape)
    }

    pub fn key_pressed(&self, key: minifb::Key) -> bool {
        self.window.is_key_pressed(key, minifb::KeyRepeat::No)
    }

    /// Pushes the buffer to the window and pumps its events.
    pub fn present(&mut self) -> Result<(), minifb::Error> {
        self.window.update_with_buffer(
            &self.buffer,
            self.size.width as usize,
            self.size.height as usize,
        )
    }
}

impl OriginDimensions for MinifbSurface {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for MinifbSurface {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = (self.size.width as i32, self.size.height as i32);
        for Pixel(coord, color) in pixels {
            if coord.x < 0 || coord.y < 0 || coord.x >= width || coord.y >= height {
                continue;
            }
            self.buffer[(coord.y * width + coord.x) as usize] = to_argb(color);
        }
        Ok(())
    }
}
