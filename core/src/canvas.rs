use alloc::vec;
use alloc::vec::Vec;

use embedded_graphics::{
    Pixel,
    prelude::{DrawTarget, OriginDimensions, PixelColor, Point, Size},
};

/// Heap-backed raster surface, used for headless previews.
pub struct Canvas<C: PixelColor> {
    size: Size,
    pixels: Vec<C>,
}

impl<C: PixelColor> Canvas<C> {
    pub fn new(size: Size, background: C) -> Self {
        Self {
            size,
            pixels: vec![background; size.width as usize * size.height as usize],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<C> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        Some(self.pixels[y as usize * self.size.width as usize + x as usize])
    }

    pub fn pixels(&self) -> &[C] {
        &self.pixels
    }
}

impl<C: PixelColor> OriginDimensions for Canvas<C> {
    fn size(&self) -> Size {
        self.size
    }
}

impl<C: PixelColor> DrawTarget for Canvas<C> {
    type Color = C;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 || x as u32 >= self.size.width || y as u32 >= self.size.height {
                continue;
            }
            self.pixels[y as usize * self.size.width as usize + x as usize] = color;
        }
        Ok(())
    }
}
