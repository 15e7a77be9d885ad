#![no_std]

pub mod animation;
pub mod canvas;
pub mod error;
pub mod geometry;
pub mod mono;
pub mod packer;
pub mod viewport;


extern crate alloc;

pub use error::{Error, Result};
pub use geometry::{DevicePreset, PresetId};
pub use mono::{Dithering, FrameMono, FrameRgba, MonochromeOptions, convert};
pub use packer::{Addressing, BitOrder, Layout, PackedFrame, PackingOptions, pack};
pub use viewport::{MAX_SCALE, Palette, RenderOptions, render_frame, render_pixel};
