use std::{path::PathBuf, process::ExitCode, sync::Arc};

use argh::FromArgs;
use embedded_graphics::pixelcolor::Rgb888;
use log::{error, info, warn};
use oledpack_core::{
    Addressing, BitOrder, Dithering, MonochromeOptions, PackingOptions, PresetId, RenderOptions,
    animation::{self, AnimationOptions},
    viewport::surface_size,
};
use oledpack_desktop::{batch, clock::StdClock, decode, minifb_display::MinifbSurface};

#[derive(FromArgs)]
/// Preview an image or animated GIF the way the OLED will show it.
/// Space toggles playback, arrows step frames / change fps, Escape quits.
struct Args {
    /// input PNG or GIF path
    #[argh(option, short = 'i')]
    input_path: PathBuf,

    /// device preset (SSD1306_128x32, SSD1306_128x64, SH1106_132x64)
    #[argh(option, default = "PresetId::Ssd1306_128x64")]
    preset: PresetId,

    /// vertical or horizontal
    #[argh(option, default = "Addressing::Vertical")]
    addressing: Addressing,

    /// lsb or msb
    #[argh(option, default = "BitOrder::LsbFirst")]
    bit_order: BitOrder,

    /// luminance threshold, clamped to 0-255
    #[argh(option, default = "128")]
    threshold: i32,

    /// none or bayer4
    #[argh(option, default = "Dithering::None")]
    dither: Dithering,

    /// invert packed output
    #[argh(switch)]
    invert: bool,

    /// pixel scale
    #[argh(option, default = "4")]
    scale: u32,

    /// draw separators between pixels
    #[argh(switch)]
    grid: bool,

    /// flip colors in the preview only
    #[argh(switch)]
    display_invert: bool,

    /// playback rate for frames without their own delay
    #[argh(option, default = "10")]
    fps: u32,

    /// stop on the last frame
    #[argh(switch)]
    no_loop: bool,

    /// bounce between first and last frame
    #[argh(switch)]
    pingpong: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Args = argh::from_env();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let preset = args.preset.preset();
    let decoded = decode::load(&args.input_path, preset)?;
    for warning in &decoded.report.warnings {
        warn!("{}", warning);
    }
    if let Some(err) = decoded.report.errors.first() {
        return Err(Box::new(*err));
    }

    let mono = MonochromeOptions::new(args.threshold, args.dither, args.invert);
    let packing = PackingOptions {
        preset: args.preset,
        addressing: args.addressing,
        bit_order: args.bit_order,
        invert: args.invert,
    };
    let frames: Arc<[_]> = batch::convert_and_pack(decoded.frames, &mono, &packing)?.into();

    let render: RenderOptions<Rgb888> = RenderOptions {
        layout: packing.layout(),
        scale: args.scale,
        show_grid: args.grid,
        invert: args.display_invert,
        ..RenderOptions::default()
    };
    let title = format!("oledpack - {}", preset.name);
    let surface = MinifbSurface::new(&title, surface_size(preset, &render))?;
    let options = AnimationOptions {
        fps: args.fps,
        looping: !args.no_loop,
        pingpong: args.pingpong,
    };
    let mut controller = animation::play(surface, frames, render, options, StdClock::default())?;

    while controller.surface().is_open() {
        controller.poll();

        let surface = controller.surface();
        let toggle = surface.key_pressed(minifb::Key::Space);
        let prev = surface.key_pressed(minifb::Key::Left);
        let next = surface.key_pressed(minifb::Key::Right);
        let faster = surface.key_pressed(minifb::Key::Up);
        let slower = surface.key_pressed(minifb::Key::Down);

        if toggle {
            if controller.is_playing() {
                controller.stop();
            } else {
                controller.resume();
            }
        }
        if prev {
            controller.go_to(controller.current_frame().saturating_sub(1));
        }
        if next {
            controller.go_to(controller.current_frame() + 1);
        }
        if faster || slower {
            let fps = if faster {
                controller.fps() + 1
            } else {
                controller.fps().saturating_sub(1)
            };
            match controller.set_fps(fps) {
                Ok(()) => info!("{} fps", fps),
                Err(err) => warn!("{}", err),
            }
        }

        controller.surface_mut().present()?;
    }
    Ok(())
}
