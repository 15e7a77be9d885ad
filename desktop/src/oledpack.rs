use std::{path::PathBuf, process::ExitCode};

use argh::FromArgs;
use log::{error, info, warn};
use oledpack_core::{Addressing, BitOrder, Dithering, MonochromeOptions, PackingOptions, PresetId};
use oledpack_desktop::{batch, decode};

#[derive(FromArgs)]
/// Convert an image or animated GIF into OLED controller bytes
struct Args {
    /// input PNG or GIF path
    #[argh(option, short = 'i')]
    input_path: PathBuf,

    /// output path for the raw packed bytes
    #[argh(option, short = 'o')]
    output_path: PathBuf,

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

    /// invert output
    #[argh(switch)]
    invert: bool,
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
        for other in &decoded.report.errors[1..] {
            error!("{}", other);
        }
        return Err(Box::new(*err));
    }

    let mono = MonochromeOptions::new(args.threshold, args.dither, args.invert);
    let packing = PackingOptions {
        preset: args.preset,
        addressing: args.addressing,
        bit_order: args.bit_order,
        invert: args.invert,
    };
    let packed = batch::convert_and_pack(decoded.frames, &mono, &packing)?;

    let bytes: Vec<u8> = packed.iter().flat_map(|f| f.bytes.iter().copied()).collect();
    std::fs::write(&args.output_path, &bytes)?;
    info!(
        "Wrote {} frames ({} bytes) for {} to {:?}",
        packed.len(),
        bytes.len(),
        preset.name,
        args.output_path
    );
    Ok(())
}
