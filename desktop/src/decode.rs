use std::{fmt, io::Cursor, path::Path};

use image::{AnimationDecoder, ImageFormat, codecs::gif::GifDecoder};
use log::{debug, info};
use oledpack_core::{DevicePreset, Error, FrameRgba};

#[derive(Debug)]
pub enum DecodeError {
    Io(std::io::ErrorKind),
    Image(String),
    Frame(Error),
    Empty,
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::Io(err.kind())
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        DecodeError::Image(err.to_string())
    }
}

impl From<Error> for DecodeError {
    fn from(err: Error) -> Self {
        DecodeError::Frame(err)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Io(kind) => write!(f, "i/o error: {}", kind),
            DecodeError::Image(msg) => write!(f, "could not decode image: {}", msg),
            DecodeError::Frame(err) => write!(f, "{}", err),
            DecodeError::Empty => f.write_str("image contains no frames"),
        }
    }
}

impl std::error::Error for DecodeError {}

type Result<T> = core::result::Result<T, DecodeError>;

/// Problems found in decoded frames before they reach the packer.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<Error>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Decoded {
    pub frames: Vec<FrameRgba>,
    pub report: ValidationReport,
}

pub fn load(path: &Path, preset: &DevicePreset) -> Result<Decoded> {
    info!("Loading {:?} for {}", path, preset.name);
    let data = std::fs::read(path)?;
    decode(&data, preset)
}

/// Decodes a PNG, or every frame of a GIF, and checks the sizes against `preset`.
pub fn decode(data: &[u8], preset: &DevicePreset) -> Result<Decoded> {
    let frames = match image::guess_format(data)? {
        ImageFormat::Gif => decode_gif(data)?,
        format => {
            debug!("Decoding single {:?} image", format);
            let image = image::load_from_memory_with_format(data, format)?.into_rgba8();
            let (width, height) = image.dimensions();
            vec![FrameRgba::new(width, height, image.into_raw())?]
        }
    };
    if frames.is_empty() {
        return Err(DecodeError::Empty);
    }
    let report = validate(&frames, preset);
    Ok(Decoded { frames, report })
}

fn decode_gif(data: &[u8]) -> Result<Vec<FrameRgba>> {
    let decoder = GifDecoder::new(Cursor::new(data))?;
    let frames = decoder.into_frames().collect_frames()?;
    debug!("Decoded {} GIF frames", frames.len());
    frames
        .into_iter()
        .map(|frame| -> Result<FrameRgba> {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay = (denom > 0).then(|| numer / denom);
            let buffer = frame.into_buffer();
            let (width, height) = buffer.dimensions();
            Ok(FrameRgba::new(width, height, buffer.into_raw())?.with_delay(delay))
        })
        .collect()
}

pub fn validate(frames: &[FrameRgba], preset: &DevicePreset) -> ValidationReport {
    let mut report = ValidationReport::default();
    for (index, frame) in frames.iter().enumerate() {
        let actual = (frame.width(), frame.height());
        if actual == (preset.width, preset.height) {
            continue;
        }
        report.errors.push(Error::DimensionMismatch {
            frame: index,
            expected: (preset.width, preset.height),
            actual,
        });
        if actual == (preset.visible_width(), preset.height) {
            report.warnings.push(format!(
                "frame {} matches the visible area of {}; the controller buffer is {} columns wide",
                index, preset.name, preset.width
            ));
        }
    }
    report
}
