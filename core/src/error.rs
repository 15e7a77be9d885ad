use core::fmt;

/// Errors raised by the conversion pipeline and the animator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Frame dimensions differ from the preset's physical size
    DimensionMismatch {
        frame: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    UnknownPreset,
    InvalidArgument(&'static str),
    /// A pixel or packed buffer has the wrong length for its dimensions
    CorruptBuffer { expected: usize, actual: usize },
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DimensionMismatch {
                frame,
                expected,
                actual,
            } => write!(
                f,
                "frame {}: expected {}x{}, got {}x{}",
                frame, expected.0, expected.1, actual.0, actual.1
            ),
            Error::UnknownPreset => f.write_str("unknown device preset"),
            Error::InvalidArgument(what) => write!(f, "invalid argument: {}", what),
            Error::CorruptBuffer { expected, actual } => {
                write!(f, "corrupt buffer: expected {} bytes, got {}", expected, actual)
            }
        }
    }
}

impl core::error::Error for Error {}
