use crate::GpioError;
use crate::lcd::hd44780::driver::BusWidth;
use thiserror::Error;

/// Errors of the HD44780 display driver.
///
/// All of them, except [LcdError::Gpio], are detected before any pin is touched, so a failed
/// operation leaves the display as it was.
#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("invalid display geometry {columns}x{rows}")]
    InvalidGeometry { columns: u8, rows: u8 },
    #[error("a {bus_width:?} bus needs {expected} data pins, got {actual}")]
    DataPinCount {
        bus_width: BusWidth,
        expected: usize,
        actual: usize,
    },
    #[error("pin {pin} is out of range, the GPIO backend has {count} pins")]
    PinOutOfRange { pin: usize, count: usize },
    #[error("pin {0} is assigned more than once")]
    DuplicatePin(usize),
    #[error("pins {pins:?} could not be claimed: {source}")]
    PinUnavailable { pins: Vec<usize>, source: GpioError },
    #[error("position ({col}, {row}) is out of bounds for a {columns}x{rows} display")]
    PositionOutOfBounds {
        col: u8,
        row: u8,
        columns: u8,
        rows: u8,
    },
    #[error("custom character slot {0} is out of range (0-7)")]
    SlotOutOfRange(u8),
    #[error("glyph row {row} is {value:#04x}, but only 5 bits (up to 0x1f) are displayed")]
    GlyphRowOutOfRange { row: usize, value: u8 },
    #[error("character {0:?} has no single-byte character code")]
    UnencodableChar(char),
    #[error("no backlight pin configured")]
    NoBacklight,
    #[error("display is not initialized")]
    NotInitialized,
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
}

/// Broad category of an [LcdError].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LcdErrorKind {
    /// Invalid construction parameters, or pins the backend would not hand out.
    Configuration,
    /// A position, slot or glyph value outside its bounds.
    Range,
    /// An argument of the right type but unusable shape, like an unencodable character.
    Argument,
    /// The display is not in a state that allows the operation.
    State,
    /// The GPIO backend failed mid-operation.
    Io,
}

impl LcdError {
    pub fn kind(&self) -> LcdErrorKind {
        match self {
            LcdError::InvalidGeometry { .. }
            | LcdError::DataPinCount { .. }
            | LcdError::PinOutOfRange { .. }
            | LcdError::DuplicatePin(_)
            | LcdError::PinUnavailable { .. } => LcdErrorKind::Configuration,
            LcdError::PositionOutOfBounds { .. }
            | LcdError::SlotOutOfRange(_)
            | LcdError::GlyphRowOutOfRange { .. } => LcdErrorKind::Range,
            LcdError::UnencodableChar(_) => LcdErrorKind::Argument,
            LcdError::NoBacklight | LcdError::NotInitialized => LcdErrorKind::State,
            LcdError::Gpio(_) => LcdErrorKind::Io,
        }
    }
}

pub type LcdResult<T> = Result<T, LcdError>;
