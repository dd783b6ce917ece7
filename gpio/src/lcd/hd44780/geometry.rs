use crate::lcd::hd44780::{LcdError, LcdResult};

/// Size of a character display, in character cells.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Geometry {
    columns: u8,
    rows: u8,
}

impl Geometry {
    /// A 2-line HD44780 has 40 DDRAM cells per line.
    pub const MAX_COLUMNS: u8 = 40;
    pub const MAX_ROWS: u8 = 4;

    pub fn new(columns: u8, rows: u8) -> LcdResult<Self> {
        if !(1..=Self::MAX_COLUMNS).contains(&columns) || !(1..=Self::MAX_ROWS).contains(&rows) {
            return Err(LcdError::InvalidGeometry { columns, rows });
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> u8 {
        self.columns
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    /// Checks that the cell is on the display.
    pub fn check_position(&self, col: u8, row: u8) -> LcdResult<()> {
        if col >= self.columns || row >= self.rows {
            return Err(LcdError::PositionOutOfBounds {
                col,
                row,
                columns: self.columns,
                rows: self.rows,
            });
        }
        Ok(())
    }

    /// Gets the DDRAM address of the cell.
    ///
    /// Row 0 starts at `0x00` and row 1 at `0x40`. Further rows continue in steps of `0x40`,
    /// wrapping around the 7-bit address space, so rows 2 and 3 land on rows 0 and 1. That
    /// matches no real 4-line module (a 20x4 starts its rows at `0x00`, `0x40`, `0x14`, `0x54`),
    /// so check the datasheet before relying on rows past the second.
    pub fn ddram_address(&self, col: u8, row: u8) -> u8 {
        ((0x40 * u16::from(row) + u16::from(col)) & 0x7F) as u8
    }
}
