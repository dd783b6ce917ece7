//! HD44780 character LCD module.
//!
//! [driver] holds the controller command set and the GPIO transport. [Lcd] builds the
//! display-level operations on top of it: validated cursor positioning, text with line
//! clearing and wrapping, custom characters and backlight control.
//!
//! ```no_run
//! use charlcd_gpio::delay::SleepDelay;
//! use charlcd_gpio::lcd::hd44780::{Lcd, LcdConfig};
//! use charlcd_gpio::raw::RawGpioDriver;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gpio = RawGpioDriver::new_gpiomem()?;
//! let config = LcdConfig::new_4bit(16, 2, 22, 17, [26, 16, 20, 21]);
//! let mut lcd = Lcd::from_config(&gpio, &config, SleepDelay)?;
//! lcd.init()?;
//! lcd.write_line("Hello,", 0)?;
//! lcd.write("world!", 5, 1, true)?;
//! # Ok(())
//! # }
//! ```

mod config;
pub mod driver;
mod error;
mod geometry;
#[cfg(test)]
mod testing;
pub mod validate;

pub use config::*;
pub use error::*;
pub use geometry::*;

use crate::GpioOutput;
use driver::{BusWidth, CursorDirection, HD44780Driver};
use log::debug;
use validate::{Glyph, check_glyph, encode_char, encode_str};

/// Lifecycle of the attached controller, as far as the driver knows.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LcdState {
    /// Power-on state: the controller might be in any mode, so only raw commands are sent.
    #[default]
    Uninitialized,
    /// [Lcd::init] completed.
    Ready,
}

/// A character display driven by an [HD44780Driver].
///
/// Every operation blocks until the controller has had time to execute it. The cursor
/// position is never cached: operations that need a position set it explicitly.
///
/// There is no internal locking. Wrap the whole display in a mutex to share it between threads.
#[derive(Debug)]
pub struct Lcd<'a, D: HD44780Driver> {
    driver: D,
    geometry: Geometry,
    backlight: Option<Box<dyn GpioOutput + 'a>>,
    state: LcdState,
}

impl<'a, D: HD44780Driver> Lcd<'a, D> {
    /// Wraps a driver. The display still needs [Lcd::init].
    pub fn new(driver: D, geometry: Geometry, backlight: Option<Box<dyn GpioOutput + 'a>>) -> Self {
        Self {
            driver,
            geometry,
            backlight,
            state: LcdState::Uninitialized,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn bus_width(&self) -> BusWidth {
        self.driver.bus_width()
    }

    pub fn state(&self) -> LcdState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LcdState::Ready
    }

    pub fn has_backlight(&self) -> bool {
        self.backlight.is_some()
    }

    fn ensure_ready(&self) -> LcdResult<()> {
        match self.state {
            LcdState::Ready => Ok(()),
            LcdState::Uninitialized => Err(LcdError::NotInitialized),
        }
    }

    /// Brings the controller into a known state: 2 lines, display on, cursor off, increment
    /// mode, cleared. See [driver::GpioHD44780Driver::init] for the exact sequence.
    ///
    /// Can be called again at any time; the whole sequence is replayed from the start. If the
    /// sequence fails halfway, the display stays uninitialized.
    pub fn init(&mut self) -> LcdResult<()> {
        self.state = LcdState::Uninitialized;
        self.driver.init()?;
        self.state = LcdState::Ready;
        debug!("{}x{} display ready", self.geometry.columns(), self.geometry.rows());
        Ok(())
    }

    /// Sends a raw command byte. Allowed before [Lcd::init].
    pub fn command(&mut self, command: u8) -> LcdResult<()> {
        self.driver.send_command(command)?;
        Ok(())
    }

    /// Writes a character at the current address. The address then advances.
    ///
    /// See [validate::encode_char] for which characters are accepted.
    pub fn write_char(&mut self, c: char) -> LcdResult<()> {
        self.ensure_ready()?;
        let code = encode_char(c)?;
        self.driver.send_data(code)?;
        Ok(())
    }

    /// Writes the text at the current address, without positioning or wrapping.
    pub fn print(&mut self, text: &str) -> LcdResult<()> {
        self.ensure_ready()?;
        for code in encode_str(text)? {
            self.driver.send_data(code)?;
        }
        Ok(())
    }

    /// Clears the display and moves the cursor home.
    pub fn clear(&mut self) -> LcdResult<()> {
        self.ensure_ready()?;
        self.driver.clear_display()?;
        Ok(())
    }

    /// Moves the cursor home and undoes any display shift, keeping the contents.
    pub fn home(&mut self) -> LcdResult<()> {
        self.ensure_ready()?;
        self.driver.return_home()?;
        Ok(())
    }

    /// Moves the cursor to the given cell.
    pub fn position(&mut self, col: u8, row: u8) -> LcdResult<()> {
        self.ensure_ready()?;
        self.geometry.check_position(col, row)?;
        self.set_position(col, row)
    }

    fn set_position(&mut self, col: u8, row: u8) -> LcdResult<()> {
        let address = self.geometry.ddram_address(col, row);
        self.driver.set_ddram_address(address)?;
        Ok(())
    }

    /// Turns the display on or off. Also hides the cursor.
    pub fn display_on_off(&mut self, on: bool) -> LcdResult<()> {
        self.ensure_ready()?;
        self.driver.set_display_control(on, false, false)?;
        Ok(())
    }

    /// Shows or hides the cursor, and makes it blink. Also turns the display on.
    pub fn set_cursor(&mut self, visible: bool, blink: bool) -> LcdResult<()> {
        self.ensure_ready()?;
        self.driver.set_display_control(true, visible, blink)?;
        Ok(())
    }

    /// Turns the backlight on or off.
    ///
    /// The backlight is a plain GPIO line outside the controller, so this works before
    /// [Lcd::init] too.
    pub fn backlight_on_off(&mut self, on: bool) -> LcdResult<()> {
        let backlight = self.backlight.as_deref().ok_or(LcdError::NoBacklight)?;
        backlight.write(on)?;
        Ok(())
    }

    /// Defines the custom character displayed by character code `slot` (0-7).
    ///
    /// Afterwards the address counter points into CGRAM, so set a position (or use
    /// [Lcd::write], which always does) before writing characters again.
    pub fn create_char(&mut self, slot: u8, glyph: &Glyph) -> LcdResult<()> {
        self.ensure_ready()?;
        check_glyph(slot, glyph)?;
        self.driver.set_cgram_address(slot << 3)?;
        for &row in glyph {
            self.driver.send_data(row)?;
        }
        Ok(())
    }

    /// Shifts the visible window over DDRAM by one cell. Contents and cursor stay put.
    pub fn display_shift(&mut self, direction: CursorDirection) -> LcdResult<()> {
        self.ensure_ready()?;
        self.driver.cursor_shift(true, direction)?;
        Ok(())
    }

    /// Moves the cursor by one cell.
    pub fn move_cursor(&mut self, direction: CursorDirection) -> LcdResult<()> {
        self.ensure_ready()?;
        self.driver.cursor_shift(false, direction)?;
        Ok(())
    }

    /// Writes the text starting at the given cell.
    ///
    /// With `clear_line`, the whole row is blanked first. Text reaching the end of a row wraps
    /// to the start of the next one. Text reaching the end of the last row is cut off.
    pub fn write(&mut self, text: &str, col: u8, row: u8, clear_line: bool) -> LcdResult<()> {
        self.ensure_ready()?;
        self.geometry.check_position(col, row)?;
        let codes = encode_str(text)?;

        if clear_line {
            self.set_position(0, row)?;
            for _ in 0..self.geometry.columns() {
                self.driver.send_data(b' ')?;
            }
        }

        self.set_position(col, row)?;

        let (mut col, mut row) = (col, row);
        for (i, &code) in codes.iter().enumerate() {
            if col >= self.geometry.columns() {
                if row + 1 >= self.geometry.rows() {
                    debug!("Out of rows, dropped {} characters", codes.len() - i);
                    break;
                }
                col = 0;
                row += 1;
                self.set_position(col, row)?;
            }
            self.driver.send_data(code)?;
            col += 1;
        }

        Ok(())
    }

    /// Replaces the contents of a row.
    pub fn write_line(&mut self, text: &str, row: u8) -> LcdResult<()> {
        self.write(text, 0, row, true)
    }
}
