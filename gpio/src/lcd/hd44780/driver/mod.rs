//! Low-level HD44780 command set.
//!
//! [HD44780Driver] builds the instruction bytes of the controller and leaves the transport
//! (how a byte reaches the controller) to the implementation. See [GpioHD44780Driver] for the
//! parallel GPIO transport.

mod gpio;

use crate::{GpioError, GpioResult};
pub use gpio::*;
use std::fmt::Debug;

/// Time the controller needs after power-on before it accepts instructions.
pub const POWER_ON_DELAY_MS: u32 = 15;

/// Execution time of the clear display and return home instructions.
pub const CLEAR_DELAY_MS: u32 = 2;

/// Width of the enable pulse, and the setup time before it.
pub const ENABLE_PULSE_US: u32 = 1;

/// Execution time of every other instruction, and of data writes.
pub const COMMAND_DELAY_US: u32 = 100;

/// The `HD44780Driver` trait defines a low-level interface for HD44780 LCD controller drivers.
///
/// # Memory
///
/// - **DDRAM** (Display Data RAM) holds the displayed characters. In 2-line mode, the first
///   line starts at `0x00` and the second at `0x40`.
/// - **CGRAM** (Character Generator RAM) holds up to 8 user-defined 5x8 characters, 8 bytes
///   each, that are displayed by writing character codes `0`-`7`.
///
/// The address counter points to either of them, depending on which address was set last.
/// Data writes go wherever it points, and then it increments (or decrements, see
/// [HD44780Driver::set_entry_mode]).
///
/// # Commands
///
/// Each command is a byte, sent with RS set to `0`. Bits that are not meaningful for a command
/// are sent as `0`.
pub trait HD44780Driver: Debug {
    /// Initializes the controller with the default settings, using the power-on sequence for
    /// the data bus width. See [GpioHD44780Driver::init].
    fn init(&mut self) -> GpioResult<()>;

    /// Gets the width of the data bus the controller is attached with.
    fn bus_width(&self) -> BusWidth;

    /// Clears the display and sets the cursor to the home position.
    ///
    /// Command: `00000001`. Blocks for [CLEAR_DELAY_MS] afterwards.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_command(0b00000001)?;
        self.delay_ms(CLEAR_DELAY_MS);
        Ok(())
    }

    /// Sets the cursor to the home position and undoes any display shift.
    ///
    /// Command: `00000010`. Blocks for [CLEAR_DELAY_MS] afterwards.
    fn return_home(&mut self) -> GpioResult<()> {
        self.send_command(0b00000010)?;
        self.delay_ms(CLEAR_DELAY_MS);
        Ok(())
    }

    /// Sets the cursor direction after each data write, and whether the display shifts along.
    ///
    /// Command: `000001IS`.
    /// `I` is `1` for right cursor direction (increment), `0` for left (decrement).
    /// `S` is `1` for display shift, `0` for no display shift.
    fn set_entry_mode(&mut self, cursor_direction: CursorDirection, shift: bool) -> GpioResult<()> {
        let mut command = 0b00000100;
        if cursor_direction == CursorDirection::Right {
            command |= 0b00000010;
        }
        if shift {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    ///
    /// Command: `00001DCB`.
    fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> GpioResult<()> {
        let mut command = 0b00001000;
        if display_on {
            command |= 0b00000100;
        }
        if cursor_on {
            command |= 0b00000010;
        }
        if blink_on {
            command |= 0b00000001;
        }
        self.send_command(command)
    }

    /// Moves the cursor or shifts the display by one, without changing the DDRAM contents.
    ///
    /// Command: `0001DR00`.
    /// `D` is `1` for display shift, `0` for cursor move.
    /// `R` is `1` for right, `0` for left.
    fn cursor_shift(&mut self, display_shift: bool, direction: CursorDirection) -> GpioResult<()> {
        let mut command = 0b00010000;
        if display_shift {
            command |= 0b00001000;
        }
        if direction == CursorDirection::Right {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Sets the interface width, the number of lines and the font.
    ///
    /// Command: `001BNF00`.
    /// `B` is `1` for 8-bit data length, `0` for 4-bit.
    /// `N` is `1` for 2 lines, `0` for 1 line.
    /// `F` is `1` for the 5x10 font, `0` for 5x8.
    fn function_set(&mut self, data_length: bool, two_lines: bool, font: bool) -> GpioResult<()> {
        let mut command = 0b00100000;
        if data_length {
            command |= 0b00010000;
        }
        if two_lines {
            command |= 0b00001000;
        }
        if font {
            command |= 0b00000100;
        }
        self.send_command(command)
    }

    /// Points the address counter at CGRAM.
    ///
    /// The address is a 6-bit value. If out of bounds, it will return [GpioError::InvalidArgument].
    ///
    /// Command: `01AAAAAA`.
    fn set_cgram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b00111111 {
            return Err(GpioError::InvalidArgument);
        }
        let command = 0b01000000 | address;
        self.send_command(command)
    }

    /// Points the address counter at DDRAM, which sets the cursor position.
    ///
    /// The address is a 7-bit value. If out of bounds, it will return [GpioError::InvalidArgument].
    ///
    /// Command: `1AAAAAAA`.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        if address > 0b01111111 {
            return Err(GpioError::InvalidArgument);
        }
        let command = 0b10000000 | address;
        self.send_command(command)
    }

    // Low-level operations, used by the commands above.

    /// Sends a command to the HD44780 controller.
    /// Sets the RS pin to 0 (command).
    fn send_command(&mut self, command: u8) -> GpioResult<()>;

    /// Sends data to the HD44780 controller, to the RAM the address counter points at.
    /// Sets the RS pin to 1 (data).
    fn send_data(&mut self, data: u8) -> GpioResult<()>;

    /// Blocks for the given amount of milliseconds, for instructions with long execution times.
    fn delay_ms(&mut self, ms: u32);
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Moves the cursor (or the display) to the left.
    Left,
    /// Moves the cursor (or the display) to the right.
    Right,
}

/// Width of the data bus between the host and the controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BusWidth {
    /// Only D4-D7 are connected. Every byte is sent as two nibbles, high nibble first.
    FourBit,
    /// D0-D7 are connected. Every byte is sent at once.
    EightBit,
}

impl BusWidth {
    /// Gets the amount of data pins this bus width uses.
    pub fn data_pins(&self) -> usize {
        match self {
            BusWidth::FourBit => 4,
            BusWidth::EightBit => 8,
        }
    }
}
