//! Shared fixtures for the HD44780 tests: a fixed wiring on a [MockGpioDriver], and a decoder
//! turning the recorded pin activity back into the bytes the controller received.

use crate::lcd::hd44780::driver::BusWidth;
use crate::lcd::hd44780::LcdConfig;
use crate::mock::MockGpioDriver;

pub(crate) const PIN_COUNT: usize = 16;
pub(crate) const PIN_RS: usize = 0;
pub(crate) const PIN_E: usize = 1;
pub(crate) const DATA_4BIT: [usize; 4] = [2, 3, 4, 5];
pub(crate) const DATA_8BIT: [usize; 8] = [2, 3, 4, 5, 6, 7, 8, 9];
pub(crate) const PIN_BACKLIGHT: usize = 10;

/// A byte as received by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Transfer {
    Command(u8),
    Data(u8),
}

pub(crate) fn config_4bit() -> LcdConfig {
    LcdConfig::new_4bit(16, 2, PIN_RS, PIN_E, DATA_4BIT)
}

pub(crate) fn config_8bit() -> LcdConfig {
    LcdConfig::new_8bit(16, 2, PIN_RS, PIN_E, DATA_8BIT)
}

/// Decodes every byte latched by the controller since the log was last cleared.
pub(crate) fn transfers(gpio: &MockGpioDriver, bus_width: BusWidth) -> Vec<Transfer> {
    let to_transfer = |rs: bool, value: u8| {
        if rs {
            Transfer::Data(value)
        } else {
            Transfer::Command(value)
        }
    };

    match bus_width {
        BusWidth::EightBit => gpio
            .latches(PIN_E, PIN_RS, &DATA_8BIT)
            .into_iter()
            .map(|latch| to_transfer(latch.rs, latch.value))
            .collect(),
        BusWidth::FourBit => {
            let nibbles = gpio.latches(PIN_E, PIN_RS, &DATA_4BIT);
            assert_eq!(nibbles.len() % 2, 0, "odd number of nibbles latched");
            nibbles
                .chunks(2)
                .map(|pair| {
                    assert_eq!(pair[0].rs, pair[1].rs, "RS changed mid-byte");
                    to_transfer(pair[0].rs, pair[0].value << 4 | pair[1].value)
                })
                .collect()
        }
    }
}

/// Decodes only the data bytes, as text.
pub(crate) fn data_text(gpio: &MockGpioDriver, bus_width: BusWidth) -> String {
    transfers(gpio, bus_width)
        .into_iter()
        .filter_map(|transfer| match transfer {
            Transfer::Data(byte) => Some(char::from(byte)),
            Transfer::Command(_) => None,
        })
        .collect()
}
