use crate::delay::DelayNs;
use crate::lcd::hd44780::driver::{
    BusWidth, COMMAND_DELAY_US, CursorDirection, ENABLE_PULSE_US, HD44780Driver, POWER_ON_DELAY_MS,
};
use crate::{GpioBusOutput, GpioOutput, GpioResult};
use log::{debug, trace};
use std::fmt::Debug;

#[derive(Debug)]
pub enum GpioHD44780Bus<'a> {
    Bus8Bit(Box<dyn GpioBusOutput<8> + 'a>),
    Bus4Bit(Box<dyn GpioBusOutput<4> + 'a>),
}

impl GpioHD44780Bus<'_> {
    pub fn is_8bit(&self) -> bool {
        matches!(self, GpioHD44780Bus::Bus8Bit(_))
    }

    pub fn is_4bit(&self) -> bool {
        matches!(self, GpioHD44780Bus::Bus4Bit(_))
    }
}

/// Drives an HD44780 controller over its parallel interface, write-only.
///
/// The R/W pin of the display must be tied to GND. Since the busy flag cannot be read, every
/// transfer waits out the worst-case execution time instead: [COMMAND_DELAY_US] after each
/// byte, and [super::CLEAR_DELAY_MS] after clear and home.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a, D: DelayNs> {
    pin_e: Box<dyn GpioOutput + 'a>,
    pin_rs: Box<dyn GpioOutput + 'a>,
    data_bus: GpioHD44780Bus<'a>,
    delay: D,
}

impl<'a, D: DelayNs> GpioHD44780Driver<'a, D> {
    /// Creates a driver for a display with only D4-D7 connected.
    /// Bus index `0` must be D4.
    pub fn new_4bit(
        pin_e: Box<dyn GpioOutput + 'a>,
        pin_rs: Box<dyn GpioOutput + 'a>,
        data_bus: Box<dyn GpioBusOutput<4> + 'a>,
        delay: D,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rs,
            data_bus: GpioHD44780Bus::Bus4Bit(data_bus),
            delay,
        }
    }

    /// Creates a driver for a display with D0-D7 connected.
    /// Bus index `0` must be D0.
    pub fn new_8bit(
        pin_e: Box<dyn GpioOutput + 'a>,
        pin_rs: Box<dyn GpioOutput + 'a>,
        data_bus: Box<dyn GpioBusOutput<8> + 'a>,
        delay: D,
    ) -> Self {
        GpioHD44780Driver {
            pin_e,
            pin_rs,
            data_bus: GpioHD44780Bus::Bus8Bit(data_bus),
            delay,
        }
    }

    /// Latches the bits currently on the data bus.
    ///
    /// The controller latches on the falling edge of E, then needs [COMMAND_DELAY_US] to
    /// process the byte before the next one may be sent.
    fn pulse_e(pin: &dyn GpioOutput, delay: &mut D) -> GpioResult<()> {
        pin.write(false)?;
        delay.delay_us(ENABLE_PULSE_US);
        pin.write(true)?;
        delay.delay_us(ENABLE_PULSE_US);
        pin.write(false)?;
        delay.delay_us(COMMAND_DELAY_US);
        Ok(())
    }

    fn send(&mut self, data: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending data: {:08b}, RS: {}", data, rs);

        // Set RS pin
        self.pin_rs.write(rs)?;

        // Write data to the data bus
        match &self.data_bus {
            GpioHD44780Bus::Bus8Bit(bus) => {
                bus.write_byte(data)?;
                Self::pulse_e(&*self.pin_e, &mut self.delay)?;
            }
            GpioHD44780Bus::Bus4Bit(bus) => {
                let high_nibble = (data >> 4) & 0x0F;
                let low_nibble = data & 0x0F;

                trace!("Writing HN: {:04b}", high_nibble);
                bus.write_nibble(high_nibble)?;
                Self::pulse_e(&*self.pin_e, &mut self.delay)?;

                trace!("Writing LN: {:04b}", low_nibble);
                bus.write_nibble(low_nibble)?;
                Self::pulse_e(&*self.pin_e, &mut self.delay)?;
            }
        }

        Ok(())
    }
}

impl<D: DelayNs + Debug> HD44780Driver for GpioHD44780Driver<'_, D> {
    /// Runs the power-on sequence.
    ///
    /// Waits [POWER_ON_DELAY_MS] for the supply to settle. In 4-bit mode, it then sends `0x33`
    /// and `0x32`: as nibbles that's `0011` three times, which forces 8-bit mode from any
    /// state (including a controller stuck halfway through a 4-bit byte), followed by `0010`,
    /// which switches to 4-bit mode.
    ///
    /// Then, for both widths:
    /// - function set: data length per bus, 2 lines, 5x8 font (`0x38` or `0x28`),
    /// - display on, cursor off, blink off (`0x0C`),
    /// - entry mode: increment, no shift (`0x06`),
    /// - clear display (`0x01`), followed by its execution time.
    fn init(&mut self) -> GpioResult<()> {
        debug!("Initializing HD44780 over a {:?} bus", self.bus_width());

        self.delay.delay_ms(POWER_ON_DELAY_MS);

        // Synchronize
        if self.data_bus.is_4bit() {
            self.send(0b00110011, false)?;
            self.send(0b00110010, false)?;
        }
        self.function_set(self.data_bus.is_8bit(), true, false)?;
        self.set_display_control(true, false, false)?;
        self.set_entry_mode(CursorDirection::Right, false)?;
        self.clear_display()?;
        Ok(())
    }

    fn bus_width(&self) -> BusWidth {
        match self.data_bus {
            GpioHD44780Bus::Bus8Bit(_) => BusWidth::EightBit,
            GpioHD44780Bus::Bus4Bit(_) => BusWidth::FourBit,
        }
    }

    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, false)
    }

    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, true)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::testing::{
        DATA_4BIT, DATA_8BIT, PIN_E, PIN_RS, Transfer, transfers,
    };
    use crate::mock::{MockDelay, MockEvent, MockGpioDriver};
    use crate::{GpioActiveLevel, GpioDriver};

    fn driver_4bit(gpio: &MockGpioDriver) -> GpioHD44780Driver<'_, MockDelay> {
        GpioHD44780Driver::new_4bit(
            gpio.get_output(PIN_E, GpioActiveLevel::High).unwrap(),
            gpio.get_output(PIN_RS, GpioActiveLevel::High).unwrap(),
            gpio.get_bus_output(DATA_4BIT).unwrap(),
            gpio.delay(),
        )
    }

    fn driver_8bit(gpio: &MockGpioDriver) -> GpioHD44780Driver<'_, MockDelay> {
        GpioHD44780Driver::new_8bit(
            gpio.get_output(PIN_E, GpioActiveLevel::High).unwrap(),
            gpio.get_output(PIN_RS, GpioActiveLevel::High).unwrap(),
            gpio.get_bus_output(DATA_8BIT).unwrap(),
            gpio.delay(),
        )
    }

    #[test]
    fn eight_bit_byte_is_one_timed_pulse() {
        let gpio = MockGpioDriver::new(16);
        let mut driver = driver_8bit(&gpio);
        driver.send_command(0xA5).unwrap();

        let mut expected = vec![MockEvent::Write { pin: PIN_RS, level: false }];
        for (bit, &pin) in DATA_8BIT.iter().enumerate() {
            expected.push(MockEvent::Write { pin, level: 0xA5 & (1 << bit) != 0 });
        }
        expected.extend([
            MockEvent::Write { pin: PIN_E, level: false },
            MockEvent::Delay { us: 1 },
            MockEvent::Write { pin: PIN_E, level: true },
            MockEvent::Delay { us: 1 },
            MockEvent::Write { pin: PIN_E, level: false },
            MockEvent::Delay { us: 100 },
        ]);
        assert_eq!(gpio.events(), expected);
    }

    #[test]
    fn four_bit_byte_is_high_nibble_then_low_nibble() {
        let gpio = MockGpioDriver::new(16);
        let mut driver = driver_4bit(&gpio);
        driver.send_data(0x4B).unwrap();

        let nibbles = gpio.latches(PIN_E, PIN_RS, &DATA_4BIT);
        assert_eq!(nibbles.len(), 2);
        assert_eq!((nibbles[0].rs, nibbles[0].value), (true, 0x4));
        assert_eq!((nibbles[1].rs, nibbles[1].value), (true, 0xB));
        assert_eq!(gpio.rising_edges(PIN_E), 2);
    }

    #[test]
    fn pulse_counts_match_bus_width() {
        let gpio = MockGpioDriver::new(16);
        let mut driver = driver_4bit(&gpio);
        for byte in [0x00, 0x01, 0x7F, 0xFF] {
            gpio.clear_events();
            driver.send_command(byte).unwrap();
            assert_eq!(gpio.rising_edges(PIN_E), 2);
        }
        drop(driver);

        let mut driver = driver_8bit(&gpio);
        for byte in [0x00, 0x01, 0x7F, 0xFF] {
            gpio.clear_events();
            driver.send_data(byte).unwrap();
            assert_eq!(gpio.rising_edges(PIN_E), 1);
        }
    }

    #[test]
    fn every_pulse_is_followed_by_execution_time() {
        let gpio = MockGpioDriver::new(16);
        let mut driver = driver_4bit(&gpio);
        driver.send_command(0x28).unwrap();

        let events = gpio.events();
        let falling_edges: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, event)| **event == MockEvent::Write { pin: PIN_E, level: false })
            .map(|(i, _)| i)
            .collect();
        // Each pulse: set low before, set low after
        assert_eq!(falling_edges.len(), 4);
        for &i in falling_edges.iter().skip(1).step_by(2) {
            assert_eq!(events[i + 1], MockEvent::Delay { us: COMMAND_DELAY_US });
        }
    }

    #[test]
    fn four_bit_init_wakes_up_before_function_set() {
        let gpio = MockGpioDriver::new(16);
        let mut driver = driver_4bit(&gpio);
        driver.init().unwrap();

        assert_eq!(gpio.events()[0], MockEvent::Delay { us: 15_000 });
        assert_eq!(
            transfers(&gpio, BusWidth::FourBit),
            vec![
                Transfer::Command(0x33),
                Transfer::Command(0x32),
                Transfer::Command(0x28),
                Transfer::Command(0x0C),
                Transfer::Command(0x06),
                Transfer::Command(0x01),
            ]
        );
        assert_eq!(gpio.events().last(), Some(&MockEvent::Delay { us: 2_000 }));
    }

    #[test]
    fn eight_bit_init_sequence() {
        let gpio = MockGpioDriver::new(16);
        let mut driver = driver_8bit(&gpio);
        driver.init().unwrap();

        assert_eq!(gpio.events()[0], MockEvent::Delay { us: 15_000 });
        assert_eq!(
            transfers(&gpio, BusWidth::EightBit),
            vec![
                Transfer::Command(0x38),
                Transfer::Command(0x0C),
                Transfer::Command(0x06),
                Transfer::Command(0x01),
            ]
        );
        assert_eq!(gpio.events().last(), Some(&MockEvent::Delay { us: 2_000 }));
    }

    #[test]
    fn out_of_range_addresses_are_rejected() {
        let gpio = MockGpioDriver::new(16);
        let mut driver = driver_8bit(&gpio);
        assert!(driver.set_cgram_address(0x40).is_err());
        assert!(driver.set_ddram_address(0x80).is_err());
        assert!(gpio.events().is_empty());
    }
}
