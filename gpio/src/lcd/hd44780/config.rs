use crate::delay::DelayNs;
use crate::lcd::hd44780::driver::{BusWidth, GpioHD44780Driver};
use crate::lcd::hd44780::{Geometry, Lcd, LcdError, LcdResult};
use crate::{GpioActiveLevel, GpioDriver, GpioError};
use log::debug;
use std::fmt::Debug;

/// Wiring and size of a display attached over GPIO.
///
/// Pin numbers are in the numbering of the [GpioDriver] the display is built from.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LcdConfig {
    pub columns: u8,
    pub rows: u8,
    pub bus_width: BusWidth,
    /// Register select pin.
    pub pin_rs: usize,
    /// Enable (strobe) pin.
    pub pin_e: usize,
    /// Data pins, least significant first: D4-D7 for a 4-bit bus, D0-D7 for an 8-bit bus.
    pub data_pins: Vec<usize>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub pin_backlight: Option<usize>,
    /// Whether the backlight lights up when its pin is driven low.
    #[cfg_attr(feature = "serde", serde(default))]
    pub backlight_active_low: bool,
}

impl LcdConfig {
    pub fn new_4bit(columns: u8, rows: u8, pin_rs: usize, pin_e: usize, data_pins: [usize; 4]) -> Self {
        Self {
            columns,
            rows,
            bus_width: BusWidth::FourBit,
            pin_rs,
            pin_e,
            data_pins: data_pins.to_vec(),
            pin_backlight: None,
            backlight_active_low: false,
        }
    }

    pub fn new_8bit(columns: u8, rows: u8, pin_rs: usize, pin_e: usize, data_pins: [usize; 8]) -> Self {
        Self {
            columns,
            rows,
            bus_width: BusWidth::EightBit,
            pin_rs,
            pin_e,
            data_pins: data_pins.to_vec(),
            pin_backlight: None,
            backlight_active_low: false,
        }
    }

    pub fn with_backlight(mut self, pin: usize, active_level: GpioActiveLevel) -> Self {
        self.pin_backlight = Some(pin);
        self.backlight_active_low = active_level == GpioActiveLevel::Low;
        self
    }

    pub fn backlight_active_level(&self) -> GpioActiveLevel {
        if self.backlight_active_low {
            GpioActiveLevel::Low
        } else {
            GpioActiveLevel::High
        }
    }

    /// Iterates over every assigned pin: RS, E, the data pins, then the backlight pin.
    pub fn pins(&self) -> impl Iterator<Item = usize> + '_ {
        [self.pin_rs, self.pin_e]
            .into_iter()
            .chain(self.data_pins.iter().copied())
            .chain(self.pin_backlight)
    }

    /// Checks the configuration against a backend with `pin_count` pins.
    ///
    /// The geometry must be valid, the data pin count must match the bus width, and every pin
    /// must exist and be assigned only once.
    pub fn validate(&self, pin_count: usize) -> LcdResult<Geometry> {
        let geometry = Geometry::new(self.columns, self.rows)?;

        let expected = self.bus_width.data_pins();
        if self.data_pins.len() != expected {
            return Err(LcdError::DataPinCount {
                bus_width: self.bus_width,
                expected,
                actual: self.data_pins.len(),
            });
        }

        for (i, pin) in self.pins().enumerate() {
            if pin >= pin_count {
                return Err(LcdError::PinOutOfRange {
                    pin,
                    count: pin_count,
                });
            }
            if self.pins().take(i).any(|other| other == pin) {
                return Err(LcdError::DuplicatePin(pin));
            }
        }

        Ok(geometry)
    }
}

impl<'a, D: DelayNs + Debug> Lcd<'a, GpioHD44780Driver<'a, D>> {
    /// Validates the configuration, then claims its pins from the backend.
    ///
    /// Fails with a configuration error if any pin cannot be claimed. The pins are released
    /// when the returned display is dropped. The display still needs [Lcd::init].
    pub fn from_config<G: GpioDriver>(gpio: &'a G, config: &LcdConfig, delay: D) -> LcdResult<Self> {
        let geometry = config.validate(gpio.count()?)?;

        let unavailable = |pins: &[usize]| {
            let pins = pins.to_vec();
            move |source: GpioError| LcdError::PinUnavailable { pins, source }
        };

        let pin_rs = gpio
            .get_output(config.pin_rs, GpioActiveLevel::High)
            .map_err(unavailable(&[config.pin_rs]))?;
        let pin_e = gpio
            .get_output(config.pin_e, GpioActiveLevel::High)
            .map_err(unavailable(&[config.pin_e]))?;

        let driver = match config.bus_width {
            BusWidth::FourBit => {
                let pins: [usize; 4] = config.data_pins[..]
                    .try_into()
                    .map_err(|_| LcdError::DataPinCount {
                        bus_width: config.bus_width,
                        expected: 4,
                        actual: config.data_pins.len(),
                    })?;
                let bus = gpio.get_bus_output(pins).map_err(unavailable(&pins[..]))?;
                GpioHD44780Driver::new_4bit(pin_e, pin_rs, bus, delay)
            }
            BusWidth::EightBit => {
                let pins: [usize; 8] = config.data_pins[..]
                    .try_into()
                    .map_err(|_| LcdError::DataPinCount {
                        bus_width: config.bus_width,
                        expected: 8,
                        actual: config.data_pins.len(),
                    })?;
                let bus = gpio.get_bus_output(pins).map_err(unavailable(&pins[..]))?;
                GpioHD44780Driver::new_8bit(pin_e, pin_rs, bus, delay)
            }
        };

        let backlight = match config.pin_backlight {
            Some(pin) => Some(
                gpio.get_output(pin, config.backlight_active_level())
                    .map_err(unavailable(&[pin]))?,
            ),
            None => None,
        };

        debug!(
            "Claimed {}x{} display pins: RS {}, E {}, data {:?}, backlight {:?}",
            geometry.columns(),
            geometry.rows(),
            config.pin_rs,
            config.pin_e,
            config.data_pins,
            config.pin_backlight
        );

        Ok(Lcd::new(driver, geometry, backlight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lcd::hd44780::LcdErrorKind;
    use crate::lcd::hd44780::testing::{
        PIN_BACKLIGHT, PIN_COUNT, PIN_E, PIN_RS, config_4bit, config_8bit,
    };
    use crate::mock::MockGpioDriver;

    #[test]
    fn valid_configs_pass() {
        assert!(config_4bit().validate(PIN_COUNT).is_ok());
        assert!(config_8bit().validate(PIN_COUNT).is_ok());
        assert!(config_4bit()
            .with_backlight(PIN_BACKLIGHT, GpioActiveLevel::High)
            .validate(PIN_COUNT)
            .is_ok());
    }

    #[test]
    fn eight_bit_bus_needs_eight_pins() {
        let mut config = config_4bit();
        config.bus_width = BusWidth::EightBit;
        let error = config.validate(PIN_COUNT).unwrap_err();
        assert_eq!(
            error,
            LcdError::DataPinCount {
                bus_width: BusWidth::EightBit,
                expected: 8,
                actual: 4
            }
        );
        assert_eq!(error.kind(), LcdErrorKind::Configuration);
    }

    #[test]
    fn pins_outside_the_backend_are_rejected() {
        let config = config_4bit().with_backlight(40, GpioActiveLevel::High);
        assert_eq!(
            config.validate(PIN_COUNT),
            Err(LcdError::PinOutOfRange { pin: 40, count: PIN_COUNT })
        );
    }

    #[test]
    fn shared_pins_are_rejected() {
        let config = config_4bit().with_backlight(PIN_E, GpioActiveLevel::High);
        assert_eq!(config.validate(PIN_COUNT), Err(LcdError::DuplicatePin(PIN_E)));

        let mut config = config_8bit();
        config.data_pins[7] = PIN_RS;
        assert_eq!(config.validate(PIN_COUNT), Err(LcdError::DuplicatePin(PIN_RS)));
    }

    #[test]
    fn invalid_geometry_is_a_configuration_error() {
        let mut config = config_4bit();
        config.rows = 0;
        assert_eq!(
            config.validate(PIN_COUNT).unwrap_err().kind(),
            LcdErrorKind::Configuration
        );
    }

    #[test]
    fn from_config_claims_and_releases_every_pin() {
        let gpio = MockGpioDriver::new(PIN_COUNT);
        let config = config_4bit().with_backlight(PIN_BACKLIGHT, GpioActiveLevel::Low);
        let lcd = Lcd::from_config(&gpio, &config, gpio.delay()).unwrap();
        assert!(config.pins().all(|pin| gpio.is_claimed(pin)));
        assert!(lcd.has_backlight());
        assert!(!lcd.is_ready());

        drop(lcd);
        assert!(config.pins().all(|pin| !gpio.is_claimed(pin)));
    }

    #[test]
    fn unavailable_pin_is_a_configuration_error() {
        let gpio = MockGpioDriver::new(PIN_COUNT);
        let _held = gpio.get_output(PIN_BACKLIGHT, GpioActiveLevel::High).unwrap();
        let config = config_4bit().with_backlight(PIN_BACKLIGHT, GpioActiveLevel::High);

        let error = Lcd::from_config(&gpio, &config, gpio.delay()).unwrap_err();
        assert_eq!(
            error,
            LcdError::PinUnavailable {
                pins: vec![PIN_BACKLIGHT],
                source: GpioError::AlreadyInUse
            }
        );
        assert_eq!(error.kind(), LcdErrorKind::Configuration);
        // Nothing else stays claimed after the failure
        assert!(!gpio.is_claimed(PIN_RS));
        assert!(gpio.events().is_empty());
    }
}
