pub mod delay;
pub mod gpiod;
pub mod lcd;
pub mod mock;
pub mod raw;
pub mod soft;

use bitvec::vec::BitVec;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU8, Ordering};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Marks the pins as used in a backend's claim bitmap.
///
/// Each pin is tested and set in one atomic operation, so concurrent claims of the same pin
/// have exactly one winner. If any pin is already taken, the pins claimed so far are released.
/// Indices must be in range.
pub(crate) fn claim_pins(used_pins: &BitVec<AtomicU8>, indices: &[usize]) -> GpioResult<()> {
    let words = used_pins.as_raw_slice();
    for (i, &index) in indices.iter().enumerate() {
        let mask = 1u8 << (index % 8);
        if words[index / 8].fetch_or(mask, Ordering::AcqRel) & mask != 0 {
            release_pins(used_pins, &indices[..i]);
            return Err(GpioError::AlreadyInUse);
        }
    }
    Ok(())
}

pub(crate) fn release_pins(used_pins: &BitVec<AtomicU8>, indices: &[usize]) {
    for &index in indices {
        used_pins.set_aliased(index, false);
    }
}

/// A GPIO backend that hands out claimed output lines.
///
/// A pin stays claimed for as long as the returned output lives, so asking for the same pin
/// twice fails with [GpioError::AlreadyInUse] until the first claim is dropped.
pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the GPIO pin at the given index and configures it as an output.
    fn get_output(
        &self,
        index: usize,
        active_level: GpioActiveLevel,
    ) -> GpioResult<Box<dyn GpioOutput + '_>>;

    /// Claims the GPIO pins at the given indices as a single output bus.
    ///
    /// Index `0` of the bus is the least significant bit.
    fn get_bus_output<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>>;
}

/// Specifies the active level of the GPIO pin.
///
/// By default, the active level is high.
///
/// Might be software-implemented.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

impl GpioActiveLevel {
    /// Gets the real state that will be outputted on the GPIO pin based on the active level and the value.
    pub fn get_state(&self, value: bool) -> bool {
        match self {
            GpioActiveLevel::High => value,
            GpioActiveLevel::Low => !value,
        }
    }
}

pub trait GpioOutput: Debug {
    /// Writes the state of the GPIO pin.
    fn write(&self, value: bool) -> GpioResult<()>;
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl dyn GpioBusOutput<8> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a byte, LSb first.
    pub fn write_byte(&self, value: u8) -> GpioResult<()> {
        let mut values = [false; 8];
        for (i, bit) in values.iter_mut().enumerate() {
            *bit = (value & (1 << i)) != 0;
        }
        self.write(&values)
    }
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a nibble, LSb first.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        if value > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }

        let mut values = [false; 4];
        for (i, bit) in values.iter_mut().enumerate() {
            *bit = (value & (1 << i)) != 0;
        }
        self.write(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockEvent, MockGpioDriver};

    #[test]
    fn write_byte_is_lsb_first() {
        let gpio = MockGpioDriver::new(16);
        let bus = gpio.get_bus_output([0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        bus.write_byte(0b1000_0001).unwrap();

        let levels: Vec<(usize, bool)> = gpio
            .events()
            .into_iter()
            .filter_map(|event| match event {
                MockEvent::Write { pin, level } => Some((pin, level)),
                _ => None,
            })
            .collect();
        assert_eq!(
            levels,
            vec![
                (0, true),
                (1, false),
                (2, false),
                (3, false),
                (4, false),
                (5, false),
                (6, false),
                (7, true),
            ]
        );
    }

    #[test]
    fn write_nibble_rejects_wide_values() {
        let gpio = MockGpioDriver::new(4);
        let bus = gpio.get_bus_output([0, 1, 2, 3]).unwrap();
        assert_eq!(bus.write_nibble(0x10), Err(GpioError::InvalidArgument));
        assert!(gpio.events().is_empty());
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        for _ in 0..100 {
            let used_pins: BitVec<AtomicU8> = BitVec::repeat(false, 16);
            let winners = std::sync::atomic::AtomicUsize::new(0);
            std::thread::scope(|s| {
                for _ in 0..8 {
                    s.spawn(|| {
                        if claim_pins(&used_pins, &[11]).is_ok() {
                            winners.fetch_add(1, Ordering::Relaxed);
                        }
                    });
                }
            });
            assert_eq!(winners.into_inner(), 1);
            assert!(used_pins[11]);
        }
    }

    #[test]
    fn failed_claim_rolls_back() {
        let used_pins: BitVec<AtomicU8> = BitVec::repeat(false, 16);
        claim_pins(&used_pins, &[9]).unwrap();
        assert_eq!(
            claim_pins(&used_pins, &[3, 8, 9, 10]),
            Err(GpioError::AlreadyInUse)
        );
        assert_eq!(used_pins.count_ones(), 1);
        assert!(used_pins[9]);

        // A bus naming the same pin twice collides with itself
        assert_eq!(claim_pins(&used_pins, &[4, 4]), Err(GpioError::AlreadyInUse));
        assert_eq!(used_pins.count_ones(), 1);

        release_pins(&used_pins, &[9]);
        assert!(claim_pins(&used_pins, &[3, 8, 9, 10]).is_ok());
        assert_eq!(used_pins.count_ones(), 4);
    }

    #[test]
    fn active_low_inverts_state() {
        assert!(GpioActiveLevel::Low.get_state(false));
        assert!(!GpioActiveLevel::Low.get_state(true));
        assert!(GpioActiveLevel::High.get_state(true));
    }
}
