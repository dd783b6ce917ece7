//! Software-composed GPIO buses, for backends that can only drive pins one by one.

use crate::{GpioBusOutput, GpioOutput, GpioResult};
use std::fmt::Debug;

/// An output bus made of `N` independent output pins, written in index order.
///
/// The pins are not updated atomically, which is fine for buses latched by a separate strobe
/// line (like the HD44780 data bus, latched by the E pin).
pub struct SoftGpioBusOutput<'a, const N: usize> {
    pins: [Box<dyn GpioOutput + 'a>; N],
}

impl <'a, const N: usize> SoftGpioBusOutput<'a, N> {
    pub fn new(pins: [Box<dyn GpioOutput + 'a>; N]) -> Self {
        Self { pins }
    }
}

impl <const N: usize> Debug for SoftGpioBusOutput<'_, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoftGpioBusOutput({:?})", self.pins)
    }
}

impl <const N: usize> GpioBusOutput<N> for SoftGpioBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (pin, &value) in self.pins.iter().zip(values) {
            pin.write(value)?;
        }

        Ok(())
    }
}
