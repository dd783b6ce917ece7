//! Memory-mapped GPIO backend for the BCM283x family (Raspberry Pi).
//!
//! Pins are driven by writing directly to the `GPFSELn`, `GPSETn` and `GPCLRn` registers, which
//! makes pin writes cheap enough to bit-bang parallel buses.
use crate::{
    GpioActiveLevel, GpioBusOutput, GpioDriver, GpioError, GpioOutput, GpioResult, claim_pins,
    release_pins,
};
use bitvec::vec::BitVec;
use log::debug;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;

pub struct RawGpioDriver {
    mmap: MmapRaw,
    used_pins: BitVec<AtomicU8>,
}

impl RawGpioDriver {
    const GPIO_BASE: u32 = 0x3F200000;

    const PIN_COUNT: usize = 58;

    const FUNCTION_INPUT: u8 = 0b000;
    const FUNCTION_OUTPUT: u8 = 0b001;

    // Register offsets, in 32-bit words
    const GPSET0: usize = 0x1c / 4;
    const GPCLR0: usize = 0x28 / 4;

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
                .offset(offset)
                .len(4096)
                .map_raw(&file)?;

        debug!("Mapped GPIO registers from {}", path);

        Ok(RawGpioDriver {
            mmap,
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
        })
    }

    /// Maps the GPIO registers through `/dev/gpiomem`, which does not require root.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0)
    }

    /// Maps the GPIO registers through `/dev/mem`, which requires root.
    pub fn new_mem() -> GpioResult<Self> {
        Self::create("/dev/mem", Self::GPIO_BASE as u64)
    }

    fn check_index(pin_index: usize) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }

    pub fn raw_set_pin_function(&self, pin_index: usize, function: u8) -> GpioResult<()> {
        if function > 0b111 {
            return Err(GpioError::InvalidArgument);
        }
        Self::check_index(pin_index)?;

        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // GPFSELn register
        let register_ptr = unsafe { mmap.add(pin_index / 10) };
        let shift = (pin_index % 10) * 3;

        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b111 << shift); // Clear the bits for this pin
        register_value |= (function as u32) << shift;
        unsafe { register_ptr.write_volatile(register_value) };

        Ok(())
    }

    /// Sets and clears pins in a single register write per bank. Bit `n` of the masks is pin `n`.
    ///
    /// Pins in neither mask are left untouched.
    pub(crate) fn raw_write_masks(&self, set: u64, clear: u64) -> GpioResult<()> {
        let valid = (1u64 << Self::PIN_COUNT) - 1;
        if (set | clear) & !valid != 0 || set & clear != 0 {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        for bank in 0..2 {
            let set_bank = (set >> (32 * bank)) as u32;
            let clear_bank = (clear >> (32 * bank)) as u32;
            // GPSETn/GPCLRn registers ignore zero bits, so only the requested pins change
            if set_bank != 0 {
                unsafe { mmap.add(Self::GPSET0 + bank).write_volatile(set_bank) };
            }
            if clear_bank != 0 {
                unsafe { mmap.add(Self::GPCLR0 + bank).write_volatile(clear_bank) };
            }
        }

        Ok(())
    }

    fn claim(&self, pin_index: usize) -> GpioResult<()> {
        Self::check_index(pin_index)?;
        claim_pins(&self.used_pins, &[pin_index])
    }

    fn release(&self, pin_index: usize) {
        _ = self.raw_set_pin_function(pin_index, Self::FUNCTION_INPUT);
        release_pins(&self.used_pins, &[pin_index]);
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn get_output(
        &self,
        index: usize,
        active_level: GpioActiveLevel,
    ) -> GpioResult<Box<dyn GpioOutput + '_>> {
        self.claim(index)?;

        let output = RawGpioOutput {
            driver: self,
            pin_index: index,
            active_level,
        };
        // Start inactive before switching the pin to output, so it never glitches active
        output.write(false)?;
        self.raw_set_pin_function(index, Self::FUNCTION_OUTPUT)?;

        Ok(Box::new(output))
    }

    fn get_bus_output<const N: usize>(&self, indices: [usize; N]) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        if indices.iter().any(|&index| index >= Self::PIN_COUNT) {
            return Err(GpioError::InvalidArgument);
        }

        for (i, &index) in indices.iter().enumerate() {
            if indices[..i].contains(&index) {
                return Err(GpioError::InvalidArgument);
            }
        }

        claim_pins(&self.used_pins, &indices)?;

        let bus = RawGpioBusOutput {
            driver: self,
            pin_indices: indices,
        };
        bus.write(&[false; N])?;
        for &index in &indices {
            self.raw_set_pin_function(index, Self::FUNCTION_OUTPUT)?;
        }

        Ok(Box::new(bus))
    }
}

struct RawGpioOutput<'a> {
    driver: &'a RawGpioDriver,
    pin_index: usize,
    active_level: GpioActiveLevel,
}

impl Debug for RawGpioOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.pin_index)
    }
}

impl GpioOutput for RawGpioOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        let mask = 1u64 << self.pin_index;
        if self.active_level.get_state(value) {
            self.driver.raw_write_masks(mask, 0)
        } else {
            self.driver.raw_write_masks(0, mask)
        }
    }
}

impl Drop for RawGpioOutput<'_> {
    fn drop(&mut self) {
        self.driver.release(self.pin_index);
    }
}

struct RawGpioBusOutput<'a, const N: usize> {
    driver: &'a RawGpioDriver,
    pin_indices: [usize; N],
}

impl<const N: usize> Debug for RawGpioBusOutput<'_, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}{:?}[output]", self.driver, self.pin_indices)
    }
}

impl<const N: usize> GpioBusOutput<N> for RawGpioBusOutput<'_, N> {
    /// Updates all the bus pins at once.
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        let (set, clear) = self
            .pin_indices
            .iter()
            .zip(values)
            .fold((0u64, 0u64), |(set, clear), (&pin_index, &value)| {
                if value {
                    (set | 1 << pin_index, clear)
                } else {
                    (set, clear | 1 << pin_index)
                }
            });
        self.driver.raw_write_masks(set, clear)
    }
}

impl<const N: usize> Drop for RawGpioBusOutput<'_, N> {
    fn drop(&mut self) {
        for &pin_index in &self.pin_indices {
            self.driver.release(pin_index);
        }
    }
}
