//! Recording GPIO backend.
//!
//! [MockGpioDriver] behaves like a real backend (pin claiming, range checks, active levels), but
//! instead of touching hardware it appends every pin write to an event log. [MockDelay] appends
//! to the same log, so the log is the exact, ordered timeline a peripheral would observe.
//!
//! Useful for tests and for running the demo on a machine without a display attached.

use crate::delay::DelayNs;
use crate::soft::SoftGpioBusOutput;
use crate::{
    GpioActiveLevel, GpioBusOutput, GpioDriver, GpioError, GpioOutput, GpioResult, claim_pins,
    release_pins,
};
use bitvec::vec::BitVec;
use log::trace;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::sync::atomic::AtomicU8;

/// A single recorded event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MockEvent {
    /// A pin was driven to the given physical level.
    Write { pin: usize, level: bool },
    /// A delay of the given amount of microseconds was requested.
    Delay { us: u32 },
}

/// A value latched by a peripheral on a falling edge of its strobe pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MockLatch {
    /// Level of the register select pin at the time of the edge.
    pub rs: bool,
    /// Levels of the data pins at the time of the edge, LSb first.
    pub value: u8,
}

type EventLog = Rc<RefCell<Vec<MockEvent>>>;

pub struct MockGpioDriver {
    count: usize,
    used_pins: BitVec<AtomicU8>,
    failing_pin: Cell<Option<usize>>,
    log: EventLog,
}

impl MockGpioDriver {
    /// Creates a mock backend with `count` pins, all initially low and unclaimed.
    pub fn new(count: usize) -> Self {
        Self {
            count,
            used_pins: BitVec::repeat(false, count),
            failing_pin: Cell::new(None),
            log: EventLog::default(),
        }
    }

    /// Creates a [MockDelay] recording into this backend's event log.
    pub fn delay(&self) -> MockDelay {
        MockDelay {
            log: Rc::clone(&self.log),
        }
    }

    /// Makes every following write to `pin` fail, or none if `None`.
    pub fn fail_writes_on(&self, pin: Option<usize>) {
        self.failing_pin.set(pin);
    }

    /// Checks whether the pin is currently claimed.
    pub fn is_claimed(&self, pin: usize) -> bool {
        self.used_pins.get(pin).is_some_and(|bit| *bit)
    }

    /// Gets a copy of every event recorded so far.
    pub fn events(&self) -> Vec<MockEvent> {
        self.log.borrow().clone()
    }

    /// Forgets every event recorded so far.
    pub fn clear_events(&self) {
        self.log.borrow_mut().clear();
    }

    /// Gets the last level written to the pin, or `None` if it was never written.
    pub fn level(&self, pin: usize) -> Option<bool> {
        self.log.borrow().iter().rev().find_map(|event| match *event {
            MockEvent::Write { pin: p, level } if p == pin => Some(level),
            _ => None,
        })
    }

    /// Counts the rising edges of the pin.
    pub fn rising_edges(&self, pin: usize) -> usize {
        let mut level = false;
        let mut edges = 0;
        for event in self.log.borrow().iter() {
            if let MockEvent::Write { pin: p, level: new } = *event {
                if p == pin {
                    if new && !level {
                        edges += 1;
                    }
                    level = new;
                }
            }
        }
        edges
    }

    /// Replays the log and collects what a bus peripheral strobed by `strobe` would latch.
    ///
    /// On each falling edge of `strobe`, the current levels of `select` and `data` (LSb first)
    /// are recorded.
    pub fn latches(&self, strobe: usize, select: usize, data: &[usize]) -> Vec<MockLatch> {
        let mut levels = vec![false; self.count];
        let mut latches = Vec::new();
        for event in self.log.borrow().iter() {
            let MockEvent::Write { pin, level } = *event else {
                continue;
            };
            if pin == strobe && levels[pin] && !level {
                let value = data
                    .iter()
                    .enumerate()
                    .filter(|&(_, &data_pin)| levels[data_pin])
                    .fold(0u8, |value, (bit, _)| value | (1 << bit));
                latches.push(MockLatch {
                    rs: levels[select],
                    value,
                });
            }
            levels[pin] = level;
        }
        latches
    }

    fn release(&self, index: usize) {
        release_pins(&self.used_pins, &[index]);
    }
}

impl Debug for MockGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockGpioDriver({})", self.count)
    }
}

impl GpioDriver for MockGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.count)
    }

    fn get_output(
        &self,
        index: usize,
        active_level: GpioActiveLevel,
    ) -> GpioResult<Box<dyn GpioOutput + '_>> {
        if index >= self.count {
            return Err(GpioError::InvalidArgument);
        }

        claim_pins(&self.used_pins, &[index])?;

        Ok(Box::new(MockOutput {
            driver: self,
            pin_index: index,
            active_level,
        }))
    }

    fn get_bus_output<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        let mut pins = Vec::with_capacity(N);
        for index in indices {
            pins.push(self.get_output(index, GpioActiveLevel::High)?);
        }
        let pins: [Box<dyn GpioOutput + '_>; N] = pins
            .try_into()
            .map_err(|_| GpioError::InvalidArgument)?;
        Ok(Box::new(SoftGpioBusOutput::new(pins)))
    }
}

struct MockOutput<'a> {
    driver: &'a MockGpioDriver,
    pin_index: usize,
    active_level: GpioActiveLevel,
}

impl Debug for MockOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.pin_index)
    }
}

impl GpioOutput for MockOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        if self.driver.failing_pin.get() == Some(self.pin_index) {
            return Err(GpioError::Other(format!("injected failure on pin {}", self.pin_index)));
        }

        let level = self.active_level.get_state(value);
        trace!("Mock pin {} <- {}", self.pin_index, level);
        self.driver.log.borrow_mut().push(MockEvent::Write {
            pin: self.pin_index,
            level,
        });
        Ok(())
    }
}

impl Drop for MockOutput<'_> {
    fn drop(&mut self) {
        self.driver.release(self.pin_index);
    }
}

/// A [DelayNs] that returns immediately and records the requested duration.
///
/// Every request is recorded as one event, in microseconds. Nanosecond requests round up.
#[derive(Clone, Debug)]
pub struct MockDelay {
    log: EventLog,
}

impl MockDelay {
    fn record(&self, us: u32) {
        self.log.borrow_mut().push(MockEvent::Delay { us });
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.record(ns.div_ceil(1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.record(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.record(ms.saturating_mul(1000));
    }
}
