//! Blocking delays used to meet the timing requirements of attached peripherals.
//!
//! Delays go through [DelayNs] from `embedded-hal`, so any HAL delay can drive a display too.

pub use embedded_hal::delay::DelayNs;
use std::thread::sleep;
use std::time::Duration;

/// [DelayNs] backed by [std::thread::sleep].
///
/// The OS scheduler may oversleep, which is always fine for the displays driven here.
#[derive(Copy, Clone, Debug, Default)]
pub struct SleepDelay;

impl DelayNs for SleepDelay {
    fn delay_ns(&mut self, ns: u32) {
        sleep(Duration::from_nanos(ns.into()));
    }

    fn delay_us(&mut self, us: u32) {
        sleep(Duration::from_micros(us.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        sleep(Duration::from_millis(ms.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn sleep_delay_blocks_at_least_as_long_as_asked() {
        let mut delay = SleepDelay;
        let start = Instant::now();
        delay.delay_ms(2);
        delay.delay_us(500);
        assert!(start.elapsed() >= Duration::from_micros(2_500));
    }
}
