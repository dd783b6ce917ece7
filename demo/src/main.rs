mod config;

use crate::config::{Backend, Config};
use charlcd_gpio::GpioDriver;
use charlcd_gpio::delay::{DelayNs, SleepDelay};
use charlcd_gpio::gpiod::GpiodDriver;
use charlcd_gpio::lcd::hd44780::validate::Glyph;
use charlcd_gpio::lcd::hd44780::Lcd;
use charlcd_gpio::mock::MockGpioDriver;
use charlcd_gpio::raw::RawGpioDriver;
use dotenv::dotenv;
use log::{debug, info};
use std::fmt::Debug;
use std::thread;
use std::time::Duration;
use sysinfo::System;
use time::OffsetDateTime;
use time::macros::format_description;

const UNKNOWN_STR: &str = "???";

const CLOCK_GLYPH: Glyph = [
    0b00000, 0b01110, 0b10101, 0b10111, 0b10001, 0b01110, 0b00000, 0b00000,
];

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("charlcd demo starting...");

    let config = Config::load()?;
    info!(
        "LCD {}x{} @ {:?} bus, RS: {}, E: {}, Data: {:?}, Backlight: {:?}",
        config.lcd.columns,
        config.lcd.rows,
        config.lcd.bus_width,
        config.lcd.pin_rs,
        config.lcd.pin_e,
        config.lcd.data_pins,
        config.lcd.pin_backlight
    );

    debug!("Initializing {:?} GPIO driver...", config.backend);
    match config.backend {
        Backend::Gpiomem => run(&RawGpioDriver::new_gpiomem()?, &config, SleepDelay),
        Backend::Mem => run(&RawGpioDriver::new_mem()?, &config, SleepDelay),
        Backend::Gpiod => run(&GpiodDriver::open(&config.chip)?, &config, SleepDelay),
        Backend::Mock => {
            let gpio = MockGpioDriver::new(64);
            run(&gpio, &config, gpio.delay())?;
            info!("Mock backend recorded {} events", gpio.events().len());
            Ok(())
        }
    }
}

fn run<G: GpioDriver, D: DelayNs + Debug>(gpio: &G, config: &Config, delay: D) -> eyre::Result<()> {
    debug!("{:?} initialized.", gpio);

    let mut lcd = Lcd::from_config(gpio, &config.lcd, delay)?;
    lcd.init()?;
    if lcd.has_backlight() {
        lcd.backlight_on_off(true)?;
    }
    lcd.create_char(0, &CLOCK_GLYPH)?;

    let host_name = System::host_name();
    lcd.write_line(host_name.as_deref().unwrap_or(UNKNOWN_STR), 0)?;

    info!("Display initialized.");

    let clock_row = lcd.geometry().rows() - 1;
    let format = format_description!("[hour]:[minute]:[second]");
    let limit = config.update_limit();
    let mut updates = 0u32;
    loop {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let line = format!("\u{0} {}", now.format(format)?);
        lcd.write_line(&line, clock_row)?;

        updates += 1;
        if limit.is_some_and(|limit| updates >= limit) {
            break;
        }
        thread::sleep(Duration::from_secs(1));
    }

    info!("Done after {} updates.", updates);
    Ok(())
}
