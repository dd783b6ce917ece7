use charlcd_gpio::GpioActiveLevel;
use charlcd_gpio::lcd::hd44780::LcdConfig;
use dotenv::var;
use serde::{Deserialize, Serialize};
use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;
use std::str::FromStr;

/// Which GPIO backend drives the display.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Registers through `/dev/gpiomem`.
    #[default]
    Gpiomem,
    /// Registers through `/dev/mem`. Needs root.
    Mem,
    /// The Linux GPIO character device.
    Gpiod,
    /// Records pin activity instead of driving hardware.
    Mock,
}

impl FromStr for Backend {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpiomem" => Ok(Backend::Gpiomem),
            "mem" => Ok(Backend::Mem),
            "gpiod" => Ok(Backend::Gpiod),
            "mock" => Ok(Backend::Mock),
            other => Err(eyre::eyre!("Unknown backend {:?}", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_chip")]
    pub chip: String,
    pub lcd: LcdConfig,
    /// How many times the clock line is refreshed before exiting. Runs forever if missing.
    #[serde(default)]
    pub updates: Option<u32>,
}

/// Refreshes run by the mock backend when no limit is configured.
pub const MOCK_UPDATES: u32 = 5;

fn default_chip() -> String {
    "/dev/gpiochip0".to_string()
}

pub fn parse_pin_bus(pin_str: &str) -> eyre::Result<Vec<usize>> {
    let pins = pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?;
    match pins.len() {
        4 | 8 => Ok(pins),
        n => Err(eyre::eyre!("Invalid number of data pins: {}", n)),
    }
}

fn parse_var<T>(name: &str) -> eyre::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Ok(value) => Ok(Some(value.trim().parse()?)),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Loads the JSON file named by `CONFIG_FILE` (`lcd.json` by default), if it exists.
    pub fn try_load() -> eyre::Result<Option<Self>> {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("lcd.json"));
        let config_path = Path::new(config_str);
        if config_path.exists() {
            let file = std::fs::File::open(config_path)?;
            let reader = std::io::BufReader::new(file);
            Ok(Some(serde_json::from_reader(reader)?))
        } else {
            Ok(None)
        }
    }

    /// Builds the config from `CHARLCD_*` environment variables.
    ///
    /// The data bus width follows the number of pins in `CHARLCD_PINS_DATA`.
    pub fn from_env() -> eyre::Result<Self> {
        let columns = parse_var("CHARLCD_COLUMNS")?.unwrap_or(16);
        let rows = parse_var("CHARLCD_ROWS")?.unwrap_or(2);
        let pin_rs: usize = var("CHARLCD_PIN_RS")?.trim().parse()?;
        let pin_e: usize = var("CHARLCD_PIN_E")?.trim().parse()?;
        let data_pins = parse_pin_bus(&var("CHARLCD_PINS_DATA")?)?;

        let mut lcd = match <[usize; 4]>::try_from(&data_pins[..]) {
            Ok(pins) => LcdConfig::new_4bit(columns, rows, pin_rs, pin_e, pins),
            Err(_) => {
                let pins: [usize; 8] = data_pins[..]
                    .try_into()
                    .map_err(|_| eyre::eyre!("Invalid number of data pins"))?;
                LcdConfig::new_8bit(columns, rows, pin_rs, pin_e, pins)
            }
        };

        if let Some(pin) = parse_var("CHARLCD_PIN_BACKLIGHT")? {
            let active_low = parse_var("CHARLCD_BACKLIGHT_ACTIVE_LOW")?.unwrap_or(false);
            let level = if active_low {
                GpioActiveLevel::Low
            } else {
                GpioActiveLevel::High
            };
            lcd = lcd.with_backlight(pin, level);
        }

        Ok(Config {
            backend: Backend::default(),
            chip: var("CHARLCD_CHIP").unwrap_or_else(|_| default_chip()),
            lcd,
            updates: parse_var("CHARLCD_UPDATES")?,
        })
    }

    /// Gets how many refreshes to run, or `None` to run forever.
    pub fn update_limit(&self) -> Option<u32> {
        match self.backend {
            Backend::Mock => Some(self.updates.unwrap_or(MOCK_UPDATES)),
            _ => self.updates,
        }
    }

    /// Loads the config file, or falls back to the environment.
    ///
    /// `CHARLCD_BACKEND` overrides the backend either way.
    pub fn load() -> eyre::Result<Self> {
        let mut config = match Self::try_load()? {
            Some(config) => config,
            None => Self::from_env()?,
        };
        if let Ok(backend) = var("CHARLCD_BACKEND") {
            config.backend = backend.parse()?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charlcd_gpio::lcd::hd44780::driver::BusWidth;

    #[test]
    fn pin_bus_accepts_mixed_separators() {
        assert_eq!(parse_pin_bus("26, 16;20 21").unwrap(), vec![26, 16, 20, 21]);
        assert_eq!(parse_pin_bus("0,1,2,3,4,5,6,7").unwrap().len(), 8);
        assert!(parse_pin_bus("1,2,3").is_err());
        assert!(parse_pin_bus("1,2,x,4").is_err());
    }

    #[test]
    fn backend_names() {
        assert_eq!("GPIOMEM".parse::<Backend>().unwrap(), Backend::Gpiomem);
        assert_eq!(" mock ".parse::<Backend>().unwrap(), Backend::Mock);
        assert!("spi".parse::<Backend>().is_err());
    }

    #[test]
    fn config_file_defaults() {
        let json = r#"{
            "lcd": {
                "columns": 20,
                "rows": 4,
                "bus_width": "four_bit",
                "pin_rs": 22,
                "pin_e": 17,
                "data_pins": [26, 16, 20, 21]
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.backend, Backend::Gpiomem);
        assert_eq!(config.chip, "/dev/gpiochip0");
        assert_eq!(config.updates, None);
        assert_eq!(config.lcd.bus_width, BusWidth::FourBit);
        assert_eq!(config.lcd.pin_backlight, None);
        assert!(config.lcd.validate(58).is_ok());
    }

    #[test]
    fn mock_backend_always_stops() {
        let mut config: Config = serde_json::from_str(
            r#"{"backend": "mock", "lcd": {"columns": 16, "rows": 2, "bus_width": "eight_bit",
                "pin_rs": 0, "pin_e": 1, "data_pins": [2, 3, 4, 5, 6, 7, 8, 9]}}"#,
        )
        .unwrap();
        assert_eq!(config.update_limit(), Some(MOCK_UPDATES));

        config.updates = Some(2);
        assert_eq!(config.update_limit(), Some(2));

        config.backend = Backend::Gpiomem;
        config.updates = None;
        assert_eq!(config.update_limit(), None);
    }
}
