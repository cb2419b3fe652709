use crate::pigpio::DEFAULT_ADDR;
use crate::{CliError, LinkArgs};
use gpiofsk_core::{LinkConfig, LinkMode, DEFAULT_CREDENTIAL};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Optional JSON configuration file; every field may be omitted
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub mode: Option<String>,
    pub output_pin: Option<u32>,
    pub input_pin: Option<u32>,
    pub bit_ms: Option<u64>,
    pub tolerance_hz: Option<f64>,
    pub decode_timeout_ms: Option<u64>,
    pub band_guard_hz: Option<f64>,
    pub duty_cycle: Option<f64>,
    pub credential: Option<String>,
    pub pigpio: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| CliError::Config {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Everything a subcommand needs, after defaults, file and flags are layered
#[derive(Debug, Clone)]
pub struct Settings {
    pub link: LinkConfig,
    pub credential: String,
    pub pigpio_addr: String,
}

impl Settings {
    pub fn resolve(args: &LinkArgs) -> Result<Self, CliError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::layer(&file, args)
    }

    fn layer(file: &FileConfig, args: &LinkArgs) -> Result<Self, CliError> {
        let mut link = LinkConfig::default();

        if let Some(mode) = &file.mode {
            link.mode = mode.parse::<LinkMode>()?;
        }
        if let Some(pin) = file.output_pin {
            link.output_pin = pin;
        }
        if let Some(pin) = file.input_pin {
            link.input_pin = pin;
        }
        if let Some(ms) = file.bit_ms {
            link.bit_duration = Duration::from_millis(ms);
        }
        if let Some(tolerance) = file.tolerance_hz {
            link.tolerance_hz = Some(tolerance);
        }
        if let Some(ms) = file.decode_timeout_ms {
            link.decode_timeout = Duration::from_millis(ms);
        }
        if let Some(guard) = file.band_guard_hz {
            link.band_guard_hz = guard;
        }
        if let Some(duty) = file.duty_cycle {
            link.duty_cycle = duty;
        }

        if let Some(mode) = args.mode {
            link.mode = mode;
        }
        if let Some(pin) = args.output_pin {
            link.output_pin = pin;
        }
        if let Some(pin) = args.input_pin {
            link.input_pin = pin;
        }
        if let Some(ms) = args.bit_ms {
            link.bit_duration = Duration::from_millis(ms);
        }
        if let Some(tolerance) = args.tolerance {
            link.tolerance_hz = Some(tolerance);
        }

        link.validate()?;

        Ok(Self {
            link,
            credential: args
                .credential
                .clone()
                .or_else(|| file.credential.clone())
                .unwrap_or_else(|| DEFAULT_CREDENTIAL.to_string()),
            pigpio_addr: args
                .pigpio
                .clone()
                .or_else(|| file.pigpio.clone())
                .unwrap_or_else(|| DEFAULT_ADDR.to_string()),
        })
    }
}
