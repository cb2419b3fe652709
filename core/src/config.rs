use crate::decoder::{CharacterDecoder, FrameDecoder, SymbolDecoder};
use crate::error::{LinkError, Result};
use crate::estimator::FrequencyEstimator;
use crate::table::{FrequencyTable, BINARY_TOLERANCE_HZ, CHARACTER_TOLERANCE_HZ};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How payloads are put on the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    /// START marker, one tone per bit, STOP marker
    #[default]
    Binary,
    /// One tone per character, followed by the terminator tone
    Character,
}

impl FromStr for LinkMode {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bin" => Ok(LinkMode::Binary),
            "character" | "char" => Ok(LinkMode::Character),
            other => Err(LinkError::InvalidConfig(format!("unknown link mode {:?}", other))),
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkMode::Binary => write!(f, "binary"),
            LinkMode::Character => write!(f, "character"),
        }
    }
}

/// Link parameters shared by both ends
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub mode: LinkMode,
    /// GPIO driven by the transmitter
    pub output_pin: u32,
    /// GPIO sampled by the receiver
    pub input_pin: u32,
    /// Tone length; every tone is followed by a gap of the same length
    pub bit_duration: Duration,
    /// Matching tolerance in Hz; `None` picks the mode's default
    pub tolerance_hz: Option<f64>,
    /// A frame still open after this long is abandoned
    pub decode_timeout: Duration,
    /// Margin around the table's frequency range accepted by the estimator
    pub band_guard_hz: f64,
    /// High fraction of each square-wave period
    pub duty_cycle: f64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            mode: LinkMode::Binary,
            output_pin: 4,
            input_pin: 17,
            bit_duration: Duration::from_millis(50),
            tolerance_hz: None,
            decode_timeout: Duration::from_secs(5),
            band_guard_hz: 100.0,
            duty_cycle: 0.5,
        }
    }
}

impl LinkConfig {
    pub fn tolerance(&self) -> f64 {
        self.tolerance_hz.unwrap_or(match self.mode {
            LinkMode::Binary => BINARY_TOLERANCE_HZ,
            LinkMode::Character => CHARACTER_TOLERANCE_HZ,
        })
    }

    /// Length of one receive sampling window (one tone plus one gap)
    pub fn sampling_window(&self) -> Duration {
        self.bit_duration * 2
    }

    pub fn table(&self) -> Result<FrequencyTable> {
        match self.mode {
            LinkMode::Binary => FrequencyTable::binary(self.tolerance()),
            LinkMode::Character => FrequencyTable::character(self.tolerance()),
        }
    }

    /// Estimator gated to the active table's band
    pub fn estimator(&self) -> Result<FrequencyEstimator> {
        Ok(FrequencyEstimator::with_band(
            self.table()?.band(self.band_guard_hz),
        ))
    }

    /// Decoder matching the link mode
    pub fn decoder(&self) -> Result<Box<dyn SymbolDecoder>> {
        let table = self.table()?;
        Ok(match self.mode {
            LinkMode::Binary => Box::new(FrameDecoder::new(table, self.decode_timeout)?),
            LinkMode::Character => Box::new(CharacterDecoder::new(table, self.decode_timeout)?),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.bit_duration.is_zero() {
            return Err(LinkError::InvalidConfig("bit duration must be non-zero".into()));
        }
        if self.decode_timeout.is_zero() {
            return Err(LinkError::InvalidConfig("decode timeout must be non-zero".into()));
        }
        if !(self.duty_cycle > 0.0 && self.duty_cycle < 1.0) {
            return Err(LinkError::InvalidConfig(format!(
                "duty cycle must be between 0 and 1, got {}",
                self.duty_cycle
            )));
        }
        if !(self.band_guard_hz.is_finite() && self.band_guard_hz >= 0.0) {
            return Err(LinkError::InvalidConfig(format!(
                "band guard must be non-negative, got {}",
                self.band_guard_hz
            )));
        }
        if self.output_pin == self.input_pin {
            return Err(LinkError::InvalidConfig(format!(
                "output and input share GPIO {}",
                self.output_pin
            )));
        }
        self.table().map(|_| ())
    }
}
