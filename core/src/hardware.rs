//! Capabilities the link needs from the board
//!
//! Backends own the peripheral connection and are handed to the transmitter
//! and receiver explicitly. The simulated medium in [`crate::sim`] implements
//! the same traits for tests.

use crate::error::Result;
use std::time::{Duration, Instant};

/// Handle to a waveform created on an output peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveformId(pub u32);

/// Square-wave generator driving the output pin
pub trait WaveformOutput: Send {
    /// Configure the output pin
    fn set_output_mode(&mut self, pin: u32) -> Result<()>;

    /// Build a repeating square wave at `frequency_hz` with the given high fraction
    fn create_waveform(&mut self, frequency_hz: f64, duty_cycle: f64) -> Result<WaveformId>;

    /// Start repeating a previously created waveform
    fn start(&mut self, id: WaveformId) -> Result<()>;

    /// Stop whatever waveform is currently being transmitted
    fn stop(&mut self) -> Result<()>;

    /// Free the resources held by a waveform
    fn release(&mut self, id: WaveformId) -> Result<()>;
}

/// Rising-edge timestamp capture on the input pin
pub trait EdgeCapture: Send {
    /// Configure the input pin
    fn set_input_mode(&mut self, pin: u32) -> Result<()>;

    /// Block for `window` and return the rising edges seen, in microseconds, oldest first
    fn capture_rising_edges(&mut self, window: Duration) -> Result<Vec<u64>>;
}

/// Monotonic time source shared by the transmit and receive paths
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by [`Instant`] and `thread::sleep`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Pulse timing for one period of a square wave
///
/// The period is truncated to whole microseconds, which is the resolution
/// of the wave peripherals this link targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareWave {
    pub high_us: u32,
    pub low_us: u32,
}

impl SquareWave {
    pub fn new(frequency_hz: f64, duty_cycle: f64) -> Self {
        let period_us = (1_000_000.0 / frequency_hz) as u32;
        let high_us = (period_us as f64 * duty_cycle) as u32;
        Self {
            high_us,
            low_us: period_us - high_us,
        }
    }

    pub fn period_us(&self) -> u32 {
        self.high_us + self.low_us
    }
}
