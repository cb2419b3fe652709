use crate::codec::bytes_to_bitstring;
use crate::config::{LinkConfig, LinkMode};
use crate::error::{LinkError, Result};
use crate::hardware::{Clock, WaveformOutput};
use crate::table::{FrequencyTable, Symbol};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Emits payloads as timed tone sequences on a shared output line
///
/// The line lock is held for a whole message, so concurrent callers are
/// serialised message by message and never interleave tones.
pub struct TransmitSequencer<W: WaveformOutput> {
    line: Arc<Mutex<W>>,
    clock: Arc<dyn Clock>,
    table: FrequencyTable,
    mode: LinkMode,
    bit_duration: Duration,
    duty_cycle: f64,
    cancel: Arc<AtomicBool>,
}

impl<W: WaveformOutput> TransmitSequencer<W> {
    pub fn new(line: Arc<Mutex<W>>, clock: Arc<dyn Clock>, config: &LinkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            line,
            clock,
            table: config.table()?,
            mode: config.mode,
            bit_duration: config.bit_duration,
            duty_cycle: config.duty_cycle,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Abort transmissions in progress once `cancel` is set
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn line(&self) -> &Arc<Mutex<W>> {
        &self.line
    }

    /// Send `payload` using the configured link mode
    pub fn send(&self, payload: &str) -> Result<()> {
        match self.mode {
            LinkMode::Binary => self.transmit(payload),
            LinkMode::Character => self.transmit_text(payload),
        }
    }

    /// Send `payload` as a framed bit sequence
    pub fn transmit(&self, payload: &str) -> Result<()> {
        info!("Transmitting message: {}", payload);
        self.transmit_bits(&bytes_to_bitstring(payload))
    }

    /// Send START, one tone per bit, then STOP
    ///
    /// Characters other than '0' and '1' are logged and skipped.
    pub fn transmit_bits(&self, bits: &str) -> Result<()> {
        let mut line = self.lock_line()?;

        self.emit(&mut line, Symbol::Start)?;
        for bit in bits.chars() {
            match bit {
                '1' => self.emit(&mut line, Symbol::One)?,
                '0' => self.emit(&mut line, Symbol::Zero)?,
                other => error!("[ERROR] Invalid bit: {}", other),
            }
        }
        self.emit(&mut line, Symbol::Stop)
    }

    /// Send one tone per character followed by the terminator
    ///
    /// Characters without a tone are logged and skipped.
    pub fn transmit_text(&self, text: &str) -> Result<()> {
        info!("Transmitting string: {}", text);
        let mut line = self.lock_line()?;

        for c in text.chars().chain(std::iter::once('\0')) {
            let symbol = Symbol::from_char(c);
            if self.table.symbol_to_frequency(symbol).is_none() {
                warn!("Unsupported character: {:?}", c);
                continue;
            }
            self.emit(&mut line, symbol)?;
        }
        Ok(())
    }

    /// Stop any waveform on the line, e.g. during shutdown
    pub fn halt(&self) -> Result<()> {
        self.lock_line()?.stop()
    }

    fn lock_line(&self) -> Result<MutexGuard<'_, W>> {
        self.line.lock().map_err(|_| LinkError::LinePoisoned)
    }

    /// One tone for `bit_duration`, then silence for `bit_duration`
    fn emit(&self, line: &mut W, symbol: Symbol) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(LinkError::Cancelled);
        }
        let frequency = self
            .table
            .symbol_to_frequency(symbol)
            .ok_or_else(|| match symbol {
                Symbol::Char(c) => LinkError::UnsupportedSymbol(c),
                _ => LinkError::InvalidConfig(format!("no frequency for {}", symbol)),
            })?;

        let id = line.create_waveform(frequency, self.duty_cycle)?;
        if let Err(e) = line.start(id) {
            let _ = line.release(id);
            return Err(e);
        }
        debug!("Sent {} as {} Hz", symbol, frequency);
        self.clock.sleep(self.bit_duration);

        let stopped = line.stop();
        let released = line.release(id);
        stopped?;
        released?;

        if self.cancel.load(Ordering::SeqCst) {
            return Err(LinkError::Cancelled);
        }
        self.clock.sleep(self.bit_duration);
        Ok(())
    }
}
