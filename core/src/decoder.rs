use crate::codec::bitstring_to_bytes;
use crate::error::{LinkError, Result};
use crate::estimator::NO_SIGNAL;
use crate::table::{FrequencyTable, Symbol};
use log::{debug, error, info, warn};
use std::time::Duration;

/// Payload recovered from one complete frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceivedFrame {
    /// Bits between a START and STOP marker, markers excluded
    Bits(String),
    /// Characters received before a terminator
    Text(String),
}

impl ReceivedFrame {
    /// Decode the frame into text; fails for bit frames whose length is not a multiple of 8
    pub fn message(&self) -> Result<String> {
        match self {
            ReceivedFrame::Bits(bits) => bitstring_to_bytes(bits),
            ReceivedFrame::Text(text) => Ok(text.clone()),
        }
    }

    /// True for a frame with no payload, e.g. back-to-back markers
    pub fn is_empty(&self) -> bool {
        match self {
            ReceivedFrame::Bits(bits) => bits.is_empty(),
            ReceivedFrame::Text(text) => text.is_empty(),
        }
    }
}

/// Outcome of a sampling cycle that ended a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Completed(ReceivedFrame),
    /// The frame in progress was abandoned after the decode timeout
    TimedOut,
}

/// Consumes one frequency estimate per sampling cycle
pub trait SymbolDecoder: Send {
    /// Feed an estimate taken at `now`; [`NO_SIGNAL`] samples are ignored
    fn feed(&mut self, frequency: f64, now: Duration) -> Option<FrameEvent>;

    /// True when no frame is in progress
    fn is_idle(&self) -> bool;

    /// Drop any frame in progress
    fn reset(&mut self);
}

impl<D: SymbolDecoder + ?Sized> SymbolDecoder for Box<D> {
    fn feed(&mut self, frequency: f64, now: Duration) -> Option<FrameEvent> {
        (**self).feed(frequency, now)
    }

    fn is_idle(&self) -> bool {
        (**self).is_idle()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Framing,
}

#[derive(Debug)]
struct DecodeSession {
    bits: String,
    started: Duration,
}

/// START / bits / STOP frame state machine for the binary link
#[derive(Debug)]
pub struct FrameDecoder {
    table: FrequencyTable,
    timeout: Duration,
    session: Option<DecodeSession>,
    unknown_count: usize,
}

impl FrameDecoder {
    /// `table` must map the START, STOP, '0' and '1' symbols
    pub fn new(table: FrequencyTable, timeout: Duration) -> Result<Self> {
        for symbol in [Symbol::Start, Symbol::Stop, Symbol::Zero, Symbol::One] {
            if table.symbol_to_frequency(symbol).is_none() {
                return Err(LinkError::InvalidConfig(format!(
                    "frame decoder table has no {} entry",
                    symbol
                )));
            }
        }
        Ok(Self {
            table,
            timeout,
            session: None,
            unknown_count: 0,
        })
    }

    pub fn state(&self) -> DecoderState {
        if self.session.is_some() {
            DecoderState::Framing
        } else {
            DecoderState::Idle
        }
    }

    /// Bits accumulated by the frame in progress
    pub fn pending_bits(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.bits.as_str())
    }

    /// Number of in-frame estimates that matched no symbol
    pub fn unknown_count(&self) -> usize {
        self.unknown_count
    }
}

impl SymbolDecoder for FrameDecoder {
    fn feed(&mut self, frequency: f64, now: Duration) -> Option<FrameEvent> {
        if let Some(session) = &self.session {
            if now.saturating_sub(session.started) > self.timeout {
                self.session = None;
                error!("[ERROR] Decoding timeout.");
                return Some(FrameEvent::TimedOut);
            }
        }

        if frequency <= NO_SIGNAL {
            return None;
        }

        let symbol = self.table.frequency_to_symbol(frequency);
        if symbol == Some(Symbol::Start) {
            if self.session.is_some() {
                debug!("START marker inside a frame, restarting");
            } else {
                debug!("START marker ({:.2} Hz)", frequency);
            }
            self.session = Some(DecodeSession {
                bits: String::new(),
                started: now,
            });
            return None;
        }

        let session = self.session.as_mut()?;
        match symbol {
            Some(Symbol::Stop) => {
                let bits = std::mem::take(&mut session.bits);
                self.session = None;
                debug!("STOP marker after {} bits", bits.len());
                Some(FrameEvent::Completed(ReceivedFrame::Bits(bits)))
            }
            Some(Symbol::One) => {
                session.bits.push('1');
                None
            }
            Some(Symbol::Zero) => {
                session.bits.push('0');
                None
            }
            _ => {
                self.unknown_count += 1;
                warn!("[WARNING] Unknown frequency: {:.2} Hz", frequency);
                None
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.session.is_none()
    }

    fn reset(&mut self) {
        self.session = None;
    }
}

/// Character-per-tone decoder: accumulates characters until the terminator tone
#[derive(Debug)]
pub struct CharacterDecoder {
    table: FrequencyTable,
    timeout: Duration,
    pending: Option<(String, Duration)>,
}

impl CharacterDecoder {
    /// `table` must map the terminator symbol
    pub fn new(table: FrequencyTable, timeout: Duration) -> Result<Self> {
        if table.symbol_to_frequency(Symbol::Terminator).is_none() {
            return Err(LinkError::InvalidConfig(
                "character decoder table has no terminator entry".into(),
            ));
        }
        Ok(Self {
            table,
            timeout,
            pending: None,
        })
    }

    /// Characters received so far for the message in progress
    pub fn pending_text(&self) -> Option<&str> {
        self.pending.as_ref().map(|(text, _)| text.as_str())
    }
}

impl SymbolDecoder for CharacterDecoder {
    fn feed(&mut self, frequency: f64, now: Duration) -> Option<FrameEvent> {
        if let Some((_, started)) = &self.pending {
            if now.saturating_sub(*started) > self.timeout {
                self.pending = None;
                error!("[ERROR] Decoding timeout.");
                return Some(FrameEvent::TimedOut);
            }
        }

        if frequency <= NO_SIGNAL {
            return None;
        }

        match self.table.frequency_to_symbol(frequency) {
            Some(Symbol::Terminator) => {
                // a lone terminator carries no message
                let (text, _) = self.pending.take()?;
                info!("Received string: {}", text);
                Some(FrameEvent::Completed(ReceivedFrame::Text(text)))
            }
            Some(Symbol::Char(c)) => {
                info!("Received '{}' (frequency: {:.2} Hz)", c, frequency);
                self.pending
                    .get_or_insert_with(|| (String::new(), now))
                    .0
                    .push(c);
                None
            }
            _ => {
                warn!("[WARNING] Unknown frequency: {:.2} Hz", frequency);
                None
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    fn reset(&mut self) {
        self.pending = None;
    }
}
