//! Frequency-shift-keyed link over a GPIO pair
//!
//! One pin toggles a square wave whose frequency selects a symbol; another
//! pin is sampled for rising edges, turned into a frequency estimate per
//! sampling window, and decoded back into framed payloads.

pub mod auth;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod error;
pub mod estimator;
pub mod hardware;
pub mod receiver;
pub mod sim;
pub mod table;
pub mod transmitter;

pub use auth::{AuthOutcome, Authenticator, DEFAULT_CREDENTIAL};
pub use codec::{bitstring_to_bytes, bytes_to_bitstring};
pub use config::{LinkConfig, LinkMode};
pub use decoder::{
    CharacterDecoder, DecoderState, FrameDecoder, FrameEvent, ReceivedFrame, SymbolDecoder,
};
pub use error::{LinkError, Result};
pub use estimator::{FrequencyEstimator, NO_SIGNAL};
pub use hardware::{Clock, EdgeCapture, SquareWave, SystemClock, WaveformId, WaveformOutput};
pub use receiver::{Receiver, ReceiverHandle};
pub use table::{FrequencyBand, FrequencyTable, Symbol};
pub use transmitter::TransmitSequencer;
