use crate::config::LinkConfig;
use crate::decoder::{FrameEvent, SymbolDecoder};
use crate::error::{LinkError, Result};
use crate::estimator::FrequencyEstimator;
use crate::hardware::{Clock, EdgeCapture};
use crossbeam_channel::{unbounded, Sender};
use log::{error, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Continuous receive loop: capture a window, estimate, feed the decoder
pub struct Receiver<C: EdgeCapture, D: SymbolDecoder> {
    capture: C,
    clock: Arc<dyn Clock>,
    estimator: FrequencyEstimator,
    decoder: D,
    window: Duration,
}

impl<C: EdgeCapture> Receiver<C, Box<dyn SymbolDecoder>> {
    /// Receiver with the estimator, decoder and window implied by `config`
    pub fn from_config(mut capture: C, clock: Arc<dyn Clock>, config: &LinkConfig) -> Result<Self> {
        config.validate()?;
        capture.set_input_mode(config.input_pin)?;
        Ok(Self::new(
            capture,
            clock,
            config.estimator()?,
            config.decoder()?,
            config.sampling_window(),
        ))
    }
}

impl<C: EdgeCapture, D: SymbolDecoder> Receiver<C, D> {
    pub fn new(
        capture: C,
        clock: Arc<dyn Clock>,
        estimator: FrequencyEstimator,
        decoder: D,
        window: Duration,
    ) -> Self {
        Self {
            capture,
            clock,
            estimator,
            decoder,
            window,
        }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run one sampling cycle; blocks for the sampling window
    pub fn poll(&mut self) -> Result<Option<FrameEvent>> {
        let edges = self.capture.capture_rising_edges(self.window)?;
        let frequency = self.estimator.estimate(&edges);
        trace!("{} edges -> {:.2} Hz", edges.len(), frequency);
        Ok(self.decoder.feed(frequency, self.clock.now()))
    }

    /// Poll until `shutdown` is set or the event consumer goes away
    ///
    /// A partial frame is dropped on exit.
    pub fn run(&mut self, shutdown: &AtomicBool, events: &Sender<FrameEvent>) -> Result<()> {
        info!("Receiver started. Waiting for signals...");
        let result = loop {
            if shutdown.load(Ordering::SeqCst) {
                break Ok(());
            }
            match self.poll() {
                Ok(Some(event)) => {
                    if events.send(event).is_err() {
                        break Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Edge capture failed: {}", e);
                    break Err(e);
                }
            }
        };
        self.decoder.reset();
        info!("Receiver stopped");
        result
    }
}

impl<C, D> Receiver<C, D>
where
    C: EdgeCapture + 'static,
    D: SymbolDecoder + 'static,
{
    /// Move the loop onto its own thread; frame events arrive on the returned channel
    pub fn spawn(mut self, shutdown: Arc<AtomicBool>) -> Result<ReceiverHandle> {
        let (tx, rx) = unbounded();
        let thread = std::thread::Builder::new()
            .name("fsk-receiver".into())
            .spawn(move || self.run(&shutdown, &tx))?;
        Ok(ReceiverHandle { events: rx, thread })
    }
}

/// Background receive loop started by [`Receiver::spawn`]
pub struct ReceiverHandle {
    pub events: crossbeam_channel::Receiver<FrameEvent>,
    thread: JoinHandle<Result<()>>,
}

impl ReceiverHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop to exit; set the shutdown flag first
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| LinkError::Device("receiver thread panicked".into()))?
    }
}
