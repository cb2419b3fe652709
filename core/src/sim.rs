//! In-process stand-in for the GPIO pair
//!
//! [`LoopbackLine`] records every tone it is asked to emit as a timed
//! segment; [`LoopbackCapture`] reads those segments back as the rising
//! edges an input pin wired to the output would have seen. With a
//! [`SimulatedClock`] the whole link runs on virtual time.

use crate::error::{LinkError, Result};
use crate::hardware::{Clock, EdgeCapture, SquareWave, WaveformId, WaveformOutput};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Virtual microsecond clock; `sleep` returns immediately after advancing time
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    now_us: Arc<AtomicU64>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.now_us.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// A tone that was on the line from `start` until `end`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSegment {
    pub frequency_hz: f64,
    pub wave: SquareWave,
    pub start: Duration,
    pub end: Duration,
}

impl ToneSegment {
    /// Rising edges of this tone inside `[from, to)`, in microseconds
    fn rising_edges(&self, from: u64, to: u64, out: &mut Vec<u64>) {
        let start = self.start.as_micros() as u64;
        let end = (self.end.as_micros() as u64).min(to);
        let period = self.wave.period_us() as u64;
        if period == 0 || end <= from.max(start) {
            return;
        }

        let mut t = if from > start {
            start + (from - start).div_ceil(period) * period
        } else {
            start
        };
        while t < end {
            out.push(t);
            t += period;
        }
    }
}

#[derive(Debug, Default)]
struct LineState {
    output_pin: Option<u32>,
    next_id: u32,
    waves: HashMap<WaveformId, (f64, SquareWave)>,
    active: Option<(f64, SquareWave, Duration)>,
    segments: Vec<ToneSegment>,
}

impl LineState {
    fn close_active(&mut self, now: Duration) {
        if let Some((frequency_hz, wave, start)) = self.active.take() {
            self.segments.push(ToneSegment {
                frequency_hz,
                wave,
                start,
                end: now,
            });
        }
    }
}

/// Output side of the simulated medium
///
/// Clones share the same recorded history.
#[derive(Clone)]
pub struct LoopbackLine {
    state: Arc<Mutex<LineState>>,
    clock: Arc<dyn Clock>,
}

impl LoopbackLine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LineState::default())),
            clock,
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, LineState>> {
        self.state
            .lock()
            .map_err(|_| LinkError::Device("loopback state poisoned".into()))
    }

    /// Completed tones, oldest first
    pub fn segments(&self) -> Vec<ToneSegment> {
        self.state().map(|s| s.segments.clone()).unwrap_or_default()
    }

    /// Waveforms created and not yet released
    pub fn live_waveforms(&self) -> usize {
        self.state().map(|s| s.waves.len()).unwrap_or_default()
    }

    pub fn is_transmitting(&self) -> bool {
        self.state().map(|s| s.active.is_some()).unwrap_or(false)
    }

    pub fn output_pin(&self) -> Option<u32> {
        self.state().ok().and_then(|s| s.output_pin)
    }

    /// Rising edges on the line inside `[from, to)`, including a tone still playing
    pub fn rising_edges(&self, from: Duration, to: Duration) -> Result<Vec<u64>> {
        let state = self.state()?;
        let now = self.clock.now();
        let (from_us, to_us) = (from.as_micros() as u64, to.as_micros() as u64);

        let mut edges = Vec::new();
        for segment in &state.segments {
            segment.rising_edges(from_us, to_us, &mut edges);
        }
        if let Some((frequency_hz, wave, start)) = state.active {
            let playing = ToneSegment {
                frequency_hz,
                wave,
                start,
                end: now,
            };
            playing.rising_edges(from_us, to_us, &mut edges);
        }
        edges.sort_unstable();
        Ok(edges)
    }
}

impl WaveformOutput for LoopbackLine {
    fn set_output_mode(&mut self, pin: u32) -> Result<()> {
        self.state()?.output_pin = Some(pin);
        Ok(())
    }

    fn create_waveform(&mut self, frequency_hz: f64, duty_cycle: f64) -> Result<WaveformId> {
        if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
            return Err(LinkError::Device(format!(
                "cannot build a waveform at {} Hz",
                frequency_hz
            )));
        }
        let mut state = self.state()?;
        let id = WaveformId(state.next_id);
        state.next_id += 1;
        state
            .waves
            .insert(id, (frequency_hz, SquareWave::new(frequency_hz, duty_cycle)));
        Ok(id)
    }

    fn start(&mut self, id: WaveformId) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state()?;
        let (frequency_hz, wave) = *state
            .waves
            .get(&id)
            .ok_or_else(|| LinkError::Device(format!("unknown waveform {}", id.0)))?;
        state.close_active(now);
        state.active = Some((frequency_hz, wave, now));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let now = self.clock.now();
        self.state()?.close_active(now);
        Ok(())
    }

    fn release(&mut self, id: WaveformId) -> Result<()> {
        self.state()?
            .waves
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| LinkError::Device(format!("unknown waveform {}", id.0)))
    }
}

/// Input side of the simulated medium, wired to a [`LoopbackLine`]
pub struct LoopbackCapture {
    line: LoopbackLine,
    clock: Arc<dyn Clock>,
    input_pin: Option<u32>,
}

impl LoopbackCapture {
    /// `clock` drives the capture windows; it may differ from the line's clock
    /// when replaying a recording made earlier
    pub fn new(line: LoopbackLine, clock: Arc<dyn Clock>) -> Self {
        Self {
            line,
            clock,
            input_pin: None,
        }
    }

    pub fn input_pin(&self) -> Option<u32> {
        self.input_pin
    }
}

impl EdgeCapture for LoopbackCapture {
    fn set_input_mode(&mut self, pin: u32) -> Result<()> {
        self.input_pin = Some(pin);
        Ok(())
    }

    fn capture_rising_edges(&mut self, window: Duration) -> Result<Vec<u64>> {
        let from = self.clock.now();
        self.clock.sleep(window);
        self.line.rising_edges(from, from + window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_clock() {
        let clock = SimulatedClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.sleep(Duration::from_millis(50));
        let other = clock.clone();
        other.advance(Duration::from_micros(7));
        assert_eq!(clock.now(), Duration::from_micros(50_007));
    }

    #[test]
    fn test_segment_recording() {
        let clock = SimulatedClock::new();
        let mut line = LoopbackLine::new(Arc::new(clock.clone()));
        let id = line.create_waveform(1000.0, 0.5).unwrap();
        clock.advance(Duration::from_millis(10));
        line.start(id).unwrap();
        assert!(line.is_transmitting());
        clock.advance(Duration::from_millis(5));
        line.stop().unwrap();
        line.release(id).unwrap();

        let segments = line.segments();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, Duration::from_millis(10));
        assert_eq!(segments[0].end, Duration::from_millis(15));
        assert_eq!(line.live_waveforms(), 0);
        assert!(line.release(id).is_err());
    }

    #[test]
    fn test_rising_edges_window() {
        let clock = SimulatedClock::new();
        let mut line = LoopbackLine::new(Arc::new(clock.clone()));
        let id = line.create_waveform(1000.0, 0.5).unwrap();
        line.start(id).unwrap();
        clock.advance(Duration::from_millis(10));
        line.stop().unwrap();

        // edges at 0, 1000, ..., 9000 us
        let all = line.rising_edges(Duration::ZERO, Duration::from_millis(20)).unwrap();
        assert_eq!(all.len(), 10);
        assert_eq!(all[9], 9000);

        let part = line
            .rising_edges(Duration::from_micros(2500), Duration::from_micros(5000))
            .unwrap();
        assert_eq!(part, vec![3000, 4000]);
    }

    #[test]
    fn test_capture_sees_playing_tone() {
        let clock = SimulatedClock::new();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let mut line = LoopbackLine::new(shared.clone());
        let mut capture = LoopbackCapture::new(line.clone(), shared);

        let id = line.create_waveform(500.0, 0.5).unwrap();
        line.start(id).unwrap();
        let edges = capture
            .capture_rising_edges(Duration::from_millis(10))
            .unwrap();
        assert_eq!(edges, vec![0, 2000, 4000, 6000, 8000]);
        assert_eq!(clock.now(), Duration::from_millis(10));
    }

    #[test]
    fn test_rejects_bad_waveforms() {
        let mut line = LoopbackLine::new(Arc::new(SimulatedClock::new()));
        assert!(line.create_waveform(0.0, 0.5).is_err());
        assert!(line.start(WaveformId(99)).is_err());
    }
}
