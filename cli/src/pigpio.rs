//! Client for the pigpio daemon socket interface
//!
//! Every command is four little-endian `u32` words (`cmd, p1, p2, p3`),
//! optionally followed by `p3` bytes of extension data. The daemon answers
//! with the same four words, the last one replaced by a signed result.
//! Edge timestamps come from an in-band notification stream of 12-byte
//! reports (`seqno: u16, flags: u16, tick: u32, level: u32`).

use gpiofsk_core::{EdgeCapture, LinkError, Result, SquareWave, WaveformId, WaveformOutput};
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

pub const DEFAULT_ADDR: &str = "127.0.0.1:8888";

const CMD_MODES: u32 = 0;
const CMD_NB: u32 = 19;
const CMD_NC: u32 = 21;
const CMD_WVAG: u32 = 28;
const CMD_WVHLT: u32 = 33;
const CMD_WVCRE: u32 = 49;
const CMD_WVDEL: u32 = 50;
const CMD_WVTXR: u32 = 52;
const CMD_NOIB: u32 = 99;

const MODE_INPUT: u32 = 0;
const MODE_OUTPUT: u32 = 1;

const REPORT_LEN: usize = 12;
const NTFY_FLAGS_WDOG: u16 = 1 << 5;
const NTFY_FLAGS_ALIVE: u16 = 1 << 6;
const NTFY_FLAGS_EVENT: u16 = 1 << 7;

struct Connection {
    stream: TcpStream,
}

impl Connection {
    fn open(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|e| {
            LinkError::Device(format!("cannot reach pigpio daemon at {}: {}", addr, e))
        })?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    fn command(&mut self, cmd: u32, p1: u32, p2: u32) -> Result<u32> {
        self.command_ext(cmd, p1, p2, &[])
    }

    fn command_ext(&mut self, cmd: u32, p1: u32, p2: u32, ext: &[u8]) -> Result<u32> {
        let mut request = Vec::with_capacity(16 + ext.len());
        for word in [cmd, p1, p2, ext.len() as u32] {
            request.extend_from_slice(&word.to_le_bytes());
        }
        request.extend_from_slice(ext);
        self.stream.write_all(&request)?;

        let mut response = [0u8; 16];
        self.stream.read_exact(&mut response)?;
        let res = i32::from_le_bytes([response[12], response[13], response[14], response[15]]);
        if res < 0 {
            return Err(LinkError::Device(format!(
                "pigpio command {} failed with error {}",
                cmd, res
            )));
        }
        Ok(res as u32)
    }
}

/// Square-wave output through the daemon's waveform engine
pub struct PigpioOutput {
    conn: Connection,
    pin: Option<u32>,
}

impl PigpioOutput {
    pub fn connect(addr: &str) -> Result<Self> {
        Ok(Self {
            conn: Connection::open(addr)?,
            pin: None,
        })
    }
}

impl WaveformOutput for PigpioOutput {
    fn set_output_mode(&mut self, pin: u32) -> Result<()> {
        self.conn.command(CMD_MODES, pin, MODE_OUTPUT)?;
        self.pin = Some(pin);
        Ok(())
    }

    fn create_waveform(&mut self, frequency_hz: f64, duty_cycle: f64) -> Result<WaveformId> {
        let pin = self
            .pin
            .ok_or_else(|| LinkError::InvalidConfig("output pin not configured".into()))?;
        let wave = SquareWave::new(frequency_hz, duty_cycle);
        let mask = 1u32 << pin;

        // (gpio_on, gpio_off, delay_us) per pulse
        let mut pulses = Vec::with_capacity(6 * 4);
        for word in [mask, 0, wave.high_us, 0, mask, wave.low_us] {
            pulses.extend_from_slice(&word.to_le_bytes());
        }
        self.conn.command_ext(CMD_WVAG, 0, 0, &pulses)?;
        let id = self.conn.command(CMD_WVCRE, 0, 0)?;
        Ok(WaveformId(id))
    }

    fn start(&mut self, id: WaveformId) -> Result<()> {
        self.conn.command(CMD_WVTXR, id.0, 0).map(|_| ())
    }

    fn stop(&mut self) -> Result<()> {
        self.conn.command(CMD_WVHLT, 0, 0).map(|_| ())
    }

    fn release(&mut self, id: WaveformId) -> Result<()> {
        self.conn.command(CMD_WVDEL, id.0, 0).map(|_| ())
    }
}

impl Drop for PigpioOutput {
    fn drop(&mut self) {
        let _ = self.conn.command(CMD_WVHLT, 0, 0);
    }
}

/// Rising-edge capture from the daemon's notification stream
pub struct PigpioCapture {
    control: Connection,
    notify: TcpStream,
    handle: u32,
    pin: Option<u32>,
    pending: Vec<u8>,
    last_level: Option<bool>,
    last_tick: Option<u32>,
    elapsed_us: u64,
}

impl PigpioCapture {
    pub fn connect(addr: &str) -> Result<Self> {
        let control = Connection::open(addr)?;
        let mut notify = Connection::open(addr)?;
        let handle = notify.command(CMD_NOIB, 0, 0)?;
        Ok(Self {
            control,
            notify: notify.stream,
            handle,
            pin: None,
            pending: Vec::new(),
            last_level: None,
            last_tick: None,
            elapsed_us: 0,
        })
    }

    /// Widen the daemon's wrapping 32-bit tick into a monotonic microsecond count
    fn unwrap_tick(&mut self, tick: u32) -> u64 {
        match self.last_tick {
            Some(prev) => self.elapsed_us += tick.wrapping_sub(prev) as u64,
            None => self.elapsed_us = tick as u64,
        }
        self.last_tick = Some(tick);
        self.elapsed_us
    }

    /// Consume complete reports from `pending`, appending rising edges to `edges`
    fn parse_reports(&mut self, pin: u32, mut edges: Option<&mut Vec<u64>>) {
        let complete = self.pending.len() - self.pending.len() % REPORT_LEN;
        let reports: Vec<u8> = self.pending.drain(..complete).collect();

        for report in reports.chunks_exact(REPORT_LEN) {
            let flags = u16::from_le_bytes([report[2], report[3]]);
            if flags & (NTFY_FLAGS_WDOG | NTFY_FLAGS_ALIVE | NTFY_FLAGS_EVENT) != 0 {
                continue;
            }
            let tick = u32::from_le_bytes([report[4], report[5], report[6], report[7]]);
            let level = u32::from_le_bytes([report[8], report[9], report[10], report[11]]);

            let high = level & (1 << pin) != 0;
            let timestamp = self.unwrap_tick(tick);
            if high && self.last_level == Some(false) {
                if let Some(edges) = edges.as_deref_mut() {
                    edges.push(timestamp);
                }
            }
            self.last_level = Some(high);
        }
    }

    fn read_chunk(&mut self) -> std::io::Result<usize> {
        let mut buf = [0u8; 1024];
        let n = self.notify.read(&mut buf)?;
        if n == 0 {
            return Err(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "pigpio notification stream closed",
            ));
        }
        self.pending.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    /// Discard reports queued before the window opens
    fn drain_backlog(&mut self, pin: u32) -> Result<()> {
        self.notify.set_nonblocking(true)?;
        let drained = loop {
            match self.read_chunk() {
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.notify.set_nonblocking(false)?;
        drained?;
        self.parse_reports(pin, None);
        Ok(())
    }
}

impl EdgeCapture for PigpioCapture {
    fn set_input_mode(&mut self, pin: u32) -> Result<()> {
        self.control.command(CMD_MODES, pin, MODE_INPUT)?;
        self.control.command(CMD_NB, self.handle, 1 << pin)?;
        self.pin = Some(pin);
        Ok(())
    }

    fn capture_rising_edges(&mut self, window: Duration) -> Result<Vec<u64>> {
        let pin = self
            .pin
            .ok_or_else(|| LinkError::InvalidConfig("input pin not configured".into()))?;
        self.drain_backlog(pin)?;

        let deadline = Instant::now() + window;
        let mut edges = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.notify.set_read_timeout(Some(remaining))?;
            match self.read_chunk() {
                Ok(_) => self.parse_reports(pin, Some(&mut edges)),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(edges)
    }
}

impl Drop for PigpioCapture {
    fn drop(&mut self) {
        let _ = self.control.command(CMD_NC, self.handle, 0);
    }
}
