use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::{PortOpener, PortSettings, SerialTransport};

/// In-memory port shared between a [`LoopbackTransport`] and a
/// [`LoopbackHandle`].
#[derive(Debug, Default)]
struct LoopbackState {
    inbound: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    generation: u64,
    open: bool,
    open_count: usize,
    last_settings: Option<PortSettings>,
    fail_open: bool,
    fail_next_write: bool,
    fail_next_read: bool,
    fail_next_poll: bool,
}

/// Device-side view of a simulated port.
///
/// Tests use it to feed bytes that the link will read, inspect frames the
/// link wrote, and inject failures.
#[derive(Debug, Clone, Default)]
pub struct LoopbackHandle {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opener that hands out ports backed by this handle.
    pub fn opener(&self) -> LoopbackOpener {
        LoopbackOpener {
            handle: self.clone(),
        }
    }

    /// Queue bytes for the link to read.
    pub fn feed(&self, bytes: &[u8]) {
        self.lock().inbound.extend(bytes.iter().copied());
    }

    /// Bytes queued but not yet read.
    pub fn pending_inbound(&self) -> usize {
        self.lock().inbound.len()
    }

    /// Every `write_all` call seen so far, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock().written.clone()
    }

    /// Drain recorded writes.
    pub fn take_written(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.lock().written)
    }

    /// Make every subsequent `open` fail until cleared.
    pub fn set_fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    /// Make the next `write_all` fail with a broken pipe.
    pub fn fail_next_write(&self) {
        self.lock().fail_next_write = true;
    }

    /// Make the next `read` fail with a broken pipe.
    pub fn fail_next_read(&self) {
        self.lock().fail_next_read = true;
    }

    /// Make the next `bytes_available` fail with a broken pipe.
    pub fn fail_next_poll(&self) {
        self.lock().fail_next_poll = true;
    }

    /// Whether the most recently opened port is still open.
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// How many times a port was opened through this handle.
    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    /// Settings of the most recent successful open.
    pub fn last_settings(&self) -> Option<PortSettings> {
        self.lock().last_settings.clone()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`PortOpener`] for simulated ports.
#[derive(Debug, Clone, Default)]
pub struct LoopbackOpener {
    handle: LoopbackHandle,
}

impl LoopbackOpener {
    /// Create an opener with a fresh handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Device-side handle for ports opened by this opener.
    pub fn handle(&self) -> LoopbackHandle {
        self.handle.clone()
    }
}

impl PortOpener for LoopbackOpener {
    fn open(&self, settings: &PortSettings) -> Result<Box<dyn SerialTransport>> {
        let mut state = self.handle.lock();
        if state.fail_open {
            return Err(TransportError::open(
                settings.path.clone(),
                std::io::Error::new(ErrorKind::NotFound, "loopback open refused"),
            ));
        }

        state.generation += 1;
        state.open = true;
        state.open_count += 1;
        state.last_settings = Some(settings.clone());

        Ok(Box::new(LoopbackTransport {
            state: Arc::clone(&self.handle.state),
            generation: state.generation,
            device: settings.path.clone(),
            baud_rate: settings.baud_rate,
            closed: false,
        }))
    }
}

/// Link-side end of a simulated port.
///
/// Reads never block: a read returns whatever the handle has fed so far, up
/// to the buffer size, as if the read timeout elapsed.
#[derive(Debug)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
    generation: u64,
    device: String,
    baud_rate: u32,
    closed: bool,
}

impl LoopbackTransport {
    fn lock(&self) -> Result<MutexGuard<'_, LoopbackState>> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

fn broken_pipe(what: &str) -> TransportError {
    TransportError::Io(std::io::Error::new(ErrorKind::BrokenPipe, what.to_string()))
}

impl SerialTransport for LoopbackTransport {
    fn bytes_available(&mut self) -> Result<usize> {
        let mut state = self.lock()?;
        if std::mem::take(&mut state.fail_next_poll) {
            return Err(broken_pipe("loopback poll failure"));
        }
        Ok(state.inbound.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock()?;
        if std::mem::take(&mut state.fail_next_read) {
            return Err(broken_pipe("loopback read failure"));
        }

        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        trace!(requested = buf.len(), read = n, "loopback read");
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.lock()?;
        if std::mem::take(&mut state.fail_next_write) {
            return Err(broken_pipe("loopback write failure"));
        }
        state.written.push(bytes.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.generation == self.generation {
            state.open = false;
        }
        self.closed = true;
    }

    fn is_open(&self) -> bool {
        !self.closed
    }

    fn device(&self) -> &str {
        &self.device
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.close();
    }
}
