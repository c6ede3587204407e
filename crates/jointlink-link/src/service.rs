use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use crossbeam::channel::{Receiver, Sender};
use jointlink_codec::{decode_message, encode_message, Message, PACKET_SIZE};
use jointlink_transport::SerialTransport;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

pub(crate) type Port = Box<dyn SerialTransport>;

/// State shared by the caller side and the service thread.
#[derive(Default)]
pub(crate) struct Shared {
    port: Mutex<Option<Port>>,
    /// Bumped on every `install_port`, under the port lock.
    generation: AtomicU64,
    /// Generation current when the last stop was requested.
    stop_generation: AtomicU64,
    pub(crate) running: AtomicBool,
    pub(crate) counters: Counters,
}

impl Shared {
    pub(crate) fn lock_port(&self) -> MutexGuard<'_, Option<Port>> {
        self.port.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install a freshly opened port, closing the one it replaces.
    pub(crate) fn install_port(&self, port: Port) {
        let mut slot = self.lock_port();
        close_slot(&mut slot, "replaced by new connection");
        *slot = Some(port);
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Clear the running flag and remember which port the stop was meant for.
    pub(crate) fn request_stop(&self) {
        let _slot = self.lock_port();
        self.stop_generation
            .store(self.generation.load(Ordering::SeqCst), Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Close the port unless it was replaced after the stop request.
    pub(crate) fn close_stopped_port(&self, reason: &str) {
        let mut slot = self.lock_port();
        let stopped = self.stop_generation.load(Ordering::SeqCst);
        if self.generation.load(Ordering::SeqCst) != stopped {
            debug!("port replaced after stop, left open");
            return;
        }
        close_slot(&mut slot, reason);
    }

    pub(crate) fn close_port(&self, reason: &str) {
        close_slot(&mut self.lock_port(), reason);
    }
}

fn close_slot(slot: &mut Option<Port>, reason: &str) {
    if let Some(mut port) = slot.take() {
        debug!(device = %port.device(), reason, "closing serial port");
        port.close();
    }
}

#[derive(Default)]
pub(crate) struct Counters {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    incomplete_frames: AtomicU64,
    dropped_while_disconnected: AtomicU64,
    io_failures: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> LinkStats {
        LinkStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            incomplete_frames: self.incomplete_frames.load(Ordering::Relaxed),
            dropped_while_disconnected: self.dropped_while_disconnected.load(Ordering::Relaxed),
            io_failures: self.io_failures.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Link traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Frames written to the port.
    pub frames_sent: u64,
    /// Full frames read, decoded and queued.
    pub frames_received: u64,
    /// Short reads discarded.
    pub incomplete_frames: u64,
    /// Outbound messages dropped because no port was open.
    pub dropped_while_disconnected: u64,
    /// Read or write failures that closed the port.
    pub io_failures: u64,
}

/// The service loop: one transmit step then one receive step per iteration.
pub(crate) struct ServiceLoop {
    shared: Arc<Shared>,
    outbound: Receiver<Message>,
    inbound: Sender<Message>,
    packet_size: usize,
    poll_interval: Duration,
    frame: BytesMut,
    read_buf: Vec<u8>,
}

impl ServiceLoop {
    pub(crate) fn new(
        shared: Arc<Shared>,
        outbound: Receiver<Message>,
        inbound: Sender<Message>,
        packet_size: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            shared,
            outbound,
            inbound,
            packet_size,
            poll_interval,
            frame: BytesMut::with_capacity(PACKET_SIZE),
            read_buf: vec![0u8; packet_size],
        }
    }

    /// Run until the running flag clears, then close the port.
    pub(crate) fn run(mut self) {
        info!(poll_interval = ?self.poll_interval, "service loop started");
        while self.shared.running.load(Ordering::SeqCst) {
            thread::sleep(self.poll_interval);
            self.step();
        }
        self.shared.close_stopped_port("service loop stopped");
        info!("service loop stopped");
    }

    /// One iteration. The port slot stays locked for the whole step so a
    /// concurrent `connect` or `stop` never swaps the port mid-I/O.
    pub(crate) fn step(&mut self) {
        let shared = Arc::clone(&self.shared);
        let mut slot = shared.lock_port();
        self.process_tx(&mut slot);
        if slot.is_none() {
            return;
        }
        self.process_rx(&mut slot);
    }

    fn process_tx(&mut self, slot: &mut Option<Port>) {
        let Ok(msg) = self.outbound.try_recv() else {
            return;
        };

        let Some(port) = slot.as_mut() else {
            warn!(
                msg_type = %msg.type_name(),
                "trying to send on a closed serial port, message dropped"
            );
            bump(&self.shared.counters.dropped_while_disconnected);
            return;
        };

        debug!(%msg, "transmitting");
        self.frame.clear();
        encode_message(&msg, &mut self.frame);

        match port.write_all(&self.frame) {
            Ok(()) => bump(&self.shared.counters.frames_sent),
            Err(err) => {
                warn!(error = %err, "serial write failed");
                bump(&self.shared.counters.io_failures);
                close_slot(slot, "write failed");
            }
        }
    }

    fn process_rx(&mut self, slot: &mut Option<Port>) {
        let Some(port) = slot.as_mut() else {
            return;
        };

        let available = match port.bytes_available() {
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, "serial poll failed");
                bump(&self.shared.counters.io_failures);
                close_slot(slot, "poll failed");
                return;
            }
        };
        if available == 0 {
            return;
        }

        self.read_buf.fill(0);
        let read = match port.read(&mut self.read_buf) {
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, "serial read failed");
                bump(&self.shared.counters.io_failures);
                close_slot(slot, "read failed");
                return;
            }
        };

        if read != self.packet_size {
            warn!(
                expected = self.packet_size,
                read,
                bytes = ?&self.read_buf[..read],
                "received incomplete packet, discarded"
            );
            bump(&self.shared.counters.incomplete_frames);
            return;
        }

        let msg = decode_message(&self.read_buf);
        debug!(%msg, "received");
        bump(&self.shared.counters.frames_received);
        if self.inbound.send(msg).is_err() {
            trace!("receive queue closed");
        }
    }
}
