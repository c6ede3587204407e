use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender};
use jointlink_codec::Message;
use jointlink_transport::{PortOpener, PortSettings};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ConnectOptions, LinkConfig};
use crate::error::{LinkError, Result};
use crate::service::{LinkStats, ServiceLoop, Shared};

const SERVICE_THREAD_NAME: &str = "jointlink-service";

/// Device and baud rate of the open port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionParameters {
    pub device: String,
    pub baud_rate: u32,
}

/// Serial link to one controller.
///
/// A background service thread owns all port I/O. Callers exchange
/// [`Message`]s through two unbounded queues and never block on the wire:
///
/// ```text
/// put_message ──> [transmit queue] ──> service loop ──> port
/// get_message <── [receive queue]  <── service loop <── port
/// ```
///
/// A failed read or write closes the port; [`is_connected`](Self::is_connected)
/// turns false and the caller must `connect` again.
pub struct LinkManager {
    config: LinkConfig,
    opener: Box<dyn PortOpener>,
    shared: Arc<Shared>,
    tx: Sender<Message>,
    tx_queue: Receiver<Message>,
    rx: Receiver<Message>,
    rx_sender: Sender<Message>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LinkManager {
    /// Create a link manager with default configuration.
    pub fn new(opener: impl PortOpener + 'static) -> Self {
        Self::with_config(opener, LinkConfig::default())
    }

    pub fn with_config(opener: impl PortOpener + 'static, config: LinkConfig) -> Self {
        let (tx, tx_queue) = unbounded();
        let (rx_sender, rx) = unbounded();
        Self {
            config,
            opener: Box::new(opener),
            shared: Arc::new(Shared::default()),
            tx,
            tx_queue,
            rx,
            rx_sender,
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Open `path` at `baud_rate` and install it as the active port.
    ///
    /// Any previously open port is closed. The service loop is not started;
    /// `connect` may be called while it runs.
    pub fn connect(&self, path: &str, baud_rate: u32, options: ConnectOptions) -> Result<()> {
        self.config.validate()?;
        if baud_rate == 0 {
            return Err(LinkError::InvalidBaudRate(baud_rate));
        }
        let read_timeout = match options.read_timeout {
            Some(timeout) => timeout,
            None => self.config.packet_read_timeout(baud_rate)?,
        };

        let settings = PortSettings {
            path: path.to_string(),
            baud_rate,
            read_timeout,
            options: options.port,
        };
        debug!(device = %path, baud_rate, ?read_timeout, "connecting");

        let port = self.opener.open(&settings)?;
        self.shared.install_port(port);
        info!(device = %path, baud_rate, "serial port open");
        Ok(())
    }

    /// Spawn the service thread.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.lock_worker();
        if worker.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(LinkError::AlreadyRunning);
        }
        if let Some(finished) = worker.take() {
            // A loop that already exited; reap it.
            let _ = finished.join();
        }

        self.shared.running.store(true, Ordering::SeqCst);
        let service = self.service_loop();
        let handle = thread::Builder::new()
            .name(SERVICE_THREAD_NAME.to_string())
            .spawn(move || service.run())
            .map_err(|err| {
                self.shared.running.store(false, Ordering::SeqCst);
                LinkError::Spawn(err)
            })?;
        *worker = Some(handle);
        Ok(())
    }

    /// Ask the service loop to stop.
    ///
    /// The running loop closes the port on its way out, unless `connect`
    /// installed a new one after this call. Without a live loop the port is
    /// closed here. Idempotent.
    pub fn stop(&self) {
        self.shared.request_stop();
        thread::sleep(self.config.stop_grace);

        let loop_alive = self
            .lock_worker()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());
        if !loop_alive {
            self.shared.close_port("link stopped");
        }
        debug!(loop_alive, "stop requested");
    }

    /// Wait for the service thread to exit.
    pub fn join(&self) -> Result<()> {
        let handle = self.lock_worker().take();
        match handle {
            Some(handle) => handle.join().map_err(|_| LinkError::ServiceThreadPanicked),
            None => Ok(()),
        }
    }

    /// Queue a message for transmission. Never blocks.
    pub fn put_message(&self, msg: Message) {
        // The manager holds the receiving end, so the channel never disconnects.
        let _ = self.tx.send(msg);
    }

    /// Next received message, if any. Never blocks.
    pub fn get_message(&self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Poll until a message arrives.
    pub fn wait_for_message(&self) -> Message {
        loop {
            if let Some(msg) = self.get_message() {
                return msg;
            }
            thread::sleep(self.config.wait_interval);
        }
    }

    /// Poll until a message arrives or `timeout` elapses.
    pub fn wait_for_message_timeout(&self, timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(msg) = self.get_message() {
                return Some(msg);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep(self.config.wait_interval.min(deadline - now));
        }
    }

    /// Messages queued for transmission but not yet taken by the service loop.
    pub fn pending_transmit(&self) -> usize {
        self.tx_queue.len()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock_port().as_ref().is_some_and(|port| port.is_open())
    }

    /// Device and baud rate of the open port.
    pub fn connection_parameters(&self) -> Option<ConnectionParameters> {
        self.shared
            .lock_port()
            .as_ref()
            .map(|port| ConnectionParameters {
                device: port.device().to_string(),
                baud_rate: port.baud_rate(),
            })
    }

    /// Whether a service thread is alive.
    pub fn is_running(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stats(&self) -> LinkStats {
        self.shared.counters.snapshot()
    }

    pub(crate) fn service_loop(&self) -> ServiceLoop {
        ServiceLoop::new(
            Arc::clone(&self.shared),
            self.tx_queue.clone(),
            self.rx_sender.clone(),
            self.config.packet_size,
            self.config.poll_interval,
        )
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LinkManager {
    fn drop(&mut self) {
        self.stop();
        let _ = self.join();
    }
}

impl std::fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("config", &self.config)
            .field("connection", &self.connection_parameters())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
