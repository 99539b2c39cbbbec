//! Event loop that owns a [`GcClient`].
//!
//! The loop is the client's only writer. It reacts to three sources: inbound
//! GC messages from the transport, the session's retry-timer deadline, and
//! commands queued through a [`DriverHandle`]. A shutdown signal or a closed
//! inbound channel ends it with a clean `exit()`.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::client::GcClient;
use crate::codec::DecodeError;
use crate::correlator::PendingCallback;
use crate::error::RequestError;
use crate::transport::InboundMessage;

/// Work queued for the driver task.
pub type Command = Box<dyn FnOnce(&mut GcClient) + Send>;

/// Handle for queuing work onto a running driver.
#[derive(Clone)]
pub struct DriverHandle {
    commands: mpsc::UnboundedSender<Command>,
    shutdown_tx: watch::Sender<bool>,
}

/// The driver task has stopped.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("GC driver has stopped")]
pub struct DriverStopped;

impl DriverHandle {
    /// Run `f` against the client on the driver task.
    pub fn execute<F>(&self, f: F) -> Result<(), DriverStopped>
    where
        F: FnOnce(&mut GcClient) + Send + 'static,
    {
        self.commands.send(Box::new(f)).map_err(|_| DriverStopped)
    }

    /// Queue [`GcClient::launch`].
    pub fn launch(&self) -> Result<(), DriverStopped> {
        self.execute(GcClient::launch)
    }

    /// Queue [`GcClient::exit`]. The driver keeps running.
    pub fn exit(&self) -> Result<(), DriverStopped> {
        self.execute(GcClient::exit)
    }

    /// Fire-and-forget send, checked for readiness on the driver task.
    ///
    /// Resolves once the client has accepted or refused the message; no
    /// reply is awaited. A stopped driver reports [`RequestError::Disconnected`].
    pub async fn send_to_gc(&self, msg_type: u32, payload: Vec<u8>) -> Result<(), RequestError> {
        let (tx, rx) = oneshot::channel();
        self.execute(move |client| {
            let _ = tx.send(client.send_to_gc(msg_type, payload));
        })
        .map_err(|_| RequestError::Disconnected)?;

        rx.await.unwrap_or(Err(RequestError::Disconnected))
    }

    /// Send a request and wait for its decoded reply.
    pub async fn request<T, D>(
        &self,
        msg_type: u32,
        payload: Vec<u8>,
        decode: D,
    ) -> Result<T, RequestError>
    where
        T: Send + 'static,
        D: FnOnce(Vec<u8>) -> Result<T, DecodeError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let pending = PendingCallback::decoded(decode, move |result| {
            let _ = tx.send(result);
        });
        self.execute(move |client| {
            let _ = client.request(msg_type, payload, pending);
        })
        .map_err(|_| RequestError::Disconnected)?;

        rx.await.unwrap_or(Err(RequestError::Disconnected))
    }

    /// Ask the driver to exit the session and stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// Spawn the event loop on the current tokio runtime.
///
/// The task returns the client when it stops, so its caches can still be
/// inspected.
pub fn spawn(
    client: GcClient,
    inbound: mpsc::Receiver<InboundMessage>,
) -> (DriverHandle, JoinHandle<GcClient>) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(run(client, inbound, commands_rx, shutdown_rx));
    let handle = DriverHandle {
        commands: commands_tx,
        shutdown_tx,
    };
    (handle, task)
}

/// Drive `client` until shutdown or until the inbound channel closes.
pub async fn run(
    mut client: GcClient,
    mut inbound: mpsc::Receiver<InboundMessage>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> GcClient {
    let mut commands_open = true;
    let mut shutdown_open = true;

    loop {
        let deadline = client.next_deadline();

        tokio::select! {
            biased;

            changed = shutdown_rx.changed(), if shutdown_open => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => break,
                    Ok(()) => {}
                    // Every handle is gone; only the inbound channel can end the loop now.
                    Err(_) => shutdown_open = false,
                }
            }
            command = commands.recv(), if commands_open => {
                match command {
                    Some(command) => command(&mut client),
                    None => commands_open = false,
                }
            }
            msg = inbound.recv() => {
                match msg {
                    Some(msg) => client.handle_inbound(msg),
                    None => {
                        tracing::debug!("Inbound channel closed");
                        break;
                    }
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                client.on_timer(Instant::now());
            }
        }
    }

    client.exit();
    client
}
