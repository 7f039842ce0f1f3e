//! Socket Session with Automatic Reconnection
//!
//! Single responsibility: keep one logical connection to the chat endpoint,
//! recovering from unexpected drops.
//!
//! # Reconnection Policy
//!
//! When the connection closes for any reason other than a local `close()`:
//! 1. `SessionEvent::Closed` is published
//! 2. If fewer than `max_reconnect_attempts` attempts were made, the next one
//!    is scheduled after `reconnect_delay` (`SessionEvent::Reconnecting`)
//! 3. Otherwise the session enters `SessionState::Failed` and reports on the
//!    error channel. Only an explicit `connect()` starts a new cycle.
//!
//! A successful open resets the attempt counter. The whole cycle runs inside a
//! single driver task, so there is never more than one pending reconnection
//! timer.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::transport::{self, Inbound, Transport};
use crate::config::{
    ClientConfig, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY, DEFAULT_SOCKET_URL,
};
use crate::error::{ClientError, Result};
use crate::types::OutboundFrame;

const EVENT_CAPACITY: usize = 1024;

/// Configuration for a socket session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// WebSocket endpoint
    pub url: String,
    /// Fixed delay between reconnection attempts
    pub reconnect_delay: Duration,
    /// Maximum reconnection attempts before giving up (0 = never reconnect)
    pub max_reconnect_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOCKET_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl From<&ClientConfig> for SessionConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            url: config.socket_url.clone(),
            reconnect_delay: config.reconnect_delay,
            max_reconnect_attempts: config.max_reconnect_attempts,
        }
    }
}

/// Lifecycle state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Open,
    Reconnecting,
    /// Reconnection attempts exhausted
    Failed,
}

/// Notifications published by the session, in the order they happen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connection established (once per successful open)
    Opened,
    /// Raw inbound frame
    Message(String),
    /// Connection closed or a connection attempt failed
    Closed {
        initiated_locally: bool,
        reason: Option<String>,
    },
    /// Transport error or terminal failure
    Error(String),
    /// A reconnection attempt has been scheduled
    Reconnecting {
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
}

/// Handle to the running driver task
struct Driver {
    outbound: mpsc::UnboundedSender<String>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// A WebSocket session that reconnects on unexpected drops.
///
/// # Guarantees
///
/// - At most one underlying connection exists at a time
/// - `send()` never blocks and fails fast when the session is not open
/// - After `close()` returns, the connection is gone and no reconnection is
///   pending
pub struct SocketSession {
    config: SessionConfig,
    events: broadcast::Sender<SessionEvent>,
    state: Arc<watch::Sender<SessionState>>,
    driver: Option<Driver>,
}

impl SocketSession {
    pub fn new(config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            config,
            events,
            state: Arc::new(state),
            driver: None,
        }
    }

    /// Get a receiver for session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Get a receiver that tracks state changes
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Open
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Start connecting.
    ///
    /// Any previous connection (or pending reconnection) is torn down first.
    /// Returns once the driver is running; the open itself is reported by
    /// `SessionEvent::Opened`.
    pub async fn connect(&mut self) {
        if self.driver.is_some() {
            debug!(url = %self.config.url, "Replacing existing connection");
            self.shutdown_driver().await;
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        self.state.send_replace(SessionState::Connecting);

        let driver = SessionDriver {
            config: self.config.clone(),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
            outbound: outbound_rx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(driver.run());

        self.driver = Some(Driver {
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Send a user message for a conversation using the canonical frame.
    pub fn send(&self, conversation_id: &str, content: &str) -> Result<()> {
        self.send_json(&OutboundFrame {
            conversation_id,
            user_message: content,
        })
    }

    /// Send any serializable payload as a JSON text frame.
    pub fn send_json<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let driver = match &self.driver {
            Some(driver) if self.is_connected() => driver,
            _ => {
                warn!(url = %self.config.url, "WebSocket is not connected");
                return Err(ClientError::NotConnected);
            }
        };

        let text = serde_json::to_string(payload)?;
        driver
            .outbound
            .send(text)
            .map_err(|_| ClientError::NotConnected)?;
        Ok(())
    }

    /// Close the connection and suppress reconnection.
    ///
    /// Waits for the driver task to finish. Closing a closed session is a no-op.
    pub async fn close(&mut self) {
        if self.driver.is_none() {
            debug!("Session already closed");
            return;
        }

        self.shutdown_driver().await;
        self.state.send_replace(SessionState::Disconnected);
        info!(url = %self.config.url, "Session closed");
    }

    async fn shutdown_driver(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };

        // Err means the driver already exited (e.g. after Failed)
        let _ = driver.shutdown.send(());
        if let Err(e) = driver.task.await {
            if !e.is_cancelled() {
                error!(error = %e, "Session driver panicked");
            }
        }
    }
}

impl Drop for SocketSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.task.abort();
            debug!("Session dropped, driver task aborted");
        }
    }
}

/// Why a live connection ended
enum Disconnect {
    Local,
    Remote(Option<String>),
}

/// Owns the connection and the reconnection loop. Runs in a spawned task.
struct SessionDriver {
    config: SessionConfig,
    events: broadcast::Sender<SessionEvent>,
    state: Arc<watch::Sender<SessionState>>,
    outbound: mpsc::UnboundedReceiver<String>,
    shutdown: oneshot::Receiver<()>,
}

impl SessionDriver {
    async fn run(mut self) {
        let max_attempts = self.config.max_reconnect_attempts;
        let mut attempts = 0u32;

        loop {
            let connected = tokio::select! {
                biased;
                _ = &mut self.shutdown => {
                    debug!("Shutdown received while connecting");
                    self.set_state(SessionState::Disconnected);
                    return;
                }
                result = Transport::connect(&self.config.url) => result,
            };

            match connected {
                Ok(transport) => {
                    attempts = 0;
                    self.discard_unsent();
                    self.set_state(SessionState::Open);
                    info!(url = %self.config.url, "Connected to WebSocket");
                    self.emit(SessionEvent::Opened);

                    match self.pump(transport).await {
                        Disconnect::Local => {
                            self.set_state(SessionState::Disconnected);
                            self.emit(SessionEvent::Closed {
                                initiated_locally: true,
                                reason: None,
                            });
                            return;
                        }
                        Disconnect::Remote(reason) => {
                            info!(url = %self.config.url, reason = ?reason, "WebSocket connection closed");
                            self.set_state(SessionState::Disconnected);
                            self.discard_unsent();
                            self.emit(SessionEvent::Closed {
                                initiated_locally: false,
                                reason,
                            });
                        }
                    }
                }
                Err(e) => {
                    error!(url = %self.config.url, error = %e, "WebSocket connection failed");
                    self.emit(SessionEvent::Error(e.to_string()));
                    self.emit(SessionEvent::Closed {
                        initiated_locally: false,
                        reason: Some(e.to_string()),
                    });
                }
            }

            if attempts >= max_attempts {
                error!(max_attempts, "Max reconnection attempts reached");
                self.set_state(SessionState::Failed);
                self.emit(SessionEvent::Error(format!(
                    "Max reconnection attempts ({}) reached",
                    max_attempts
                )));
                return;
            }

            attempts += 1;
            self.set_state(SessionState::Reconnecting);
            warn!(
                attempt = attempts,
                max = max_attempts,
                delay = ?self.config.reconnect_delay,
                "Attempting to reconnect"
            );
            self.emit(SessionEvent::Reconnecting {
                attempt: attempts,
                max_attempts,
                delay: self.config.reconnect_delay,
            });

            tokio::select! {
                biased;
                _ = &mut self.shutdown => {
                    info!("Shutdown received during reconnect wait");
                    self.set_state(SessionState::Disconnected);
                    return;
                }
                _ = sleep(self.config.reconnect_delay) => {}
            }
        }
    }

    /// Move frames in both directions until the connection ends.
    async fn pump(&mut self, transport: Transport) -> Disconnect {
        let (mut sink, mut stream) = transport.split();

        loop {
            tokio::select! {
                biased;
                _ = &mut self.shutdown => {
                    debug!("Local close requested");
                    if let Err(e) = transport::close(&mut sink).await {
                        debug!(error = %e, "Close frame not delivered");
                    }
                    return Disconnect::Local;
                }
                Some(text) = self.outbound.recv() => {
                    debug!(len = text.len(), "Sending frame");
                    if let Err(e) = transport::send_text(&mut sink, text).await {
                        error!(error = %e, "Failed to send frame");
                        self.emit(SessionEvent::Error(e.to_string()));
                        return Disconnect::Remote(Some(e.to_string()));
                    }
                }
                inbound = transport::recv(&mut stream) => match inbound {
                    Ok(Inbound::Frame(text)) => {
                        debug!(len = text.len(), "Received frame");
                        self.emit(SessionEvent::Message(text));
                    }
                    Ok(Inbound::Closed { reason }) => return Disconnect::Remote(reason),
                    Err(e) => {
                        error!(error = %e, "WebSocket error");
                        self.emit(SessionEvent::Error(e.to_string()));
                        return Disconnect::Remote(Some(e.to_string()));
                    }
                },
            }
        }
    }

    /// Drop frames queued for a connection that is no longer usable.
    fn discard_unsent(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "Discarded frames queued for a closed connection");
        }
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Session state changed");
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.events.send(event) {
            debug!("No session subscribers: {:?}", e.0);
        }
    }
}
