//! Connection lifecycle for one robot.
//!
//! ```text
//! Disconnected --connect--> Connecting --established--> Connected --wake--> Awake
//!      ^                        |                           |                 | send
//!      +------ failed ----------+                           +--disconnect-----+
//!      +------------------------- Disconnecting <-----------+
//! ```
//!
//! Any link drop, acknowledgment timeout or protocol violation sends the
//! session straight back to `Disconnected`. A drop reported by the transport
//! is picked up in the background, so [`Session::watch_state`] fires even
//! while no command is running.

use crate::command::Command;
use crate::config::{AckMode, SessionConfig};
use crate::constants::COMMAND_CHARACTERISTIC_UUID;
use crate::device::DeviceRecord;
use crate::error::{BoltError, Result};
use crate::packet;
use crate::transport::{Transport, TransportError};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use strum_macros::{Display, IntoStaticStr};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Awake,
    Disconnecting,
}

/// Inputs to the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SessionEvent {
    Connect,
    Established,
    ConnectFailed,
    Wake,
    Send,
    Disconnect,
    Closed,
    LinkLost,
}

impl SessionState {
    /// The state after `event`, or `IllegalState` if `event` cannot happen here.
    pub fn apply(self, event: SessionEvent) -> Result<SessionState> {
        use SessionEvent as E;
        use SessionState as S;

        match (self, event) {
            (S::Disconnected, E::Connect) => Ok(S::Connecting),
            (S::Connecting, E::Established) => Ok(S::Connected),
            (S::Connecting, E::ConnectFailed) => Ok(S::Disconnected),
            (S::Connected | S::Awake, E::Wake) => Ok(S::Awake),
            (S::Awake, E::Send) => Ok(S::Awake),
            (S::Connected | S::Awake, E::Disconnect) => Ok(S::Disconnecting),
            (S::Disconnecting, E::Closed) => Ok(S::Disconnected),
            (_, E::LinkLost) => Ok(S::Disconnected),
            (state, event) => Err(BoltError::IllegalState {
                operation: event.into(),
                state,
            }),
        }
    }
}

/// One logical connection to a robot.
///
/// The session owns the transport and the sequence counter. Every method that
/// talks to the robot takes `&mut self`, so two commands can never interleave
/// on the wire. Wrap it in a [`SessionHandle`] to share it between tasks.
///
/// There is no async drop: call [`Session::disconnect`] to close the link.
pub struct Session<T: Transport> {
    transport: T,
    config: SessionConfig,
    state: Arc<watch::Sender<SessionState>>,
    device: Option<DeviceRecord>,
    sequence: u8,
    in_flight: Option<u8>,
    link: Option<watch::Receiver<bool>>,
    link_monitor: Option<JoinHandle<()>>,
}

/// Open a session to `device`, waking the robot if the config asks for it.
pub async fn connect<T: Transport>(transport: T, device: &DeviceRecord, config: SessionConfig) -> Result<Session<T>> {
    let mut session = Session::new(transport, config);
    session.connect(device).await?;
    Ok(session)
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: Arc::new(watch::Sender::new(SessionState::Disconnected)),
            device: None,
            sequence: 0,
            in_flight: None,
            link: None,
            link_monitor: None,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Follow state changes, e.g. to notice when the link goes down.
    ///
    /// A link dropped by the robot moves this to `Disconnected` on its own;
    /// the next command then fails with `ConnectionLost`.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn device(&self) -> Option<&DeviceRecord> {
        self.device.as_ref()
    }

    /// Sequence number of the last transmitted packet (0 before the first one)
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn into_handle(self) -> SessionHandle<T> {
        SessionHandle::new(self)
    }

    pub async fn connect(&mut self, device: &DeviceRecord) -> Result<()> {
        self.advance(SessionEvent::Connect)?;
        if self.link.is_some() {
            // Left over from a link the robot dropped
            self.release().await;
        }
        info!("Connecting to {device}...");
        self.sequence = 0;
        self.in_flight = None;
        self.device = Some(device.clone());

        let connect_timeout = self.config.connect_timeout;
        let opened = match timeout(connect_timeout, self.transport.open(device)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(connect_timeout)),
        };

        if let Err(source) = opened {
            warn!("Connection to {} failed: {source}", device.address());
            self.close_transport().await;
            self.device = None;
            self.advance(SessionEvent::ConnectFailed)?;
            return Err(BoltError::ConnectionFailed {
                address: device.address().to_string(),
                source,
            });
        }

        self.advance(SessionEvent::Established)?;
        self.follow_link();
        info!("Connected to {}", device.name());

        if self.config.wake_on_connect {
            self.wake().await?;
        }
        Ok(())
    }

    pub async fn wake(&mut self) -> Result<()> {
        self.ensure_link().await?;
        let next = self.state().apply(SessionEvent::Wake)?;
        self.transmit(Command::Wake).await?;
        self.set_state(next);
        info!("Robot is awake");
        Ok(())
    }

    /// Send one command and wait for its acknowledgment.
    ///
    /// `Command::Wake` is routed through [`Session::wake`]; everything else
    /// requires an awake robot.
    pub async fn send(&mut self, command: Command) -> Result<()> {
        if command == Command::Wake {
            return self.wake().await;
        }
        self.ensure_link().await?;
        self.state().apply(SessionEvent::Send)?;
        self.transmit(command).await
    }

    pub async fn drive(&mut self, speed: u16, heading: u16) -> Result<()> {
        self.send(Command::drive(speed, heading)?).await
    }

    pub async fn drive_reverse(&mut self, speed: u16, heading: u16) -> Result<()> {
        self.send(Command::drive_reverse(speed, heading)?).await
    }

    pub async fn set_main_led(&mut self, red: u16, green: u16, blue: u16) -> Result<()> {
        self.send(Command::set_main_led(red, green, blue)?).await
    }

    pub async fn set_matrix_led(&mut self, x: u16, y: u16, red: u16, green: u16, blue: u16) -> Result<()> {
        self.send(Command::set_matrix_led(x, y, red, green, blue)?).await
    }

    /// Close the link. A no-op unless connected; close failures are only logged.
    pub async fn disconnect(&mut self) {
        let Ok(next) = self.state().apply(SessionEvent::Disconnect) else {
            if self.link.is_some() {
                self.release().await;
            }
            debug!("Disconnect ignored while {}", self.state());
            return;
        };
        self.set_state(next);
        info!("Disconnecting...");
        self.release().await;
        let closed = self
            .state()
            .apply(SessionEvent::Closed)
            .unwrap_or(SessionState::Disconnected);
        self.set_state(closed);
        info!("Disconnected");
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Session state {previous} -> {state}");
        }
    }

    fn advance(&self, event: SessionEvent) -> Result<()> {
        let next = self.state().apply(event)?;
        self.set_state(next);
        Ok(())
    }

    /// Move the session to `Disconnected` as soon as the transport reports a drop.
    fn follow_link(&mut self) {
        let mut link = self.transport.link_status();
        self.link = Some(link.clone());
        let state = Arc::clone(&self.state);
        self.link_monitor = Some(tokio::spawn(async move {
            // Also resolves if the transport drops its side of the channel
            let _ = link.wait_for(|up| !*up).await;
            state.send_if_modified(|current| match current.apply(SessionEvent::LinkLost) {
                Ok(next) if next != *current => {
                    warn!("Link dropped while {current}");
                    *current = next;
                    true
                }
                _ => false,
            });
        }));
    }

    /// Fail fast if the link is known to be unusable.
    async fn ensure_link(&mut self) -> Result<()> {
        if let Some(sequence) = self.in_flight.take() {
            self.teardown().await;
            return Err(BoltError::ConnectionLost(format!(
                "packet {sequence} was abandoned before its acknowledgment"
            )));
        }
        let dropped = self.link.as_ref().is_some_and(|link| !*link.borrow());
        if dropped {
            self.teardown().await;
            return Err(BoltError::ConnectionLost("the robot dropped the link".to_string()));
        }
        Ok(())
    }

    async fn transmit(&mut self, command: Command) -> Result<()> {
        let sequence = self.sequence.wrapping_add(1);
        let requests_response = self.config.ack_mode == AckMode::Response;
        let frame = Bytes::from(command.to_packet(sequence, requests_response));
        let max_retries = self.config.retry.max_retries;

        let mut retries = 0;
        loop {
            self.in_flight = Some(sequence);
            let outcome = self.attempt(sequence, frame.clone()).await;
            self.in_flight = None;

            match outcome {
                Ok(()) => {
                    debug!("{command} acknowledged (seq {sequence})");
                    return Ok(());
                }
                Err(BoltError::CommandTimeout { .. }) if retries < max_retries => {
                    retries += 1;
                    warn!("No acknowledgment for seq {sequence}, retry {retries}/{max_retries}");
                }
                // The robot answered, so the link is still sound
                Err(err @ BoltError::CommandRejected { .. }) => return Err(err),
                Err(err) => {
                    self.teardown().await;
                    return Err(err);
                }
            }
        }
    }

    /// Write `frame` once and wait for its acknowledgment.
    async fn attempt(&mut self, sequence: u8, frame: Bytes) -> Result<()> {
        let ack_timeout = self.config.ack_timeout;
        let deadline = Instant::now() + ack_timeout;

        debug!(bytes = hex::encode(&frame), "BLE Write");
        match timeout_at(deadline, self.transport.write(COMMAND_CHARACTERISTIC_UUID, frame)).await {
            Ok(Ok(())) => self.sequence = sequence,
            Ok(Err(err)) => return Err(BoltError::ConnectionLost(err.to_string())),
            Err(_) => {
                return Err(BoltError::CommandTimeout {
                    sequence,
                    timeout: ack_timeout,
                });
            }
        }

        if self.config.ack_mode == AckMode::WriteConfirmed {
            return Ok(());
        }

        loop {
            let frame = match timeout_at(deadline, self.transport.recv()).await {
                Ok(Ok(frame)) => frame,
                Ok(Err(err)) => return Err(BoltError::ConnectionLost(err.to_string())),
                Err(_) => {
                    return Err(BoltError::CommandTimeout {
                        sequence,
                        timeout: ack_timeout,
                    });
                }
            };
            debug!(bytes = hex::encode(&frame), "BLE Read");

            let response = packet::decode(frame)?;
            if !response.header.is_response() {
                debug!("Skipping unsolicited packet (seq {})", response.sequence());
                continue;
            }
            if response.sequence() != sequence {
                return Err(BoltError::SequenceMismatch {
                    expected: sequence,
                    actual: response.sequence(),
                });
            }
            return match response.header.error_code() {
                None | Some(0) => Ok(()),
                Some(code) => Err(BoltError::CommandRejected { sequence, code }),
            };
        }
    }

    /// Drop the link after a failure. The session ends up `Disconnected`.
    async fn teardown(&mut self) {
        warn!("Link compromised, closing transport");
        self.release().await;
        let next = self
            .state()
            .apply(SessionEvent::LinkLost)
            .unwrap_or(SessionState::Disconnected);
        self.set_state(next);
    }

    /// Stop following the link and close it. State is left to the caller.
    async fn release(&mut self) {
        if let Some(monitor) = self.link_monitor.take() {
            monitor.abort();
        }
        self.link = None;
        self.close_transport().await;
        self.device = None;
        self.in_flight = None;
    }

    async fn close_transport(&mut self) {
        let disconnect_timeout = self.config.disconnect_timeout;
        match timeout(disconnect_timeout, self.transport.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Closing transport failed: {err}"),
            Err(_) => warn!("Closing transport timed out after {disconnect_timeout:?}"),
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Some(monitor) = self.link_monitor.take() {
            monitor.abort();
        }
    }
}

/// Shared access to a [`Session`] from several tasks.
///
/// `send` queues behind whatever command is in flight; `try_send` refuses
/// with `Busy` instead of waiting. Reading the state never waits.
pub struct SessionHandle<T: Transport> {
    inner: Arc<Mutex<Session<T>>>,
    state: watch::Receiver<SessionState>,
}

impl<T: Transport> Clone for SessionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            state: self.state.clone(),
        }
    }
}

impl<T: Transport> From<Session<T>> for SessionHandle<T> {
    fn from(session: Session<T>) -> Self {
        Self::new(session)
    }
}

impl<T: Transport> SessionHandle<T> {
    pub fn new(session: Session<T>) -> Self {
        Self {
            state: session.watch_state(),
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub async fn send(&self, command: Command) -> Result<()> {
        self.inner.lock().await.send(command).await
    }

    pub async fn try_send(&self, command: Command) -> Result<()> {
        let mut session = self.inner.try_lock().map_err(|_| BoltError::Busy)?;
        session.send(command).await
    }

    pub async fn wake(&self) -> Result<()> {
        self.inner.lock().await.wake().await
    }

    pub async fn disconnect(&self) {
        self.inner.lock().await.disconnect().await
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }
}
