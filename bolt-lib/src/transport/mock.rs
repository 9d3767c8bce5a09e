//! In-memory transport that plays the robot's side of the protocol.
//!
//! Clones share state, so a test can keep one handle for inspection while the
//! session owns the other.

use super::{Transport, TransportError};
use crate::device::{DeviceAddress, DeviceRecord};
use crate::packet::{self, Packet};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// How the fake robot answers packets that request a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckBehavior {
    /// Answer with a matching response and error code 0
    #[default]
    Respond,
    /// Never answer
    Silent,
    /// Answer with the next sequence number instead of the sent one
    WrongSequence,
    /// Answer with this error code
    Reject(u8),
    /// Answer with a frame whose checksum is off by one
    Corrupt,
}

#[derive(Debug, Default)]
struct MockState {
    fail_open: bool,
    open_delay: Option<Duration>,
    drop_after_writes: Option<usize>,
    ack: AckBehavior,
    opened: Vec<DeviceAddress>,
    written: Vec<(Uuid, Bytes)>,
    pending: VecDeque<Bytes>,
    closes: usize,
}

#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    link: Arc<watch::Sender<bool>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            link: Arc::new(watch::Sender::new(false)),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ack(self, ack: AckBehavior) -> Self {
        self.set_ack(ack);
        self
    }

    /// Make every `open` fail
    pub fn failing_open(self) -> Self {
        self.lock().fail_open = true;
        self
    }

    pub fn with_open_delay(self, delay: Duration) -> Self {
        self.lock().open_delay = Some(delay);
        self
    }

    /// Drop the link once `writes` packets have gone through
    pub fn dropping_after(self, writes: usize) -> Self {
        self.lock().drop_after_writes = Some(writes);
        self
    }

    pub fn set_ack(&self, ack: AckBehavior) {
        self.lock().ack = ack;
    }

    /// Simulate the robot going out of range
    pub fn drop_link(&self) {
        self.link.send_replace(false);
    }

    pub fn is_connected(&self) -> bool {
        *self.link.borrow()
    }

    /// Queue a packet as if the robot had sent it unprompted
    pub fn push_incoming(&self, frame: Bytes) {
        self.lock().pending.push_back(frame);
    }

    pub fn written_frames(&self) -> Vec<Bytes> {
        self.lock().written.iter().map(|(_, frame)| frame.clone()).collect()
    }

    pub fn written_characteristics(&self) -> Vec<Uuid> {
        self.lock().written.iter().map(|(uuid, _)| *uuid).collect()
    }

    /// Written frames decoded back into packets; undecodable frames are skipped
    pub fn written_packets(&self) -> Vec<Packet> {
        self.written_frames()
            .into_iter()
            .filter_map(|frame| packet::decode(frame).ok())
            .collect()
    }

    pub fn opened(&self) -> Vec<DeviceAddress> {
        self.lock().opened.clone()
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn respond(ack: AckBehavior, request: &Packet) -> Option<Bytes> {
    let header = request.header;
    match ack {
        AckBehavior::Respond => Some(packet::encode(&header.to_response(0), &[])),
        AckBehavior::Silent => None,
        AckBehavior::WrongSequence => {
            let response = header.to_response(0).with_sequence(header.sequence().wrapping_add(1));
            Some(packet::encode(&response, &[]))
        }
        AckBehavior::Reject(code) => Some(packet::encode(&header.to_response(code), &[])),
        AckBehavior::Corrupt => {
            let mut frame = packet::encode(&header.to_response(0), &[]).to_vec();
            let chk = frame.len() - 2;
            frame[chk] = frame[chk].wrapping_add(1);
            Some(Bytes::from(frame))
        }
    }
}

impl Transport for MockTransport {
    async fn open(&mut self, device: &DeviceRecord) -> Result<(), TransportError> {
        let delay = self.lock().open_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        if state.fail_open {
            return Err(TransportError::Other(format!("{} refused the connection", device.address())));
        }
        state.opened.push(device.address().clone());
        self.link.send_replace(true);
        Ok(())
    }

    async fn write(&mut self, characteristic: Uuid, frame: Bytes) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        let mut state = self.lock();
        if state.drop_after_writes.is_some_and(|limit| state.written.len() >= limit) {
            self.link.send_replace(false);
            return Err(TransportError::Disconnected);
        }
        debug!(bytes = hex::encode(&frame), "Mock write");
        state.written.push((characteristic, frame.clone()));

        let reply = packet::decode(frame)
            .ok()
            .filter(|request| request.header.flags().requests_response())
            .and_then(|request| respond(state.ack, &request));
        if let Some(reply) = reply {
            state.pending.push_back(reply);
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Bytes, TransportError> {
        let mut link = self.link.subscribe();
        if !*link.borrow_and_update() {
            return Err(TransportError::Disconnected);
        }
        let queued = self.lock().pending.pop_front();
        if let Some(frame) = queued {
            return Ok(frame);
        }
        // Nothing queued: wait for the link to drop, or for the caller's timeout
        let _ = link.wait_for(|up| !*up).await;
        Err(TransportError::Disconnected)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.link.send_replace(false);
        let mut state = self.lock();
        state.pending.clear();
        state.closes += 1;
        Ok(())
    }

    fn link_status(&self) -> watch::Receiver<bool> {
        self.link.subscribe()
    }
}
