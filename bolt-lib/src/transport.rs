//! The boundary between the protocol layer and the radio.
//!
//! A [`Transport`] is one link to one robot. The session is its only user, so
//! implementations do not need any internal locking for writes.

use crate::device::DeviceRecord;
use bytes::Bytes;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use uuid::Uuid;

pub mod mock;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Link to the robot was dropped")]
    Disconnected,

    #[error("Characteristic {0} not found on the robot")]
    CharacteristicNotFound(Uuid),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

pub trait Transport: Send + Sync {
    /// Establish the link and resolve the command characteristic.
    fn open(&mut self, device: &DeviceRecord) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Write one framed packet to `characteristic`.
    fn write(&mut self, characteristic: Uuid, frame: Bytes) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next packet the robot sends back.
    ///
    /// Returns `TransportError::Disconnected` once the link is gone.
    fn recv(&mut self) -> impl Future<Output = Result<Bytes, TransportError>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Follow the link: `true` while it is up, `false` once it drops for any
    /// reason, including the robot going away on its own.
    fn link_status(&self) -> watch::Receiver<bool>;
}
