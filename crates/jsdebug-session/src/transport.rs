//! Transport boundary.
//! - Transport: outgoing frames, never blocks on the peer
//! - FrameSource: deframed incoming text, pulled by the reader thread
//! - memory_transport: in-process pair for embedding and tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde_json::Value;
use smol_str::SmolStr;

use crate::error::TransportError;

/// Outgoing half of a connection.
pub trait Transport: Send + Sync {
    /// Queues one serialized frame.
    fn send_frame(&self, frame: String) -> Result<(), TransportError>;

    /// Stops accepting frames and releases the connection.
    fn close(&self);
}

/// Incoming half of a connection.
pub trait FrameSource: Send {
    /// Next deframed message; `None` once the peer has finished.
    fn next_frame(&mut self) -> Result<Option<String>, TransportError>;
}

type Incoming = Result<String, SmolStr>;

/// Creates a connected in-memory transport.
#[must_use]
pub fn memory_transport() -> (MemoryTransport, MemorySource, MemoryPeer) {
    let (outgoing_tx, outgoing_rx) = unbounded();
    let (incoming_tx, incoming_rx) = unbounded();
    let closed = Arc::new(AtomicBool::new(false));
    (
        MemoryTransport {
            outgoing: outgoing_tx,
            closed: Arc::clone(&closed),
        },
        MemorySource {
            incoming: incoming_rx,
        },
        MemoryPeer {
            outgoing: outgoing_rx,
            incoming: Mutex::new(Some(incoming_tx)),
            closed,
        },
    )
}

#[derive(Debug)]
pub struct MemoryTransport {
    outgoing: Sender<String>,
    closed: Arc<AtomicBool>,
}

impl Transport for MemoryTransport {
    fn send_frame(&self, frame: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.outgoing
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct MemorySource {
    incoming: Receiver<Incoming>,
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
        match self.incoming.recv() {
            Ok(Ok(frame)) => Ok(Some(frame)),
            Ok(Err(message)) => Err(TransportError::Framing(message)),
            Err(_) => Ok(None),
        }
    }
}

/// The remote end of a memory transport.
#[derive(Debug)]
pub struct MemoryPeer {
    outgoing: Receiver<String>,
    incoming: Mutex<Option<Sender<Incoming>>>,
    closed: Arc<AtomicBool>,
}

impl MemoryPeer {
    /// Delivers one frame to the session's reader.
    pub fn push(&self, frame: impl Into<String>) {
        if let Some(sender) = self.incoming.lock().as_ref() {
            let _ = sender.send(Ok(frame.into()));
        }
    }

    pub fn push_json(&self, frame: &Value) {
        self.push(frame.to_string());
    }

    /// Makes the reader see a transport failure.
    pub fn fail(&self, message: impl Into<SmolStr>) {
        if let Some(sender) = self.incoming.lock().as_ref() {
            let _ = sender.send(Err(message.into()));
        }
    }

    /// Ends the incoming stream.
    pub fn disconnect(&self) {
        self.incoming.lock().take();
    }

    /// Frames sent by the session so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<Value> {
        self.outgoing
            .try_iter()
            .filter_map(|frame| serde_json::from_str(&frame).ok())
            .collect()
    }

    /// Waits for the next frame sent by the session.
    #[must_use]
    pub fn next_sent(&self, timeout: Duration) -> Option<Value> {
        match self.outgoing.recv_timeout(timeout) {
            Ok(frame) => serde_json::from_str(&frame).ok(),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
