//! Transport channel to the game authority.
//!
//! [`Transport`] is the seam the dispatcher emits through; it must return
//! immediately and deliver in FIFO order. Inbound traffic arrives separately
//! as a stream of [`TransportEvent`]s.
//!
//! [`channel`] builds an in-process transport on tokio mpsc channels. The
//! [`RemoteEnd`] stands in for the network side: an adapter for a real socket
//! pumps frames through it, and tests drive it directly.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::WireEvent;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,
}

/// What the transport reports to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Connection (re-)established.
    Connected,

    /// A named event from the authority.
    Message(WireEvent),

    /// Connection lost.
    Disconnected { reason: Option<String> },
}

/// Outbound half of a connection.
pub trait Transport {
    /// Queue an event for the authority without waiting.
    fn emit(&mut self, event: WireEvent) -> Result<(), TransportError>;

    /// Close the connection. Calling it twice is harmless.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Client side of an in-process transport.
#[derive(Debug)]
pub struct ChannelTransport {
    outbound: Option<mpsc::UnboundedSender<WireEvent>>,
}

impl Transport for ChannelTransport {
    fn emit(&mut self, event: WireEvent) -> Result<(), TransportError> {
        let sender = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        sender.send(event).map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        self.outbound = None;
    }

    fn is_open(&self) -> bool {
        self.outbound
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }
}

/// Network side of an in-process transport.
#[derive(Debug)]
pub struct RemoteEnd {
    outbound: mpsc::UnboundedReceiver<WireEvent>,
    inbound: mpsc::UnboundedSender<TransportEvent>,
}

impl RemoteEnd {
    /// Report the connection as up.
    pub fn connect(&self) -> Result<(), TransportError> {
        self.push(TransportEvent::Connected)
    }

    /// Deliver a named event to the client.
    pub fn send(&self, name: &str, data: serde_json::Value) -> Result<(), TransportError> {
        self.push(TransportEvent::Message(WireEvent::new(name, data)))
    }

    /// Report the connection as lost.
    pub fn disconnect(&self, reason: Option<String>) -> Result<(), TransportError> {
        self.push(TransportEvent::Disconnected { reason })
    }

    /// Next intent the client emitted, if one is queued.
    pub fn try_next(&mut self) -> Option<WireEvent> {
        self.outbound.try_recv().ok()
    }

    /// Wait for the next intent. `None` once the client closed.
    pub async fn next(&mut self) -> Option<WireEvent> {
        self.outbound.recv().await
    }

    /// Everything the client emitted so far.
    pub fn drain(&mut self) -> Vec<WireEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    fn push(&self, event: TransportEvent) -> Result<(), TransportError> {
        self.inbound.send(event).map_err(|_| TransportError::Closed)
    }
}

/// Build a connected transport pair.
///
/// Returns the client's outbound half, the client's inbound event stream, and
/// the network side.
pub fn channel() -> (
    ChannelTransport,
    mpsc::UnboundedReceiver<TransportEvent>,
    RemoteEnd,
) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

    let transport = ChannelTransport {
        outbound: Some(outbound_tx),
    };
    let remote = RemoteEnd {
        outbound: outbound_rx,
        inbound: inbound_tx,
    };
    (transport, inbound_rx, remote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_emit_is_fifo() {
        let (mut transport, _inbound, mut remote) = channel();
        transport.emit(WireEvent::new("a", json!(1))).unwrap();
        transport.emit(WireEvent::new("b", json!(2))).unwrap();

        let names: Vec<String> = remote.drain().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(remote.try_next().is_none());
    }

    #[test]
    fn test_close() {
        let (mut transport, _inbound, _remote) = channel();
        assert!(transport.is_open());

        transport.close();
        transport.close();
        assert!(!transport.is_open());
        assert_eq!(
            transport.emit(WireEvent::new("a", json!(null))),
            Err(TransportError::Closed)
        );
    }

    #[test]
    fn test_remote_dropped() {
        let (mut transport, _inbound, remote) = channel();
        drop(remote);
        assert!(!transport.is_open());
        assert_eq!(
            transport.emit(WireEvent::new("a", json!(null))),
            Err(TransportError::Closed)
        );
    }

    #[test]
    fn test_inbound_delivery() {
        let (_transport, mut inbound, remote) = channel();
        remote.connect().unwrap();
        remote.send("error", json!("nope")).unwrap();
        remote.disconnect(None).unwrap();

        assert_eq!(inbound.try_recv().unwrap(), TransportEvent::Connected);
        assert!(matches!(inbound.try_recv().unwrap(), TransportEvent::Message(e) if e.name == "error"));
        assert_eq!(
            inbound.try_recv().unwrap(),
            TransportEvent::Disconnected { reason: None }
        );
    }
}
