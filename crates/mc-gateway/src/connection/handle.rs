//! Handle to one client connection
//!
//! The transport owns the socket. Everything else (the dispatcher, the
//! correlator) only holds a `ConnectionHandle`, which queues outbound
//! frames for the connection's writer task and knows whether the
//! connection is still open.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mc_core::ConnectionId;
use mc_protocol::Response;

/// Frame queued for a connection's writer task
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Send a reply
    Reply(Response),
    /// Send a close frame and stop writing
    Close,
}

/// Cheaply cloneable handle to an open (or recently closed) connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle that writes into `outbound`
    pub fn new(id: ConnectionId, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                id,
                outbound,
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Create a handle together with the receiving end of its queue
    pub fn channel(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(id, tx), rx)
    }

    /// Connection identifier
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Whether the connection is still accepting replies
    pub fn is_open(&self) -> bool {
        !self.inner.closed.is_cancelled() && !self.inner.outbound.is_closed()
    }

    /// Queue a reply. Returns `false` if the connection is already closed,
    /// in which case the reply is dropped.
    pub fn deliver(&self, response: Response) -> bool {
        if !self.is_open() {
            return false;
        }
        self.inner.outbound.send(Outbound::Reply(response)).is_ok()
    }

    /// Queue a close frame after any replies already queued
    pub fn request_close(&self) {
        let _ = self.inner.outbound.send(Outbound::Close);
    }

    /// Mark the connection closed; later deliveries are dropped
    pub fn mark_closed(&self) {
        self.inner.closed.cancel();
    }

    /// Token cancelled once the connection is closed
    pub fn closed_token(&self) -> CancellationToken {
        self.inner.closed.clone()
    }
}
