//! Client session state held by the game loop.

use super::command::Command;
use bytes::Bytes;
use protocol::BinaryWriter;
use std::collections::VecDeque;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::mpsc;

/// Why a frame could not be queued for a client.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OutboxError {
    /// The client is not draining its socket fast enough.
    #[error("outbound buffer full")]
    Full,
    /// The writer task has gone away.
    #[error("connection closed")]
    Closed,
}

/// Sending half of a client's bounded outbound queue.
///
/// Sends never wait. Dropping the last `Outbox` ends the writer, which
/// closes the socket.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Bytes>,
}

impl Outbox {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }

    /// Create an outbox and the receiver its writer task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn send(&self, packet: BinaryWriter) -> Result<(), OutboxError> {
        self.send_bytes(packet.finish())
    }

    pub fn send_bytes(&self, frame: Bytes) -> Result<(), OutboxError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => OutboxError::Full,
            mpsc::error::TrySendError::Closed(_) => OutboxError::Closed,
        })
    }
}

/// A connected client session.
#[derive(Debug)]
pub struct Session {
    /// Same id as the session's [`Player`](crate::entity::Player).
    pub id: u32,
    /// Remote address, if known.
    pub addr: Option<SocketAddr>,
    outbox: Outbox,
    /// Commands waiting for the next tick.
    pub pending: VecDeque<Command>,
    /// First send failure; the session is dropped at the end of the tick.
    failure: Option<OutboxError>,
}

impl Session {
    pub fn new(id: u32, addr: Option<SocketAddr>, outbox: Outbox) -> Self {
        Self {
            id,
            addr,
            outbox,
            pending: VecDeque::new(),
            failure: None,
        }
    }

    pub fn send(&mut self, packet: BinaryWriter) {
        self.send_bytes(packet.finish());
    }

    /// Queue a frame. After the first failure every send is a no-op.
    pub fn send_bytes(&mut self, frame: Bytes) {
        if self.failure.is_some() {
            return;
        }
        if let Err(e) = self.outbox.send_bytes(frame) {
            self.failure = Some(e);
        }
    }

    pub fn failure(&self) -> Option<OutboxError> {
        self.failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::packets::build_pong;

    #[test]
    fn test_full_outbox_marks_session() {
        let (outbox, mut rx) = Outbox::channel(2);
        let mut session = Session::new(1, None, outbox);
        session.send(build_pong());
        session.send(build_pong());
        assert_eq!(session.failure(), None);
        session.send(build_pong());
        assert_eq!(session.failure(), Some(OutboxError::Full));

        // Draining does not clear the mark.
        while rx.try_recv().is_ok() {}
        session.send(build_pong());
        assert_eq!(session.failure(), Some(OutboxError::Full));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_outbox() {
        let (outbox, rx) = Outbox::channel(4);
        drop(rx);
        assert_eq!(outbox.send(build_pong()), Err(OutboxError::Closed));
    }
}
