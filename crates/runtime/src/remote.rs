//! Reliable, ordered channel for remote record mutations.
//!
//! Requests may arrive at any time from any task; the simulation drains them
//! only at tick boundaries, in delivery order.

use tokio::sync::{mpsc, oneshot};

use netmod_core::{EntityId, ModConfig, Record};

use crate::api::{Result, RuntimeError};
use crate::world::RecordAddress;

pub type RecordBytes = [u8; ModConfig::RECORD_SIZE];

/// One mutation received from a peer.
#[derive(Debug)]
pub enum RemoteRequest {
    /// Attach a record to `target`. The reply carries the record's address,
    /// the address of the instance it was combined into, or `None` if it
    /// was rejected.
    Add {
        target: EntityId,
        bytes: RecordBytes,
        reply: Option<oneshot::Sender<Option<RecordAddress>>>,
    },
    /// Overwrite the record at `address`.
    Update {
        address: RecordAddress,
        bytes: RecordBytes,
    },
    /// Invalidate the record at `address`.
    Remove { address: RecordAddress },
}

/// Cloneable sending half handed to the transport layer.
#[derive(Clone, Debug)]
pub struct RemoteSender {
    tx: mpsc::UnboundedSender<RemoteRequest>,
}

impl RemoteSender {
    pub fn request_add(&self, target: EntityId, bytes: &[u8]) -> Result<()> {
        let bytes = wire_bytes(bytes)?;
        self.send(RemoteRequest::Add {
            target,
            bytes,
            reply: None,
        })
    }

    /// Like [`request_add`](Self::request_add), resolving once the request was applied.
    pub fn request_add_with_reply(
        &self,
        target: EntityId,
        bytes: &[u8],
    ) -> Result<oneshot::Receiver<Option<RecordAddress>>> {
        let bytes = wire_bytes(bytes)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RemoteRequest::Add {
            target,
            bytes,
            reply: Some(reply_tx),
        })?;
        Ok(reply_rx)
    }

    pub fn request_update(&self, address: RecordAddress, bytes: &[u8]) -> Result<()> {
        let bytes = wire_bytes(bytes)?;
        self.send(RemoteRequest::Update { address, bytes })
    }

    pub fn request_remove(&self, address: RecordAddress) -> Result<()> {
        self.send(RemoteRequest::Remove { address })
    }

    fn send(&self, request: RemoteRequest) -> Result<()> {
        self.tx
            .send(request)
            .map_err(|_| RuntimeError::RemoteChannelClosed)
    }
}

/// Receiving half owned by the simulation.
#[derive(Debug)]
pub(crate) struct RemoteInbox {
    rx: mpsc::UnboundedReceiver<RemoteRequest>,
}

impl RemoteInbox {
    /// Everything delivered so far, oldest first.
    pub(crate) fn drain(&mut self) -> Vec<RemoteRequest> {
        let mut requests = Vec::new();
        while let Ok(request) = self.rx.try_recv() {
            requests.push(request);
        }
        requests
    }
}

pub(crate) fn channel() -> (RemoteSender, RemoteInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RemoteSender { tx }, RemoteInbox { rx })
}

fn wire_bytes(bytes: &[u8]) -> Result<RecordBytes> {
    Ok(Record::try_from_slice(bytes)?.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_delivery_order() {
        let (sender, mut inbox) = channel();
        let bytes = Record::EMPTY.to_bytes();
        sender.request_add(EntityId(4), &bytes).unwrap();
        sender.request_add(EntityId(7), &bytes).unwrap();

        let targets: Vec<EntityId> = inbox
            .drain()
            .into_iter()
            .filter_map(|request| match request {
                RemoteRequest::Add { target, .. } => Some(target),
                _ => None,
            })
            .collect();
        assert_eq!(targets, vec![EntityId(4), EntityId(7)]);
        assert!(inbox.drain().is_empty());
    }

    #[test]
    fn closed_inbox_is_reported() {
        let (sender, inbox) = channel();
        drop(inbox);
        assert!(matches!(
            sender.request_add(EntityId(0), &Record::EMPTY.to_bytes()),
            Err(RuntimeError::RemoteChannelClosed)
        ));
    }
}
