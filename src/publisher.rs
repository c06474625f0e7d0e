//! The hand-off point between the poll loop and whatever delivers events.
//!
//! Publishing is fire-and-forget: a publisher that cannot deliver drops the event and
//! keeps count, it never blocks or fails the caller.

use crate::error::PublishError;
use crate::event::ChangeEvent;
use crate::snapshot::EngineSnapshot;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use tracing::debug;

/// Receives every event the poll loop produces, in emission order.
pub trait EventPublisher {
    fn publish(&mut self, event: &ChangeEvent);

    /// Latest full state, for publishers that replay it to new subscribers.
    fn update_snapshot(&mut self, _snapshot: &EngineSnapshot) {}
}

impl<P: EventPublisher + ?Sized> EventPublisher for Box<P> {
    fn publish(&mut self, event: &ChangeEvent) {
        (**self).publish(event)
    }

    fn update_snapshot(&mut self, snapshot: &EngineSnapshot) {
        (**self).update_snapshot(snapshot)
    }
}

/// Forwards events over a bounded channel to another thread.
///
/// When the buffer is full or the receiver is gone the event is dropped.
pub struct ChannelPublisher {
    tx: SyncSender<ChangeEvent>,
    dropped: u64,
}

impl ChannelPublisher {
    /// Create a publisher and its receiving end with room for `capacity` events.
    pub fn bounded(capacity: usize) -> (Self, Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (Self { tx, dropped: 0 }, rx)
    }

    /// Events dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn try_send(&self, event: &ChangeEvent) -> Result<(), PublishError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Full(_) => PublishError::Full,
            TrySendError::Disconnected(_) => PublishError::Closed,
        })
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&mut self, event: &ChangeEvent) {
        if let Err(e) = self.try_send(event) {
            self.dropped += 1;
            debug!("Dropped {} event: {e}", event.source());
        }
    }
}
