//! JSON-lines TCP event server.
//!
//! Each connected client first receives one `initial_state` line, then every change event
//! as it is published. The poll thread only ever does a non-blocking
//! `broadcast::Sender::send`; a client that falls behind by more than the channel capacity
//! skips the missed events, and a client that stops reading is disconnected after
//! [`WRITE_TIMEOUT`]. Sampling is never held back by a subscriber.

use crate::event::ChangeEvent;
use crate::publisher::EventPublisher;
use crate::snapshot::{EngineSnapshot, SharedSnapshot};
use crate::wire::{WallClock, WireEvent};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Longest a single write to one client may take before it is dropped.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

type Line = Arc<str>;

/// Create the poll-side publisher and the server-side feed sharing one broadcast channel.
pub fn event_channel(capacity: usize, clock: WallClock) -> (BroadcastPublisher, EventFeed) {
    let (tx, _) = broadcast::channel(capacity.max(1));
    let snapshot = SharedSnapshot::default();
    (
        BroadcastPublisher {
            tx: tx.clone(),
            snapshot: snapshot.clone(),
            clock,
        },
        EventFeed {
            tx,
            snapshot,
            clock,
        },
    )
}

/// Poll-thread end: encodes events and broadcasts them to connected clients.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Line>,
    snapshot: SharedSnapshot,
    clock: WallClock,
}

impl BroadcastPublisher {
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&mut self, event: &ChangeEvent) {
        let wire = WireEvent::from_change(event, &self.clock);
        match wire.encode_line() {
            // An error here only means nobody is connected.
            Ok(line) => {
                let _ = self.tx.send(Line::from(line));
            }
            Err(e) => warn!("Dropping {}: {e}", wire.name()),
        }
    }

    fn update_snapshot(&mut self, snapshot: &EngineSnapshot) {
        self.snapshot.store(snapshot.clone());
    }
}

/// Server end: hands out subscriptions with a matching `initial_state` line.
#[derive(Clone)]
pub struct EventFeed {
    tx: broadcast::Sender<Line>,
    snapshot: SharedSnapshot,
    clock: WallClock,
}

impl EventFeed {
    /// Subscribe, then render the current state.
    ///
    /// The poll side stores the snapshot before it publishes that tick's events, so every
    /// change reaches the subscriber through the initial state, the stream, or both.
    pub fn subscribe(&self) -> (String, broadcast::Receiver<Line>) {
        let rx = self.tx.subscribe();
        let now = self.clock.timestamp(std::time::Instant::now());
        let initial = WireEvent::initial_state(&self.snapshot.load(), now)
            .encode_line()
            .unwrap_or_default();
        (initial, rx)
    }
}

pub struct EventServer {
    listener: TcpListener,
    feed: EventFeed,
}

impl EventServer {
    pub async fn bind(addr: SocketAddr, feed: EventFeed) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(Self { listener, feed })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients forever.
    pub async fn serve(self) -> io::Result<()> {
        loop {
            let (socket, peer) = self.listener.accept().await?;
            info!("Client connected: {}", peer);

            let feed = self.feed.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_client(socket, peer, feed).await {
                    error!("Client {} error: {:?}", peer, e);
                }
            });
        }
    }
}

async fn handle_client(
    mut socket: TcpStream,
    peer: SocketAddr,
    feed: EventFeed,
) -> io::Result<()> {
    let (initial, mut rx) = feed.subscribe();
    write_line(&mut socket, &initial).await?;

    loop {
        match rx.recv().await {
            Ok(line) => {
                if let Err(e) = write_line(&mut socket, &line).await {
                    info!("Client {} disconnected: {}", peer, e);
                    return Ok(());
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Client {} lagging, skipped {} event(s)", peer, skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Event feed closed, dropping {}", peer);
                return Ok(());
            }
        }
    }
}

async fn write_line(socket: &mut TcpStream, line: &str) -> io::Result<()> {
    match tokio::time::timeout(WRITE_TIMEOUT, socket.write_all(line.as_bytes())).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
    }
}
