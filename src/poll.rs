//! The poll loop: drives the engine at a fixed cadence and forwards its events.
//!
//! Single mutator: the loop owns the [`InputEngine`] outright; anything that wants to look
//! at state from another thread goes through the publisher's snapshot hand-off.

use crate::engine::InputEngine;
use crate::event::LineId;
use crate::publisher::EventPublisher;
use crate::sampler::LineSampler;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Cooperative cancellation flag, checked once per tick.
#[derive(Clone, Debug, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollStats {
    pub ticks: u64,
    pub events: u64,
}

pub struct PollLoop<S: LineSampler, P: EventPublisher> {
    engine: InputEngine<S>,
    publisher: P,
    interval: Duration,
    shutdown: Shutdown,
    reported_unreadable: BTreeSet<LineId>,
    stats: PollStats,
}

impl<S: LineSampler, P: EventPublisher> PollLoop<S, P> {
    pub fn new(
        engine: InputEngine<S>,
        publisher: P,
        interval: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            engine,
            publisher,
            interval,
            shutdown,
            reported_unreadable: BTreeSet::new(),
            stats: PollStats::default(),
        }
    }

    /// Run one iteration at `now`: sample, refresh the snapshot if anything changed, then
    /// publish in emission order. Returns the number of events published.
    ///
    /// The snapshot goes first so a subscriber joining mid-tick sees the change either in
    /// its initial state or in the stream, possibly both.
    pub fn tick(&mut self, now: Instant) -> usize {
        let events = self.engine.sample_tick(now);
        self.report_unreadable();

        if !events.is_empty() {
            self.publisher.update_snapshot(&self.engine.snapshot());
        }
        for event in &events {
            self.publisher.publish(event);
        }

        self.stats.ticks += 1;
        self.stats.events += events.len() as u64;
        events.len()
    }

    /// Poll until [`Shutdown`] is triggered, then release the lines.
    pub fn run(mut self) -> PollStats {
        self.publisher.update_snapshot(&self.engine.snapshot());
        info!(
            "Polling {} every {:?}",
            self.engine.sampler_name(),
            self.interval
        );

        while !self.shutdown.is_triggered() {
            self.tick(Instant::now());
            std::thread::sleep(self.interval);
        }

        self.engine.release();
        info!(
            "Poll loop stopped after {} tick(s), {} event(s)",
            self.stats.ticks, self.stats.events
        );
        self.stats
    }

    pub fn engine(&self) -> &InputEngine<S> {
        &self.engine
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn stats(&self) -> PollStats {
        self.stats
    }

    /// Log each line once when it becomes unreadable and once when it recovers.
    fn report_unreadable(&mut self) {
        let now = self.engine.unreadable();
        if *now == self.reported_unreadable {
            return;
        }
        for line in now.difference(&self.reported_unreadable) {
            warn!("{line} unreadable, holding last known state");
        }
        for line in self.reported_unreadable.difference(now) {
            info!("{line} readable again");
        }
        self.reported_unreadable = now.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::{VirtualLines, VirtualSampler};
    use crate::config::DeckConfig;
    use crate::event::ChangeEvent;
    use crate::snapshot::EngineSnapshot;

    #[derive(Default)]
    struct Collect {
        events: Vec<ChangeEvent>,
        snapshots: Vec<EngineSnapshot>,
        order: Vec<&'static str>,
    }

    impl EventPublisher for Collect {
        fn publish(&mut self, event: &ChangeEvent) {
            self.events.push(event.clone());
            self.order.push("event");
        }

        fn update_snapshot(&mut self, snapshot: &EngineSnapshot) {
            self.snapshots.push(snapshot.clone());
            self.order.push("snapshot");
        }
    }

    fn poll_loop(shutdown: Shutdown) -> (PollLoop<VirtualSampler, Collect>, VirtualLines) {
        let sampler = VirtualSampler::new();
        let lines = sampler.handle();
        let engine =
            InputEngine::bring_up_with_settle(&DeckConfig::default(), sampler, Duration::ZERO)
                .ok()
                .unwrap();
        (
            PollLoop::new(engine, Collect::default(), Duration::from_micros(100), shutdown),
            lines,
        )
    }

    #[test]
    fn tick_forwards_events_and_snapshot() {
        let (mut pl, lines) = poll_loop(Shutdown::new());
        let t0 = Instant::now();
        assert_eq!(pl.tick(t0), 0);
        assert!(pl.publisher().snapshots.is_empty());

        lines.set(LineId(20), false);
        assert_eq!(pl.tick(t0 + Duration::from_secs(1)), 1);
        assert_eq!(pl.publisher().events.len(), 1);
        assert_eq!(pl.publisher().snapshots.len(), 1);
        assert_eq!(pl.publisher().snapshots[0].active("blue"), Some(false));
        assert_eq!(pl.stats(), PollStats { ticks: 2, events: 1 });
    }

    #[test]
    fn snapshot_is_stored_before_events_go_out() {
        let (mut pl, lines) = poll_loop(Shutdown::new());
        let t0 = Instant::now();
        lines.set(LineId(18), false);
        lines.set_phases(LineId(5), LineId(6), (false, true));
        assert_eq!(pl.tick(t0 + Duration::from_secs(1)), 2);

        assert_eq!(pl.publisher().order, vec!["snapshot", "event", "event"]);
        let snap = &pl.publisher().snapshots[0];
        assert_eq!(snap.active("green"), Some(false));
        assert_eq!(snap.encoder(1), Some(1));
    }

    #[test]
    fn unreadable_lines_are_tracked() {
        let (mut pl, lines) = poll_loop(Shutdown::new());
        let t0 = Instant::now();
        lines.fail(LineId(21));
        pl.tick(t0);
        assert!(pl.reported_unreadable.contains(&LineId(21)));
        lines.heal(LineId(21));
        pl.tick(t0 + Duration::from_millis(1));
        assert!(pl.reported_unreadable.is_empty());
    }

    #[test]
    fn stops_when_shut_down_and_releases_lines() {
        let shutdown = Shutdown::new();
        let (pl, lines) = poll_loop(shutdown.clone());
        let trigger = shutdown.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            trigger.trigger();
        });

        let stats = pl.run();
        stopper.join().unwrap();
        assert!(stats.ticks > 0);
        assert_eq!(stats.events, 0);
        assert_eq!(lines.releases(), 1);
    }

    #[test]
    fn pre_triggered_shutdown_runs_no_ticks() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let (pl, lines) = poll_loop(shutdown);
        assert_eq!(pl.run().ticks, 0);
        assert_eq!(lines.releases(), 1);
    }
}
