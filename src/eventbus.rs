use crate::event::ChangeEvent;
use crate::publisher::EventPublisher;
use std::collections::BTreeMap;

/// Trait for reacting to change events in-process.
pub trait ChangeListener: Send {
    fn on_change(&mut self, event: &ChangeEvent);
}

/// Determines which kinds of events a listener wants to receive.
#[derive(Debug, Clone, Copy)]
pub enum EventFilter {
    All,
    LevelsOnly,
    EncodersOnly,
    Custom(fn(&ChangeEvent) -> bool),
}

impl EventFilter {
    fn passes(&self, event: &ChangeEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::LevelsOnly => !event.is_encoder(),
            EventFilter::EncodersOnly => event.is_encoder(),
            EventFilter::Custom(f) => f(event),
        }
    }
}

/// Metadata-wrapped listener with filters and control flags.
struct ListenerEntry {
    listener: Box<dyn ChangeListener>,
    enabled: bool,
    filter: EventFilter,
    tag: Option<String>, // Only events whose source label matches
}

/// In-process fan-out publisher.
///
/// Listeners are called synchronously on the poll thread, in registration order, so they
/// must be quick. Anything slow belongs behind a
/// [`ChannelPublisher`](crate::publisher::ChannelPublisher).
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: BTreeMap<u64, ListenerEntry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener with optional filtering and tag.
    pub fn add_listener(
        &mut self,
        listener: impl ChangeListener + 'static,
        filter: EventFilter,
        tag: Option<String>,
    ) -> u64 {
        let id = self.next_id;
        self.listeners.insert(
            id,
            ListenerEntry {
                listener: Box::new(listener),
                enabled: true,
                filter,
                tag,
            },
        );
        self.next_id += 1;
        id
    }

    /// Enables a previously registered listener.
    pub fn enable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = true;
        }
    }

    /// Disables (mutes) a listener without removing it.
    pub fn disable(&mut self, id: u64) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = false;
        }
    }

    /// Unregisters a listener entirely.
    pub fn remove_listener(&mut self, id: u64) {
        self.listeners.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Emits one event to all active and matching listeners.
    fn emit(&mut self, event: &ChangeEvent) {
        let source = event.source();
        for entry in self.listeners.values_mut() {
            if !entry.enabled {
                continue;
            }

            if let Some(ref wanted) = entry.tag {
                if source != *wanted {
                    continue;
                }
            }

            if entry.filter.passes(event) {
                entry.listener.on_change(event);
            }
        }
    }

    /// Emits a batch of events to matching listeners.
    pub fn emit_all(&mut self, events: &[ChangeEvent]) {
        for event in events {
            self.emit(event);
        }
    }
}

impl EventPublisher for EventBus {
    fn publish(&mut self, event: &ChangeEvent) {
        self.emit(event);
    }
}
