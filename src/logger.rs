use crate::event::ChangeEvent;
use crate::eventbus::ChangeListener;
use tracing::info;

/// A listener that logs every change event through `tracing`.
#[derive(Debug, Default)]
pub struct LogListener;

impl LogListener {
    pub fn new() -> Self {
        LogListener
    }
}

impl ChangeListener for LogListener {
    fn on_change(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::InputLevelChanged { id, active, .. } => {
                info!("{id}: {}", if *active { "active" } else { "inactive" });
            }
            ChangeEvent::EncoderMoved {
                id, value, delta, ..
            } => {
                info!("encoder {id}: {value:3} ({delta:+})");
            }
            ChangeEvent::EncoderButtonPressed { id, .. } => {
                info!("encoder {id}: button pressed, counter reset");
            }
        }
    }
}
