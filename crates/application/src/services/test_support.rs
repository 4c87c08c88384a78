//! Shared test doubles for service tests

use std::sync::Arc;

use domain::RuntimeEvent;
use parking_lot::Mutex;

use crate::ports::EventPublisher;

/// Publisher that records every event
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<RuntimeEvent>>,
}

impl RecordingPublisher {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<RuntimeEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: RuntimeEvent) {
        self.events.lock().push(event);
    }
}
