//! Event publisher port

use domain::RuntimeEvent;
#[cfg(test)]
use mockall::automock;

/// Port for emitting events to listeners
#[cfg_attr(test, automock)]
pub trait EventPublisher: Send + Sync {
    /// Publish an event; publishing never fails
    fn publish(&self, event: RuntimeEvent);
}

/// Publisher that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventPublisher;

impl EventPublisher for NoopEventPublisher {
    fn publish(&self, _event: RuntimeEvent) {}
}
