//! Observer registration for display and log sinks.
//!
//! Core components never talk to a UI directly. They emit [`Event`]s to an [`Observers`]
//! registry, and anything that implements [`Observer`] (closures included) can subscribe.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::sequence::Preset;
use crate::types::{ConnectionState, Joint, SequenceState, Severity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    JointChanged { joint: Joint, angle: i32 },
    ConnectionChanged(ConnectionState),
    Log { message: String, severity: Severity },
    SequenceChanged { preset: Preset, state: SequenceState },
}

pub trait Observer: Send + Sync {
    fn notify(&self, event: &Event);
}

impl<F> Observer for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn notify(&self, event: &Event) {
        self(event)
    }
}

#[derive(Default)]
pub struct Observers {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn Observer>) {
        self.observers.write().push(observer);
    }

    /// Delivers `event` synchronously to every observer. No lock is held while observers run.
    pub fn emit(&self, event: Event) {
        let observers = self.observers.read().clone();
        for observer in observers {
            observer.notify(&event);
        }
    }

    /// Emits a log event and mirrors it to the `log` facade.
    pub fn log(&self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        log::log!(severity.level(), "{}", message);
        self.emit(Event::Log { message, severity });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn every_subscriber_sees_events_in_order() {
        let observers = Observers::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let sink = first.clone();
        observers.subscribe(Arc::new(move |e: &Event| sink.lock().push(e.clone())));
        let sink = second.clone();
        observers.subscribe(Arc::new(move |e: &Event| sink.lock().push(e.clone())));

        observers.emit(Event::ConnectionChanged(ConnectionState::Connecting));
        observers.log("hello", Severity::Success);

        let expected = vec![
            Event::ConnectionChanged(ConnectionState::Connecting),
            Event::Log {
                message: "hello".into(),
                severity: Severity::Success,
            },
        ];
        assert_eq!(*first.lock(), expected);
        assert_eq!(*second.lock(), expected);
    }

    #[test]
    fn observer_may_subscribe_from_inside_notify() {
        let observers = Arc::new(Observers::new());
        let registry = observers.clone();
        observers.subscribe(Arc::new(move |_: &Event| {
            registry.subscribe(Arc::new(|_: &Event| {}));
        }));
        observers.emit(Event::ConnectionChanged(ConnectionState::Connected));
        assert_eq!(observers.observers.read().len(), 2);
    }
}
