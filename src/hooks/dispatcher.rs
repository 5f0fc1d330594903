//! In-process event dispatcher.

use crate::hooks::{EventBus, LifecycleEvent};

/// Observer of lifecycle events.
pub trait Subscriber: Send + Sync {
    fn on_event(&self, event: &mut LifecycleEvent<'_>);
}

impl<F> Subscriber for F
where
    F: Fn(&mut LifecycleEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &mut LifecycleEvent<'_>) {
        self(event)
    }
}

/// Fans each published event out to its subscribers, in subscription order.
#[derive(Default)]
pub struct Dispatcher {
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriber(mut self, subscriber: impl Subscriber + 'static) -> Self {
        self.subscribe(subscriber);
        self
    }

    pub fn subscribe(&mut self, subscriber: impl Subscriber + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus for Dispatcher {
    fn publish(&self, event: &mut LifecycleEvent<'_>) {
        for subscriber in &self.subscribers {
            subscriber.on_event(event);
        }
    }
}
