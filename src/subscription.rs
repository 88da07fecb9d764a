//! Notifications with explicit subscription tokens
//!
//! A [`Notification`] is the event source a collaborator exposes ("build
//! finished", "discovery finished"). Subscribing returns a [`Subscription`]
//! token; dropping or unsubscribing the token removes the handler.
//!
//! - `subscribe`: persistent handler, runs on every `fire`
//! - `subscribe_once`: removed from the registry before it runs, so it can run
//!   at most once no matter how often the notification fires
//!
//! Handlers run on the thread that calls `fire`, outside the registry lock, so
//! they may subscribe or unsubscribe freely.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type SharedHandler<T> = Arc<dyn Fn(&T) + Send + Sync>;
type OnceHandler<T> = Box<dyn FnOnce(&T) + Send>;

enum Slot<T> {
    Persistent(SharedHandler<T>),
    Once(OnceHandler<T>),
}

struct Registry<T> {
    next_id: u64,
    slots: Vec<(u64, Slot<T>)>,
}

impl<T> Registry<T> {
    fn insert(&mut self, slot: Slot<T>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.push((id, slot));
        id
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(slot_id, _)| *slot_id != id);
        self.slots.len() != before
    }
}

/// Multi-subscriber event source
pub struct Notification<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Clone for Notification<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T: 'static> Default for Notification<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Notification<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                slots: Vec::new(),
            })),
        }
    }

    /// Register a handler for every future `fire`
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self
            .registry
            .lock()
            .insert(Slot::Persistent(Arc::new(handler)));
        self.token(id)
    }

    /// Register a handler for the next `fire` only
    pub fn subscribe_once<F>(&self, handler: F) -> Subscription
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let id = self.registry.lock().insert(Slot::Once(Box::new(handler)));
        self.token(id)
    }

    /// Deliver `value` to every current subscriber; returns how many ran
    pub fn fire(&self, value: &T) -> usize {
        let due: Vec<Slot<T>> = {
            let mut registry = self.registry.lock();
            let mut due = Vec::with_capacity(registry.slots.len());
            let mut kept = Vec::with_capacity(registry.slots.len());
            for (id, slot) in registry.slots.drain(..) {
                match slot {
                    Slot::Persistent(handler) => {
                        due.push(Slot::Persistent(Arc::clone(&handler)));
                        kept.push((id, Slot::Persistent(handler)));
                    }
                    once @ Slot::Once(_) => due.push(once),
                }
            }
            registry.slots = kept;
            due
        };

        let count = due.len();
        for slot in due {
            match slot {
                Slot::Persistent(handler) => handler(value),
                Slot::Once(handler) => handler(value),
            }
        }
        count
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().slots.len()
    }

    fn token(&self, id: u64) -> Subscription {
        let weak: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            id,
            remove: Some(Box::new(move || {
                weak.upgrade()
                    .map(|registry| registry.lock().remove(id))
                    .unwrap_or(false)
            })),
        }
    }
}

impl<T> fmt::Debug for Notification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("subscribers", &self.registry.lock().slots.len())
            .finish()
    }
}

/// Owned registration; unsubscribes on drop
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    remove: Option<Box<dyn FnOnce() -> bool + Send>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the handler; returns false if it was already gone (fired once or
    /// notification dropped)
    pub fn unsubscribe(mut self) -> bool {
        self.remove.take().map(|remove| remove()).unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let c = Arc::new(AtomicUsize::new(0));
        (c.clone(), c)
    }

    #[test]
    fn persistent_handler_runs_every_time() {
        let n: Notification<u32> = Notification::new();
        let (count, inner) = counter();
        let _sub = n.subscribe(move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });

        n.fire(&1);
        n.fire(&2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn once_handler_runs_at_most_once() {
        let n: Notification<u32> = Notification::new();
        let (count, inner) = counter();
        let _sub = n.subscribe_once(move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(n.fire(&1), 1);
        assert_eq!(n.fire(&2), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(n.subscriber_count(), 0);
    }

    #[test]
    fn dropping_token_unsubscribes() {
        let n: Notification<u32> = Notification::new();
        let (count, inner) = counter();
        let sub = n.subscribe(move |_| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        drop(sub);

        n.fire(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_after_fire_reports_gone() {
        let n: Notification<u32> = Notification::new();
        let sub = n.subscribe_once(|_| {});
        n.fire(&1);
        assert!(!sub.unsubscribe());

        let sub = n.subscribe_once(|_| {});
        assert!(sub.unsubscribe());
    }

    #[test]
    fn handler_may_subscribe_while_firing() {
        let n: Notification<u32> = Notification::new();
        let n2 = n.clone();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot2 = slot.clone();
        let _sub = n.subscribe_once(move |_| {
            *slot2.lock() = Some(n2.subscribe_once(|_| {}));
        });

        assert_eq!(n.fire(&1), 1);
        assert_eq!(n.subscriber_count(), 1);
        assert_eq!(n.fire(&2), 1);
    }

    #[test]
    fn values_reach_handlers() {
        let n: Notification<String> = Notification::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let _sub = n.subscribe(move |v: &String| seen2.lock().push(v.clone()));

        n.fire(&"a".to_string());
        n.fire(&"b".to_string());
        assert_eq!(*seen.lock(), vec!["a", "b"]);
    }
}
