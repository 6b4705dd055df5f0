//! Minimal typed publish/subscribe primitive.
//!
//! Listeners are registered per event kind and invoked synchronously, in
//! registration order, by `emit`. The registry lock is released before any
//! listener runs, so listeners may register or remove listeners themselves.

use parking_lot::Mutex;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An event that can travel over an [`EventBus`].
pub trait BusEvent: Send + Sync + 'static {
    type Kind: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by `on`/`once`, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration<E: BusEvent> {
    id: ListenerId,
    kind: E::Kind,
    once: bool,
    listener: Listener<E>,
}

pub struct EventBus<E: BusEvent> {
    registrations: Mutex<Vec<Registration<E>>>,
    next_id: AtomicU64,
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            registrations: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a persistent listener for `kind`.
    pub fn on<F>(&self, kind: E::Kind, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(listener))
    }

    /// Register a listener that is removed after its first invocation.
    pub fn once<F>(&self, kind: E::Kind, listener: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(listener))
    }

    fn register(&self, kind: E::Kind, once: bool, listener: Listener<E>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registrations.lock().push(Registration {
            id,
            kind,
            once,
            listener,
        });
        id
    }

    /// Remove a single listener. Returns false if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registrations = self.registrations.lock();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    /// Remove every listener registered for `kind`.
    pub fn off_all(&self, kind: E::Kind) -> usize {
        let mut registrations = self.registrations.lock();
        let before = registrations.len();
        registrations.retain(|r| r.kind != kind);
        before - registrations.len()
    }

    /// Deliver `event` to all current listeners of its kind. Returns how many ran.
    pub fn emit(&self, event: &E) -> usize {
        let kind = event.kind();
        let listeners: Vec<Listener<E>> = {
            let mut registrations = self.registrations.lock();
            let matching = registrations
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| Arc::clone(&r.listener))
                .collect();
            registrations.retain(|r| !(r.once && r.kind == kind));
            matching
        };

        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.registrations
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }
}
