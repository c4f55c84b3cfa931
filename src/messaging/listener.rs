// Listener registration and synchronous notification
//
// Every mutable entity owns a shared ListenerSet. Views register weakly: the
// entity never keeps a view alive. Notification snapshots the current list
// before calling anyone, so callbacks may add or remove listeners (including
// themselves) on the very set that is notifying them.

use crate::command::ObjectRef;
use crate::messaging::notification::{Change, ChangeExtra};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Receiver of entity change notifications
pub trait Listener {
    /// Called after the change has been applied, on the mutating thread
    fn on_state_changed(&self, source: &ObjectRef, change: Change, extra: Option<&ChangeExtra>);
}

/// Token identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered set of weakly-held listeners
#[derive(Default)]
pub struct ListenerSet {
    entries: RefCell<Vec<(ListenerId, Weak<dyn Listener>)>>,
    next_id: Cell<u64>,
}

impl ListenerSet {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Register a listener; it stays registered until removed or dropped
    pub fn add(&self, listener: &Rc<dyn Listener>) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries
            .borrow_mut()
            .push((id, Rc::downgrade(listener)));
        id
    }

    /// Register a listener and get a guard that deregisters it on drop
    pub fn subscribe(self: &Rc<Self>, listener: &Rc<dyn Listener>) -> Subscription {
        let id = self.add(listener);
        Subscription {
            set: Rc::downgrade(self),
            id,
        }
    }

    /// Remove a registration; returns false if it was already gone
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Number of registrations whose listener is still alive
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every live listener in registration order
    pub fn notify(&self, source: &ObjectRef, change: Change, extra: Option<&ChangeExtra>) {
        let snapshot: Vec<(ListenerId, Weak<dyn Listener>)> = {
            let mut entries = self.entries.borrow_mut();
            entries.retain(|(_, weak)| weak.strong_count() > 0);
            entries.clone()
        };

        for (id, weak) in snapshot {
            // Skip listeners removed by an earlier callback of this round
            let still_registered = self
                .entries
                .borrow()
                .iter()
                .any(|(entry_id, _)| *entry_id == id);
            if !still_registered {
                continue;
            }
            if let Some(listener) = weak.upgrade() {
                listener.on_state_changed(source, change, extra);
            }
        }
    }

    /// Drop every registration
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Registration guard; deregisters from its set when dropped
#[must_use = "dropping a Subscription deregisters the listener immediately"]
pub struct Subscription {
    set: Weak<ListenerSet>,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Deregister now
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }
}

/// Listener that records every notification it receives
///
/// Useful for views that poll, and for tests.
#[derive(Default)]
pub struct ChangeRecorder {
    received: RefCell<Vec<(ObjectRef, Change, Option<ChangeExtra>)>>,
}

impl ChangeRecorder {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn changes(&self) -> Vec<(ObjectRef, Change, Option<ChangeExtra>)> {
        self.received.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<Change> {
        self.received.borrow().iter().map(|(_, c, _)| *c).collect()
    }

    pub fn clear(&self) {
        self.received.borrow_mut().clear();
    }
}

impl Listener for ChangeRecorder {
    fn on_state_changed(&self, source: &ObjectRef, change: Change, extra: Option<&ChangeExtra>) {
        self.received
            .borrow_mut()
            .push((source.clone(), change, extra.cloned()));
    }
}
