//! Lifecycle events emitted by a view's update cycle.
//!
//! | event             | when                                              | cancelable |
//! |-------------------|---------------------------------------------------|------------|
//! | `will:update`     | before the cycle validates or renders anything    | yes        |
//! | `did:create`      | once, after the first successful cycle            | no         |
//! | `did:update`      | after every successful cycle                      | no         |
//! | `rejected:update` | after every failed or canceled cycle              | no         |
//!
//! A `will:update` listener cancels the cycle by returning
//! [`ControlFlow::Break`] with a reason. Listeners are plain callbacks;
//! a panicking listener never leaves the scheduler in a broken state.

use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{UpdateError, panic_message};
use crate::group::Groups;

/// The kinds of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventKind {
    /// Emitted before a cycle starts.
    WillUpdate,
    /// Emitted after a cycle succeeds.
    DidUpdate,
    /// Emitted after a cycle fails.
    RejectedUpdate,
    /// Emitted once, when the view first produces its DOM node.
    DidCreate,
}

impl EventKind {
    /// Returns the event's type name, such as `"will:update"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WillUpdate => "will:update",
            Self::DidUpdate => "did:update",
            Self::RejectedUpdate => "rejected:update",
            Self::DidCreate => "did:create",
        }
    }

    /// Returns `true` for events whose listeners may cancel the cycle.
    #[must_use]
    pub const fn is_cancelable(self) -> bool {
        matches!(self, Self::WillUpdate)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the `will:update` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WillUpdate {
    dirty: Groups,
}

impl WillUpdate {
    pub(crate) const fn new(dirty: Groups) -> Self {
        Self { dirty }
    }

    /// The groups that are dirty as the cycle starts.
    #[must_use]
    pub const fn dirty(&self) -> Groups {
        self.dirty
    }
}

/// Identifies a registered listener so it can be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Listeners<A: ?Sized, R> {
    entries: RefCell<Vec<(ListenerId, Rc<dyn Fn(&A) -> R>)>>,
}

impl<A: ?Sized, R> Listeners<A, R> {
    const fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, id: ListenerId, listener: Rc<dyn Fn(&A) -> R>) {
        self.entries.borrow_mut().push((id, listener));
    }

    fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    // Emission walks a copy so listeners can (un)register while it runs.
    fn snapshot(&self) -> Vec<Rc<dyn Fn(&A) -> R>> {
        self.entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect()
    }

    fn emit_all(&self, kind: EventKind, arg: &A)
    where
        R: 'static,
    {
        for listener in self.snapshot() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(arg))) {
                tracing::error!(
                    event = kind.as_str(),
                    panic = %panic_message(&*payload),
                    "lifecycle listener panicked"
                );
            }
        }
    }
}

/// The lifecycle event bus of one view.
pub struct LifecycleEvents<N> {
    next_id: Cell<u64>,
    will_update: Listeners<WillUpdate, ControlFlow<String>>,
    did_update: Listeners<(), ()>,
    rejected_update: Listeners<UpdateError, ()>,
    did_create: Listeners<N, ()>,
}

impl<N: 'static> LifecycleEvents<N> {
    /// Creates a bus with no listeners.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            will_update: Listeners::new(),
            did_update: Listeners::new(),
            rejected_update: Listeners::new(),
            did_create: Listeners::new(),
        }
    }

    fn next_id(&self) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ListenerId(id)
    }

    /// Listens to `will:update`. Returning [`ControlFlow::Break`] cancels the cycle.
    pub fn on_will_update(
        &self,
        listener: impl Fn(&WillUpdate) -> ControlFlow<String> + 'static,
    ) -> ListenerId {
        let id = self.next_id();
        self.will_update.push(id, Rc::new(listener));
        id
    }

    /// Listens to `did:update`.
    pub fn on_did_update(&self, listener: impl Fn() + 'static) -> ListenerId {
        let id = self.next_id();
        self.did_update.push(id, Rc::new(move |(): &()| listener()));
        id
    }

    /// Listens to `rejected:update`.
    pub fn on_rejected_update(&self, listener: impl Fn(&UpdateError) + 'static) -> ListenerId {
        let id = self.next_id();
        self.rejected_update.push(id, Rc::new(listener));
        id
    }

    /// Listens to `did:create`, which receives the view's DOM node.
    pub fn on_did_create(&self, listener: impl Fn(&N) + 'static) -> ListenerId {
        let id = self.next_id();
        self.did_create.push(id, Rc::new(listener));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        self.will_update.remove(id)
            || self.did_update.remove(id)
            || self.rejected_update.remove(id)
            || self.did_create.remove(id)
    }

    /// Returns `true` if anyone listens to `kind`.
    #[must_use]
    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listener_count(kind) > 0
    }

    /// Returns how many listeners `kind` has.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::WillUpdate => self.will_update.len(),
            EventKind::DidUpdate => self.did_update.len(),
            EventKind::RejectedUpdate => self.rejected_update.len(),
            EventKind::DidCreate => self.did_create.len(),
        }
    }

    /// Emits `will:update`, stopping at the first listener that cancels.
    ///
    /// A listener that panics cancels the cycle with the panic message as reason.
    pub(crate) fn emit_will_update(&self, event: &WillUpdate) -> ControlFlow<String> {
        if self.will_update.is_empty() {
            return ControlFlow::Continue(());
        }
        for listener in self.will_update.snapshot() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(ControlFlow::Continue(())) => {}
                Ok(ControlFlow::Break(reason)) => return ControlFlow::Break(reason),
                Err(payload) => {
                    let reason = panic_message(&*payload);
                    tracing::warn!(%reason, "will:update listener panicked; canceling update");
                    return ControlFlow::Break(reason);
                }
            }
        }
        ControlFlow::Continue(())
    }

    pub(crate) fn emit_did_update(&self) {
        self.did_update.emit_all(EventKind::DidUpdate, &());
    }

    pub(crate) fn emit_rejected_update(&self, error: &UpdateError) {
        self.rejected_update.emit_all(EventKind::RejectedUpdate, error);
    }

    pub(crate) fn emit_did_create(&self, node: &N) {
        self.did_create.emit_all(EventKind::DidCreate, node);
    }
}

impl<N: 'static> Default for LifecycleEvents<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> fmt::Debug for LifecycleEvents<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEvents")
            .field("will_update", &self.will_update.entries.borrow().len())
            .field("did_update", &self.did_update.entries.borrow().len())
            .field("rejected_update", &self.rejected_update.entries.borrow().len())
            .field("did_create", &self.did_create.entries.borrow().len())
            .finish()
    }
}
