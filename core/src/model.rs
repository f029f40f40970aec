//! The model side of a view.
//!
//! A view only needs three things from its model: a way to validate it, a way
//! to be told which properties changed, and a way to read properties by name.
//! [`Model`] captures exactly that; [`Changeset`] describes one change
//! notification and [`Watchers`] is a ready-made listener list for model
//! implementations.

use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use core::fmt;

use serde_json::Value;

/// An observable visualization model.
pub trait Model: 'static {
    /// Validates the model.
    ///
    /// Returns the validation messages; an empty list means the model is valid.
    fn validate(&self) -> Vec<String>;

    /// Registers a watcher invoked with every change notification.
    ///
    /// The watcher stays registered until the returned guard is dropped.
    fn watch(&self, watcher: Box<dyn Fn(&Changeset)>) -> WatchGuard;

    /// Reads a property by name.
    fn property(&self, name: &str) -> Option<Value>;
}

/// Keeps a watcher registered. Dropping the guard unregisters it.
#[must_use = "the watcher is unregistered as soon as the guard is dropped"]
pub struct WatchGuard(Option<Box<dyn FnOnce()>>);

impl WatchGuard {
    /// Creates a guard that runs `release` when dropped.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(release)))
    }

    /// Creates a guard that does nothing when dropped.
    pub const fn noop() -> Self {
        Self(None)
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(release) = self.0.take() {
            release();
        }
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard")
            .field("active", &self.0.is_some())
            .finish()
    }
}

/// The old and new value of one property. `None` means the property was unset.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    old: Option<Value>,
    new: Option<Value>,
}

impl Change {
    /// The value before the change.
    #[must_use]
    pub const fn old_value(&self) -> Option<&Value> {
        self.old.as_ref()
    }

    /// The value after the change.
    #[must_use]
    pub const fn new_value(&self) -> Option<&Value> {
        self.new.as_ref()
    }
}

/// The set of property changes carried by one change notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    changes: BTreeMap<String, Change>,
}

impl Changeset {
    /// Creates an empty changeset.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            changes: BTreeMap::new(),
        }
    }

    /// Records a change of `name` from `old` to `new`.
    ///
    /// When the property already changed in this set, the first old value is
    /// kept. A property that ends up back at its old value is dropped.
    pub fn record(&mut self, name: &str, old: Option<Value>, new: Option<Value>) {
        let old = match self.changes.remove(name) {
            Some(previous) => previous.old,
            None => old,
        };
        if old != new {
            self.changes.insert(name.to_string(), Change { old, new });
        }
    }

    /// Returns `true` if any property changed.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Returns the number of changed properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns `true` if no property changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterates over the names of the changed properties.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    /// Returns `true` if `name` changed.
    #[must_use]
    pub fn has_change(&self, name: &str) -> bool {
        self.changes.contains_key(name)
    }

    /// Returns the change recorded for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Change> {
        self.changes.get(name)
    }

    /// Returns the value `name` had before the change.
    #[must_use]
    pub fn old_value(&self, name: &str) -> Option<&Value> {
        self.changes.get(name).and_then(Change::old_value)
    }

    /// Returns the value `name` has after the change.
    #[must_use]
    pub fn new_value(&self, name: &str) -> Option<&Value> {
        self.changes.get(name).and_then(Change::new_value)
    }
}

type Watcher = Rc<dyn Fn(&Changeset)>;

/// A list of change watchers for [`Model`] implementations.
///
/// Notification walks a snapshot of the list, so watchers may register or
/// unregister other watchers while being notified.
#[derive(Default)]
pub struct Watchers {
    entries: Rc<RefCell<Vec<(u64, Watcher)>>>,
    next_id: Cell<u64>,
}

impl Watchers {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a watcher; it is removed when the guard drops.
    pub fn add(&self, watcher: Box<dyn Fn(&Changeset)>) -> WatchGuard {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, Rc::from(watcher)));

        let entries: Weak<RefCell<Vec<(u64, Watcher)>>> = Rc::downgrade(&self.entries);
        WatchGuard::new(move || {
            if let Some(entries) = entries.upgrade() {
                entries.borrow_mut().retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Returns the number of registered watchers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns `true` when nobody is watching.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Notifies every watcher of `changes`. Empty changesets are not sent.
    pub fn notify(&self, changes: &Changeset) {
        if !changes.has_changes() {
            return;
        }
        let snapshot: Vec<Watcher> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, watcher)| Rc::clone(watcher))
            .collect();
        for watcher in snapshot {
            watcher(changes);
        }
    }
}

impl fmt::Debug for Watchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchers").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_keeps_first_old_value() {
        let mut changes = Changeset::new();
        changes.record("width", Some(json!(10)), Some(json!(20)));
        changes.record("width", Some(json!(20)), Some(json!(30)));

        assert_eq!(changes.len(), 1);
        assert_eq!(changes.old_value("width"), Some(&json!(10)));
        assert_eq!(changes.new_value("width"), Some(&json!(30)));
    }

    #[test]
    fn record_drops_round_trips() {
        let mut changes = Changeset::new();
        changes.record("height", Some(json!(5)), Some(json!(6)));
        changes.record("height", Some(json!(6)), Some(json!(5)));
        assert!(!changes.has_changes());
        assert!(!changes.has_change("height"));
    }

    #[test]
    fn property_names_are_listed() {
        let mut changes = Changeset::new();
        changes.record("width", None, Some(json!(1)));
        changes.record("selectionFilter", Some(json!("a")), None);
        let names: Vec<&str> = changes.property_names().collect();
        assert_eq!(names, ["selectionFilter", "width"]);
        assert_eq!(changes.get("selectionFilter").and_then(Change::new_value), None);
    }

    #[test]
    fn watchers_unregister_on_drop() {
        let watchers = Watchers::new();
        let seen = Rc::new(Cell::new(0));

        let guard = watchers.add(Box::new({
            let seen = Rc::clone(&seen);
            move |_| seen.set(seen.get() + 1)
        }));

        let mut changes = Changeset::new();
        changes.record("width", None, Some(json!(1)));
        watchers.notify(&changes);
        assert_eq!(seen.get(), 1);

        drop(guard);
        assert!(watchers.is_empty());
        watchers.notify(&changes);
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn empty_changesets_are_not_sent() {
        let watchers = Watchers::new();
        let seen = Rc::new(Cell::new(0));
        let _guard = watchers.add(Box::new({
            let seen = Rc::clone(&seen);
            move |_| seen.set(seen.get() + 1)
        }));
        watchers.notify(&Changeset::new());
        assert_eq!(seen.get(), 0);
    }
}
