//! A ready-made observable visualization model.
//!
//! [`VisualModel`] stores its properties as JSON values and reports every
//! mutation to its watchers as a [`Changeset`]. Mutations made inside
//! [`VisualModel::batch`] are reported together, once the outermost batch
//! ends.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vizor_core::{Changeset, Model, WatchGuard, Watchers};

/// Property holding the view width.
pub const WIDTH: &str = "width";
/// Property holding the view height.
pub const HEIGHT: &str = "height";
/// Property holding the current selection filter.
pub const SELECTION_FILTER: &str = "selectionFilter";
/// Property holding the selection mode.
pub const SELECTION_MODE: &str = "selectionMode";
/// Property holding the visualized data.
pub const DATA: &str = "data";

/// How a new selection combines with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionMode {
    /// The new selection replaces the current one.
    #[default]
    Replace,
    /// Selected items are toggled.
    Toggle,
    /// The new selection is added to the current one.
    Add,
    /// The new selection is removed from the current one.
    Remove,
}

/// A validation rule for one property. `None` means the property is unset.
pub type Rule = Rc<dyn Fn(Option<&Value>) -> Result<(), String>>;

/// An observable property bag for visualizations.
#[derive(Default)]
pub struct VisualModel {
    values: RefCell<BTreeMap<String, Value>>,
    rules: RefCell<Vec<(String, Rule)>>,
    pending: RefCell<Changeset>,
    batch_depth: Cell<usize>,
    watchers: Watchers,
}

impl VisualModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a model from an object of initial properties.
    ///
    /// Non-object values yield an empty model.
    #[must_use]
    pub fn from_json(properties: Value) -> Self {
        let model = Self::new();
        if let Value::Object(properties) = properties {
            model.values.borrow_mut().extend(properties);
        }
        model
    }

    /// Reads a property.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    /// Sets a property. Setting a property to its current value does nothing.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let old = self
            .values
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        self.changed(name, old, Some(value));
    }

    /// Removes a property, returning its value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        let old = self.values.borrow_mut().remove(name);
        if old.is_some() {
            self.changed(name, old.clone(), None);
        }
        old
    }

    /// Runs `mutate` and reports all its changes as one changeset.
    ///
    /// Batches nest; only the outermost one notifies.
    pub fn batch<R>(&self, mutate: impl FnOnce(&Self) -> R) -> R {
        let depth = BatchDepth::enter(&self.batch_depth);
        let result = mutate(self);
        drop(depth);
        if self.batch_depth.get() == 0 {
            let changes = self.pending.take();
            self.watchers.notify(&changes);
        }
        result
    }

    fn changed(&self, name: &str, old: Option<Value>, new: Option<Value>) {
        if old == new {
            return;
        }
        if self.batch_depth.get() > 0 {
            self.pending.borrow_mut().record(name, old, new);
        } else {
            let mut changes = self.pending.take();
            changes.record(name, old, new);
            self.watchers.notify(&changes);
        }
    }

    /// The width, when set to a number.
    #[must_use]
    pub fn width(&self) -> Option<f64> {
        self.get(WIDTH).as_ref().and_then(Value::as_f64)
    }

    /// Sets the width.
    pub fn set_width(&self, width: f64) {
        self.set(WIDTH, width);
    }

    /// The height, when set to a number.
    #[must_use]
    pub fn height(&self) -> Option<f64> {
        self.get(HEIGHT).as_ref().and_then(Value::as_f64)
    }

    /// Sets the height.
    pub fn set_height(&self, height: f64) {
        self.set(HEIGHT, height);
    }

    /// Sets width and height in one change notification.
    pub fn resize(&self, width: f64, height: f64) {
        self.batch(|model| {
            model.set_width(width);
            model.set_height(height);
        });
    }

    /// The selection filter, an opaque filter expression.
    #[must_use]
    pub fn selection_filter(&self) -> Option<Value> {
        self.get(SELECTION_FILTER)
    }

    /// Sets the selection filter.
    pub fn set_selection_filter(&self, filter: Value) {
        self.set(SELECTION_FILTER, filter);
    }

    /// The selection mode. Unset or unrecognized values read as [`SelectionMode::Replace`].
    #[must_use]
    pub fn selection_mode(&self) -> SelectionMode {
        self.get(SELECTION_MODE)
            .and_then(|mode| serde_json::from_value(mode).ok())
            .unwrap_or_default()
    }

    /// Sets the selection mode.
    pub fn set_selection_mode(&self, mode: SelectionMode) {
        let value = match mode {
            SelectionMode::Replace => "REPLACE",
            SelectionMode::Toggle => "TOGGLE",
            SelectionMode::Add => "ADD",
            SelectionMode::Remove => "REMOVE",
        };
        self.set(SELECTION_MODE, value);
    }

    /// The visualized data.
    #[must_use]
    pub fn data(&self) -> Option<Value> {
        self.get(DATA)
    }

    /// Sets the visualized data.
    pub fn set_data(&self, data: Value) {
        self.set(DATA, data);
    }

    /// Adds a validation rule for `property`.
    pub fn add_rule(
        &self,
        property: &str,
        rule: impl Fn(Option<&Value>) -> Result<(), String> + 'static,
    ) {
        self.rules
            .borrow_mut()
            .push((property.to_string(), Rc::new(rule)));
    }

    /// Number of registered watchers.
    #[must_use]
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }
}

fn non_negative(name: &str, value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(value) if value.as_f64().is_some_and(|number| number >= 0.0) => None,
        Some(_) => Some(format!("Property '{name}' must be a non-negative number.")),
    }
}

// Leaves the batch even if the mutation panics. Changes recorded before the
// panic are delivered with the next notification.
struct BatchDepth<'a>(&'a Cell<usize>);

impl<'a> BatchDepth<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self(depth)
    }
}

impl Drop for BatchDepth<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl Model for VisualModel {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        {
            let values = self.values.borrow();
            if values.get(DATA).is_none_or(Value::is_null) {
                errors.push(format!("Property '{DATA}' is required."));
            }
            errors.extend(non_negative(WIDTH, values.get(WIDTH)));
            errors.extend(non_negative(HEIGHT, values.get(HEIGHT)));
        }

        let rules: Vec<(String, Rule)> = self.rules.borrow().clone();
        for (property, rule) in rules {
            let value = self.get(&property);
            if let Err(message) = rule(value.as_ref()) {
                errors.push(message);
            }
        }
        errors
    }

    fn watch(&self, watcher: Box<dyn Fn(&Changeset)>) -> WatchGuard {
        self.watchers.add(watcher)
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.get(name)
    }
}

impl fmt::Debug for VisualModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualModel")
            .field("values", &self.values.borrow())
            .field("rules", &self.rules.borrow().len())
            .field("watchers", &self.watchers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorded(model: &VisualModel) -> (Rc<RefCell<Vec<Changeset>>>, WatchGuard) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let guard = model.watch(Box::new({
            let seen = Rc::clone(&seen);
            move |changes: &Changeset| seen.borrow_mut().push(changes.clone())
        }));
        (seen, guard)
    }

    #[test]
    fn set_notifies_with_old_and_new_values() {
        let model = VisualModel::new();
        model.set_width(100.0);
        let (seen, _guard) = recorded(&model);

        model.set_width(250.0);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].old_value(WIDTH), Some(&json!(100.0)));
        assert_eq!(seen[0].new_value(WIDTH), Some(&json!(250.0)));
        assert_eq!(model.width(), Some(250.0));
    }

    #[test]
    fn setting_the_same_value_is_silent() {
        let model = VisualModel::new();
        model.set("title", "Sales");
        let (seen, _guard) = recorded(&model);

        model.set("title", "Sales");
        assert!(model.remove("missing").is_none());

        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn panicking_batch_does_not_mute_the_model() {
        let model = VisualModel::new();
        let (seen, _guard) = recorded(&model);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            model.batch(|model| {
                model.set_width(10.0);
                panic!("mutation failed");
            });
        }));
        assert!(outcome.is_err());
        assert!(seen.borrow().is_empty());

        model.set_height(20.0);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].has_change(WIDTH));
        assert!(seen[0].has_change(HEIGHT));
    }

    #[test]
    fn batches_emit_one_changeset() {
        let model = VisualModel::new();
        let (seen, _guard) = recorded(&model);

        model.batch(|model| {
            model.set_width(10.0);
            model.batch(|model| model.set_height(20.0));
            model.set_width(30.0);
        });

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        let names: Vec<&str> = seen[0].property_names().collect();
        assert_eq!(names, [HEIGHT, WIDTH]);
        assert_eq!(seen[0].old_value(WIDTH), None);
        assert_eq!(seen[0].new_value(WIDTH), Some(&json!(30.0)));
    }

    #[test]
    fn batch_that_changes_nothing_is_silent() {
        let model = VisualModel::from_json(json!({ "width": 5.0 }));
        let (seen, _guard) = recorded(&model);
        model.batch(|model| {
            model.set_width(6.0);
            model.set_width(5.0);
        });
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn selection_mode_round_trips_through_wire_names() {
        let model = VisualModel::new();
        assert_eq!(model.selection_mode(), SelectionMode::Replace);

        model.set_selection_mode(SelectionMode::Toggle);
        assert_eq!(model.get(SELECTION_MODE), Some(json!("TOGGLE")));
        assert_eq!(model.selection_mode(), SelectionMode::Toggle);

        model.set(SELECTION_MODE, "SIDEWAYS");
        assert_eq!(model.selection_mode(), SelectionMode::Replace);
    }

    #[test]
    fn validation_reports_every_problem() {
        let model = VisualModel::from_json(json!({ "width": -1, "height": "tall" }));
        model.add_rule("measure", |value| match value {
            Some(Value::String(_)) => Ok(()),
            _ => Err("A measure must be chosen.".to_string()),
        });

        assert_eq!(
            model.validate(),
            [
                "Property 'data' is required.",
                "Property 'width' must be a non-negative number.",
                "Property 'height' must be a non-negative number.",
                "A measure must be chosen.",
            ]
        );

        model.batch(|model| {
            model.set_data(json!([]));
            model.resize(300.0, 200.0);
            model.set("measure", "sales");
        });
        assert!(model.validate().is_empty());
    }

    #[test]
    fn dropping_the_guard_stops_notifications() {
        let model = VisualModel::new();
        let (seen, guard) = recorded(&model);
        assert_eq!(model.watcher_count(), 1);
        drop(guard);
        assert_eq!(model.watcher_count(), 0);
        model.set_height(1.0);
        assert!(seen.borrow().is_empty());
    }
}
