//! Update scheduling and dirty-region tracking for `Vizor` views.
//!
//! A [`View`] renders an observable [`Model`] into a DOM node. Rather than
//! re-rendering everything on every change, it sorts changed properties into
//! [`Groups`] (size, selection, custom groups) and keeps the out-of-date
//! ones in a [`DirtySet`]. An update cycle then repeatedly runs the narrowest
//! registered [`PartialUpdate`] that covers what is dirty, until the view is
//! clean. The view type decides which updates exist; see [`ViewType`].
//!
//! - [`group`] and [`bitset`]: masks and the dirty set,
//! - [`registry`]: view types, property groups and partial updates,
//! - [`view`] and the scheduler: the view handle and its update cycle,
//! - [`event`]: the `will:update` / `did:update` / `rejected:update` /
//!   `did:create` lifecycle,
//! - [`model`]: what a view needs from its model.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use vizor_core::{Changeset, Model, View, ViewType, WatchGuard, Watchers, immediate};
//!
//! #[derive(Default)]
//! struct Counter {
//!     watchers: Watchers,
//! }
//!
//! impl Model for Counter {
//!     fn validate(&self) -> Vec<String> {
//!         Vec::new()
//!     }
//!
//!     fn watch(&self, watcher: Box<dyn Fn(&Changeset)>) -> WatchGuard {
//!         self.watchers.add(watcher)
//!     }
//!
//!     fn property(&self, _name: &str) -> Option<serde_json::Value> {
//!         None
//!     }
//! }
//!
//! let ty = ViewType::<Counter, &'static str>::builder("Counter")
//!     .update_all(immediate(|view: &View<Counter, &'static str>| {
//!         view.set_dom_node("<div>")?;
//!         anyhow::Ok(())
//!     }))
//!     .build()?;
//!
//! let view = View::new(Rc::new(Counter::default()), &ty);
//! assert!(view.is_dirty());
//!
//! futures::executor::block_on(view.update())?;
//! assert!(!view.is_dirty());
//! assert_eq!(view.dom_node(), Some("<div>"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

extern crate alloc;

pub mod bitset;
pub mod error;
pub mod event;
pub mod group;
pub mod model;
pub mod registry;
mod scheduler;
mod settings;
pub mod view;

pub use bitset::DirtySet;
pub use error::{ConfigError, DomNodeError, ExecutionError, UpdateError, ValidationError};
pub use event::{EventKind, LifecycleEvents, ListenerId, WillUpdate};
pub use group::Groups;
pub use model::{Change, Changeset, Model, WatchGuard, Watchers};
pub use registry::{
    Immediate, PartialUpdate, UpdateDescriptor, ViewType, ViewTypeBuilder, immediate,
};
pub use scheduler::UpdateHandle;
pub use settings::ViewSettings;
pub use view::{DomNode, View, ViewBuilder};
