//! The [`View`] handle.
//!
//! A view ties a model to a DOM node. It listens to the model, turns changed
//! property names into dirty groups and, when auto-update is on, starts an
//! update cycle to bring the DOM back in sync. The cycle itself lives in the
//! `scheduler` module.

use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use core::fmt;

use futures::task::{LocalSpawn, LocalSpawnExt};

use crate::bitset::DirtySet;
use crate::error::{DomNodeError, UpdateError};
use crate::event::LifecycleEvents;
use crate::group::Groups;
use crate::model::{Changeset, Model, WatchGuard};
use crate::registry::ViewType;
use crate::scheduler::{self, UpdateHandle};
use crate::settings::ViewSettings;

/// The handle type a view renders into.
///
/// Anything cloneable and comparable qualifies, from a `web_sys::Element` to
/// a plain identifier in tests.
pub trait DomNode: Clone + PartialEq + fmt::Debug + 'static {}

impl<T: Clone + PartialEq + fmt::Debug + 'static> DomNode for T {}

pub(crate) struct ViewInner<M, N> {
    pub(crate) model: Rc<M>,
    pub(crate) ty: ViewType<M, N>,
    pub(crate) dom_node: RefCell<Option<N>>,
    pub(crate) dirty: Cell<DirtySet>,
    pub(crate) auto_update: Cell<bool>,
    pub(crate) rendered_once: Cell<bool>,
    pub(crate) in_flight: RefCell<Option<UpdateHandle>>,
    pub(crate) events: LifecycleEvents<N>,
    watch_guard: RefCell<Option<WatchGuard>>,
    disposed: Cell<bool>,
    spawner: Option<Rc<dyn LocalSpawn>>,
}

impl<M, N> ViewInner<M, N> {
    pub(crate) fn mark_dirty(&self, groups: Groups) {
        let mut dirty = self.dirty.get();
        dirty.set(groups);
        self.dirty.set(dirty);
    }

    pub(crate) fn clear_dirty(&self, groups: Groups) {
        let mut dirty = self.dirty.get();
        dirty.clear(groups);
        self.dirty.set(dirty);
    }
}

/// A visualization bound to a model and a DOM node.
///
/// `View` is a cheap handle; clones refer to the same view.
pub struct View<M, N> {
    pub(crate) inner: Rc<ViewInner<M, N>>,
}

impl<M: Model, N: DomNode> View<M, N> {
    /// Creates a view with default settings and subscribes it to `model`.
    ///
    /// The view starts fully dirty. With auto-update on (the default) the
    /// first model change triggers a render; call [`update`](Self::update)
    /// to render right away.
    ///
    /// Without a [spawner](ViewBuilder::spawner), an automatic update that
    /// suspends on an asynchronous partial update only makes progress when
    /// the model changes again. Views with asynchronous updates should be
    /// built with a spawner.
    #[must_use]
    pub fn new(model: Rc<M>, ty: &ViewType<M, N>) -> Self {
        Self::builder(model, ty).build()
    }

    /// Starts configuring a view.
    #[must_use]
    pub fn builder(model: Rc<M>, ty: &ViewType<M, N>) -> ViewBuilder<M, N> {
        ViewBuilder {
            model,
            ty: ty.clone(),
            settings: ViewSettings::default(),
            spawner: None,
        }
    }

    /// Sets the DOM node the view renders into.
    ///
    /// The node can only be set once; setting the same node again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DomNodeError::AlreadySet`] if a different node is already set
    /// and [`DomNodeError::Disposed`] once the view is disposed.
    pub fn set_dom_node(&self, node: N) -> Result<(), DomNodeError> {
        if self.inner.disposed.get() {
            return Err(DomNodeError::Disposed);
        }
        let mut slot = self.inner.dom_node.borrow_mut();
        match slot.as_ref() {
            Some(current) if *current == node => Ok(()),
            Some(_) => Err(DomNodeError::AlreadySet),
            None => {
                *slot = Some(node);
                Ok(())
            }
        }
    }

    /// Starts an update cycle, or joins the one in progress.
    ///
    /// The cycle begins synchronously: listeners, validation and synchronous
    /// partial updates run before this returns. The returned handle resolves
    /// once the view is clean again or the cycle is rejected; every caller
    /// that joins a cycle observes the same outcome.
    ///
    /// Partial updates must not await the handle of the cycle they are part of.
    pub fn update(&self) -> UpdateHandle {
        if let Some(handle) = self.inner.in_flight.borrow().as_ref() {
            tracing::debug!(view_type = self.inner.ty.name(), "joining the update in progress");
            return handle.clone();
        }

        let handle = UpdateHandle::new(scheduler::run(self.clone()));
        *self.inner.in_flight.borrow_mut() = Some(handle.clone());
        if handle.poll_now() {
            tracing::trace!(view_type = self.inner.ty.name(), "update settled synchronously");
        }
        handle
    }

    /// Returns `true` if validation passes, without rendering anything.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.model.validate().is_empty()
    }

    fn on_model_change(inner: &Rc<ViewInner<M, N>>, changes: &Changeset) {
        let groups = changes
            .property_names()
            .fold(Groups::NONE, |groups, name| groups | inner.ty.group_of(name));
        if groups.is_empty() {
            tracing::trace!(view_type = inner.ty.name(), "only ignored properties changed");
            return;
        }

        inner.mark_dirty(groups);
        if !inner.auto_update.get() {
            return;
        }

        let pending = inner.in_flight.borrow().clone();
        if let Some(handle) = pending {
            // Without a spawner, model changes are what drive a suspended cycle.
            if inner.spawner.is_some() || !handle.poll_now() {
                return;
            }
            let error = handle.peek().and_then(|outcome| outcome.as_ref().err());
            log_auto_update(inner.ty.name(), error);
            if inner.dirty.get().is_empty() {
                return;
            }
        }

        let view = Self {
            inner: Rc::clone(inner),
        };
        let handle = view.update();
        match &inner.spawner {
            Some(spawner) => {
                let view_type = inner.ty.name().to_string();
                let task = async move {
                    let outcome = handle.await;
                    log_auto_update(&view_type, outcome.as_ref().err());
                };
                if let Err(error) = spawner.spawn_local(task) {
                    tracing::warn!(%error, "failed to spawn auto-update");
                }
            }
            None => match handle.peek() {
                Some(outcome) => log_auto_update(inner.ty.name(), outcome.as_ref().err()),
                None => tracing::warn!(
                    view_type = inner.ty.name(),
                    "auto-update suspended without a spawner; it resumes on the next model change"
                ),
            },
        }
    }
}

fn log_auto_update(view_type: &str, error: Option<&UpdateError>) {
    match error {
        None => tracing::info!(view_type, "auto-update succeeded"),
        Some(error) => tracing::warn!(view_type, %error, "auto-update rejected"),
    }
}

impl<M, N: Clone> View<M, N> {
    /// The model this view renders.
    #[must_use]
    pub fn model(&self) -> &Rc<M> {
        &self.inner.model
    }

    /// The type of this view.
    #[must_use]
    pub fn view_type(&self) -> &ViewType<M, N> {
        &self.inner.ty
    }

    /// The DOM node, once set.
    #[must_use]
    pub fn dom_node(&self) -> Option<N> {
        self.inner.dom_node.borrow().clone()
    }

    /// Returns `true` while an update is in progress or any group is dirty.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.is_updating() || !self.inner.dirty.get().is_empty()
    }

    /// Returns `true` while an update cycle is in progress.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.inner.in_flight.borrow().is_some()
    }

    /// Returns `true` if model changes trigger updates automatically.
    #[must_use]
    pub fn is_auto_update(&self) -> bool {
        self.inner.auto_update.get()
    }

    /// Turns automatic updates on or off. This never starts an update by itself.
    pub fn set_auto_update(&self, enabled: bool) {
        self.inner.auto_update.set(enabled);
    }

    /// The groups that are currently dirty.
    #[must_use]
    pub fn dirty(&self) -> Groups {
        self.inner.dirty.get().get()
    }

    /// Marks groups dirty without starting an update.
    pub fn invalidate(&self, groups: Groups) {
        self.inner.mark_dirty(groups);
    }

    /// The view's lifecycle events.
    #[must_use]
    pub fn events(&self) -> &LifecycleEvents<N> {
        &self.inner.events
    }

    /// Returns `true` once [`dispose`](Self::dispose) was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Unsubscribes from the model and releases the DOM node.
    ///
    /// Calling it again does nothing.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        let guard = self.inner.watch_guard.borrow_mut().take();
        drop(guard);
        let node = self.inner.dom_node.borrow_mut().take();
        drop(node);
        tracing::debug!(view_type = self.inner.ty.name(), "view disposed");
    }
}

impl<M, N> Clone for View<M, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M, N: fmt::Debug> fmt::Debug for View<M, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("type", &self.inner.ty.name())
            .field("dom_node", &self.inner.dom_node.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("auto_update", &self.inner.auto_update.get())
            .field("updating", &self.inner.in_flight.borrow().is_some())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

/// Configures a [`View`] before it subscribes to its model.
pub struct ViewBuilder<M, N> {
    model: Rc<M>,
    ty: ViewType<M, N>,
    settings: ViewSettings,
    spawner: Option<Rc<dyn LocalSpawn>>,
}

impl<M: Model, N: DomNode> ViewBuilder<M, N> {
    /// Turns automatic updates on or off.
    #[must_use]
    pub const fn auto_update(mut self, enabled: bool) -> Self {
        self.settings.auto_update = enabled;
        self
    }

    /// Applies loaded settings.
    #[must_use]
    pub const fn settings(mut self, settings: ViewSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Drives automatic updates on `spawner` and logs their outcome.
    ///
    /// Needed by views whose partial updates await anything: without it a
    /// suspended automatic update waits for the next model change.
    #[must_use]
    pub fn spawner(mut self, spawner: impl LocalSpawn + 'static) -> Self {
        self.spawner = Some(Rc::new(spawner));
        self
    }

    /// Creates the view and subscribes it to the model.
    #[must_use]
    pub fn build(self) -> View<M, N> {
        let inner = Rc::new(ViewInner {
            model: self.model,
            ty: self.ty,
            dom_node: RefCell::new(None),
            dirty: Cell::new(DirtySet::all()),
            auto_update: Cell::new(self.settings.auto_update),
            rendered_once: Cell::new(false),
            in_flight: RefCell::new(None),
            events: LifecycleEvents::new(),
            watch_guard: RefCell::new(None),
            disposed: Cell::new(false),
            spawner: self.spawner,
        });

        let weak: Weak<ViewInner<M, N>> = Rc::downgrade(&inner);
        let guard = inner.model.watch(Box::new(move |changes: &Changeset| {
            if let Some(inner) = weak.upgrade() {
                View::on_model_change(&inner, changes);
            }
        }));
        *inner.watch_guard.borrow_mut() = Some(guard);

        tracing::debug!(view_type = inner.ty.name(), "view created");
        View { inner }
    }
}

impl<M, N> fmt::Debug for ViewBuilder<M, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewBuilder")
            .field("type", &self.ty.name())
            .field("settings", &self.settings)
            .field("spawner", &self.spawner.is_some())
            .finish_non_exhaustive()
    }
}
