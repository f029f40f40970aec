//! The update cycle.
//!
//! One cycle runs through these phases:
//!
//! 1. `will:update`, when anyone listens. A listener may cancel the cycle.
//! 2. Validation of the model.
//! 3. The update loop: pick the update whose mask best covers the dirty
//!    groups, clear those groups, run it, and repeat (validating again) until
//!    nothing is dirty. Groups marked dirty while an update runs are picked up
//!    by the next iteration.
//! 4. On the first successful cycle, `did:create` with the DOM node.
//! 5. `did:update` or `rejected:update`.
//!
//! Only one cycle runs per view at a time. Calling `update()` while a cycle
//! runs joins it.

use alloc::rc::Rc;
use core::fmt;
use core::future::Future;
use core::ops::ControlFlow;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};

use crate::error::{ExecutionError, UpdateError, ValidationError};
use crate::event::{EventKind, WillUpdate};
use crate::model::Model;
use crate::registry::UpdateDescriptor;
use crate::view::{DomNode, View, ViewInner};

type Outcome = Result<(), UpdateError>;

/// A handle to an update cycle.
///
/// Awaiting it yields the cycle's outcome. Handles are cheap to clone and
/// every clone resolves to the same outcome.
#[derive(Clone)]
#[must_use = "the outcome of an update is only observable through its handle"]
pub struct UpdateHandle {
    cycle: Shared<LocalBoxFuture<'static, Outcome>>,
}

impl UpdateHandle {
    pub(crate) fn new(cycle: impl Future<Output = Outcome> + 'static) -> Self {
        Self {
            cycle: cycle.boxed_local().shared(),
        }
    }

    // Polls once without a task context. Returns `true` if the cycle settled.
    pub(crate) fn poll_now(&self) -> bool {
        self.cycle.clone().now_or_never().is_some()
    }

    /// Returns the outcome if the cycle has settled.
    #[must_use]
    pub fn peek(&self) -> Option<&Outcome> {
        self.cycle.peek()
    }

    /// Returns `true` once the cycle has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }

    /// Returns `true` if both handles refer to the same cycle.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.cycle.ptr_eq(&other.cycle)
    }
}

impl Future for UpdateHandle {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome> {
        self.cycle.poll_unpin(cx)
    }
}

impl fmt::Debug for UpdateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHandle")
            .field("outcome", &self.peek())
            .finish()
    }
}

// Clears the view's in-flight handle when the cycle ends.
struct InFlight<M, N> {
    inner: Rc<ViewInner<M, N>>,
}

impl<M, N> InFlight<M, N> {
    fn finish(self) {
        drop(self);
    }
}

impl<M, N> Drop for InFlight<M, N> {
    fn drop(&mut self) {
        let handle = self.inner.in_flight.borrow_mut().take();
        drop(handle);
    }
}

pub(crate) async fn run<M: Model, N: DomNode>(view: View<M, N>) -> Outcome {
    let in_flight = InFlight {
        inner: Rc::clone(&view.inner),
    };
    let inner = &*view.inner;
    tracing::debug!(view_type = inner.ty.name(), dirty = ?inner.dirty.get(), "update started");

    let outcome = match AssertUnwindSafe(execute(&view)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(payload) => Err(ExecutionError::panicked(&*payload).into()),
    };

    match &outcome {
        Ok(()) => {
            let mut dirty = inner.dirty.get();
            dirty.clear_all();
            inner.dirty.set(dirty);
            in_flight.finish();
            tracing::debug!(view_type = inner.ty.name(), "update fulfilled");
            inner.events.emit_did_update();
        }
        Err(error) => {
            in_flight.finish();
            tracing::debug!(view_type = inner.ty.name(), %error, "update rejected");
            inner.events.emit_rejected_update(error);
        }
    }
    outcome
}

async fn execute<M: Model, N: DomNode>(view: &View<M, N>) -> Outcome {
    let inner = &*view.inner;

    if inner.events.has_listeners(EventKind::WillUpdate) {
        let event = WillUpdate::new(inner.dirty.get().get());
        if let ControlFlow::Break(reason) = inner.events.emit_will_update(&event) {
            return Err(UpdateError::Canceled { reason });
        }
    }

    validate(inner)?;

    while !inner.dirty.get().is_empty() {
        let dirty = inner.dirty.get().get();
        let descriptor = inner
            .ty
            .select(dirty)
            .cloned()
            .ok_or(UpdateError::Unhandled { dirty })?;

        // Cleared before the call so that groups dirtied meanwhile survive it.
        inner.clear_dirty(descriptor.mask());
        tracing::debug!(
            view_type = inner.ty.name(),
            ?dirty,
            mask = ?descriptor.mask(),
            "running partial update"
        );

        if let Err(error) = invoke(view, &descriptor).await {
            inner.mark_dirty(dirty & descriptor.mask());
            return Err(error.into());
        }

        if !inner.dirty.get().is_empty() {
            validate(inner)?;
        }
    }

    if !inner.rendered_once.get() {
        let node = inner.dom_node.borrow().clone();
        let Some(node) = node else {
            let mut dirty = inner.dirty.get();
            dirty.set_all();
            inner.dirty.set(dirty);
            return Err(UpdateError::NoOutput);
        };
        inner.rendered_once.set(true);
        tracing::debug!(view_type = inner.ty.name(), ?node, "view created its DOM node");
        inner.events.emit_did_create(&node);
    }

    Ok(())
}

fn validate<M: Model, N>(inner: &ViewInner<M, N>) -> Result<(), ValidationError> {
    let messages = inner.model.validate();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(messages))
    }
}

async fn invoke<M: Model, N: DomNode>(
    view: &View<M, N>,
    descriptor: &UpdateDescriptor<M, N>,
) -> Result<(), ExecutionError> {
    let started = panic::catch_unwind(AssertUnwindSafe(|| descriptor.handler().update(view)));
    let pending = match started {
        Ok(pending) => pending,
        Err(payload) => return Err(ExecutionError::panicked(&*payload)),
    };
    match AssertUnwindSafe(pending).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(error.into()),
        Err(payload) => Err(ExecutionError::panicked(&*payload)),
    }
}
