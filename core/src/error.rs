//! Error types produced by views, view types and update cycles.

use alloc::sync::Arc;
use core::any::Any;
use core::fmt;

use thiserror::Error;

use crate::group::Groups;

/// The reason an update cycle was rejected.
///
/// Every caller that observes a cycle (including callers whose `update()`
/// was folded into a running cycle) receives the same error, so this type
/// is cheap to clone.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum UpdateError {
    /// A `will:update` listener canceled the cycle before it started.
    #[error("{reason}")]
    Canceled {
        /// The reason given by the listener.
        reason: String,
    },
    /// The model failed validation at the start of a loop iteration.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// A partial update failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// No registered update covers the dirty groups.
    ///
    /// Built view types always carry a full update, so this indicates a
    /// programming error rather than a recoverable condition.
    #[error("no update is registered for dirty groups {dirty:?}")]
    Unhandled {
        /// The dirty groups that could not be handled.
        dirty: Groups,
    },
    /// The first successful cycle finished without the view setting a DOM node.
    #[error("view produced no output: no DOM node was set during its first update")]
    NoOutput,
}

impl UpdateError {
    /// Returns `true` if a `will:update` listener canceled the cycle.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }

    /// Returns `true` if the model was invalid.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    /// Returns the rendering failure, if that is what rejected the cycle.
    #[must_use]
    pub const fn execution(&self) -> Option<&ExecutionError> {
        match self {
            Self::Execution(error) => Some(error),
            _ => None,
        }
    }
}

/// Validation messages reported by the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("View update was rejected:{}", bulleted(.messages))]
pub struct ValidationError {
    messages: Vec<String>,
}

impl ValidationError {
    /// Creates a validation error from the model's messages.
    #[must_use]
    pub const fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }

    /// Returns the individual messages.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

fn bulleted(messages: &[String]) -> String {
    messages
        .iter()
        .map(|message| format!("\n - {message}"))
        .collect()
}

/// A failure raised by a partial update.
///
/// The handler's error is kept as is, so callers can tell rendering failures
/// apart from validation failures and recover the original error type with
/// [`ExecutionError::downcast_ref`].
#[derive(Debug, Clone)]
pub struct ExecutionError(Arc<anyhow::Error>);

impl ExecutionError {
    /// Returns the error produced by the handler.
    #[must_use]
    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }

    /// Attempts to view the handler's error as a concrete type.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    pub(crate) fn panicked(payload: &(dyn Any + Send)) -> Self {
        Self::from(anyhow::anyhow!(
            "update handler panicked: {}",
            panic_message(payload)
        ))
    }
}

impl From<anyhow::Error> for ExecutionError {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl core::error::Error for ExecutionError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        let inner: &(dyn core::error::Error + Send + Sync + 'static) = &**self.0;
        inner.source()
    }
}

/// Errors from assigning a view's DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DomNodeError {
    /// The view already has a different DOM node.
    #[error("the DOM node of a view can only be set once")]
    AlreadySet,
    /// The view has been disposed.
    #[error("cannot set the DOM node of a disposed view")]
    Disposed,
}

/// Errors from building a view type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No update covering every group was registered.
    #[error("view type `{view_type}` has no full update registered")]
    MissingFullUpdate {
        /// The view type being built.
        view_type: String,
    },
    /// Every available group bit is taken.
    #[error("view type `{view_type}` cannot define group `{group}`: all group bits are in use")]
    TooManyGroups {
        /// The view type being built.
        view_type: String,
        /// The group that did not fit.
        group: String,
    },
    /// A group with the same name already exists.
    #[error("view type `{view_type}` already defines group `{group}`")]
    DuplicateGroup {
        /// The view type being built.
        view_type: String,
        /// The duplicated group name.
        group: String,
    },
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("chart axis missing")]
    struct AxisMissing;

    #[test]
    fn validation_message_lists_every_item() {
        let error = ValidationError::new(vec!["E1".into(), "E2".into()]);
        assert_eq!(error.to_string(), "View update was rejected:\n - E1\n - E2");
        assert_eq!(error.messages(), ["E1", "E2"]);
    }

    #[test]
    fn execution_error_keeps_original() {
        let error = ExecutionError::from(anyhow::Error::new(AxisMissing));
        assert_eq!(error.to_string(), "chart axis missing");
        assert!(error.downcast_ref::<AxisMissing>().is_some());

        let update = UpdateError::from(error);
        assert!(update.execution().is_some());
        assert!(!update.is_invalid());
        assert_eq!(update.to_string(), "chart axis missing");
    }

    #[test]
    fn panic_payloads_become_messages() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*boxed), "unknown panic");
    }
}
