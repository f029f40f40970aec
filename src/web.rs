//! Browser helpers, available with the `web` feature.
//!
//! `web_sys::Element` already satisfies [`DomNode`](vizor_core::DomNode), so a
//! view can render straight into browser elements:
//! `View<VisualModel, web_sys::Element>`.

use core::fmt;

use wasm_bindgen::JsValue;
use web_sys::{Document, Element, Window};

/// Errors produced by the browser helpers.
#[derive(Debug, Clone)]
pub enum WebError {
    /// The DOM APIs are not accessible, for example outside of a browser.
    DomUnavailable,
    /// A JavaScript exception.
    Js(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomUnavailable => write!(f, "DOM is not available"),
            Self::Js(message) => write!(f, "JavaScript error: {message}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<JsValue> for WebError {
    fn from(value: JsValue) -> Self {
        value
            .as_string()
            .map_or_else(|| Self::Js(format!("{value:?}")), Self::Js)
    }
}

/// Returns the document of the current window.
///
/// # Errors
///
/// Returns [`WebError::DomUnavailable`] outside of a browser.
pub fn document() -> Result<Document, WebError> {
    let window: Window = web_sys::window().ok_or(WebError::DomUnavailable)?;
    window.document().ok_or(WebError::DomUnavailable)
}

/// Creates a detached element to serve as a view's DOM node.
///
/// The element carries a `vizor-view` class so views can be styled and
/// located once the host attaches them.
///
/// # Errors
///
/// Returns [`WebError::Js`] if the document rejects the tag name.
pub fn create_container(document: &Document, tag: &str) -> Result<Element, WebError> {
    let element = document.create_element(tag)?;
    element.set_class_name("vizor-view");
    Ok(element)
}
