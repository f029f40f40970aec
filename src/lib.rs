#![doc = include_str!("../README.md")]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::future_not_send)]

pub mod config;
pub mod logging;
pub mod model;
#[cfg(feature = "web")]
pub mod web;

#[doc(inline)]
pub use vizor_core::*;

pub use config::{LogSettings, Settings, SettingsError};
pub use model::{SelectionMode, VisualModel};

pub use tracing as log;

pub mod prelude {
    //! Commonly used types, for glob importing.
    //!
    //! ```rust
    //! use vizor::prelude::*;
    //!
    //! let model = std::rc::Rc::new(VisualModel::new());
    //! let ty = ViewType::<VisualModel, u32>::builder("Empty")
    //!     .update_all(immediate(|view: &View<VisualModel, u32>| {
    //!         view.set_dom_node(1)?;
    //!         anyhow::Ok(())
    //!     }))
    //!     .build()
    //!     .unwrap();
    //! let view = View::new(model, &ty);
    //! assert!(view.is_dirty());
    //! ```
    pub use crate::config::Settings;
    pub use crate::model::{SelectionMode, VisualModel};
    pub use vizor_core::{
        Groups, Model, UpdateError, UpdateHandle, View, ViewType, immediate,
    };
}
