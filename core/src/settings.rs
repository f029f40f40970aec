//! Per-view settings.

/// Settings applied to a view when it is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct ViewSettings {
    /// Whether model changes start an update automatically.
    pub auto_update: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self { auto_update: true }
    }
}
