//! Per-view-type tables: property groups, property mapping and partial updates.
//!
//! A [`ViewType`] is built once with a [`ViewTypeBuilder`] and then shared by
//! every view of that type. Derived types start from a copy of their parent's
//! tables, so registering something on a derived type never changes the parent.
//!
//! ```
//! use vizor_core::{Groups, View, ViewType, immediate};
//! # use vizor_core::{Changeset, Model, WatchGuard};
//! # struct Chart;
//! # impl Model for Chart {
//! #     fn validate(&self) -> Vec<String> { Vec::new() }
//! #     fn watch(&self, _: Box<dyn Fn(&Changeset)>) -> WatchGuard { WatchGuard::noop() }
//! #     fn property(&self, _: &str) -> Option<serde_json::Value> { None }
//! # }
//!
//! let bars = ViewType::<Chart, u32>::builder("Bars")
//!     .define_group("Axis")
//!     .property_in("axisTitle", "Axis")
//!     .update_all(immediate(|_view: &View<Chart, u32>| anyhow::Ok(())))
//!     .update_groups(&["Size"], immediate(|_view: &View<Chart, u32>| anyhow::Ok(())))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(bars.group_of("width"), Groups::SIZE);
//! assert_eq!(bars.group_of("anything"), Groups::GENERAL);
//! assert_eq!(bars.select(Groups::SIZE).unwrap().mask(), Groups::SIZE);
//! assert_eq!(bars.select(Groups::SIZE | Groups::SELECTION).unwrap().mask(), Groups::ALL);
//! ```

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use core::fmt;
use core::future::Future;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};

use crate::bitset::DirtySet;
use crate::error::ConfigError;
use crate::group::Groups;
use crate::model::Model;
use crate::view::{DomNode, View};

/// A method that brings some property groups of a view back in sync.
///
/// Any `Fn(View<M, N>) -> impl Future<Output = anyhow::Result<()>>` is a
/// partial update. Synchronous closures can be wrapped with [`immediate`].
pub trait PartialUpdate<M, N>: 'static {
    /// Starts the update. The returned future settles when the view's DOM
    /// reflects the groups this method covers.
    fn update(&self, view: &View<M, N>) -> LocalBoxFuture<'static, anyhow::Result<()>>;
}

impl<M, N, F, Fut> PartialUpdate<M, N> for F
where
    M: Model,
    N: DomNode,
    F: Fn(View<M, N>) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<()>> + 'static,
{
    fn update(&self, view: &View<M, N>) -> LocalBoxFuture<'static, anyhow::Result<()>> {
        self(view.clone()).boxed_local()
    }
}

/// A synchronous partial update. See [`immediate`].
#[derive(Clone, Copy)]
pub struct Immediate<F>(F);

impl<F> fmt::Debug for Immediate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Immediate")
    }
}

/// Wraps a synchronous closure as a partial update.
pub const fn immediate<M, N, F>(update: F) -> Immediate<F>
where
    F: Fn(&View<M, N>) -> anyhow::Result<()>,
{
    Immediate(update)
}

impl<M, N, F> PartialUpdate<M, N> for Immediate<F>
where
    M: Model,
    N: DomNode,
    F: Fn(&View<M, N>) -> anyhow::Result<()> + 'static,
{
    fn update(&self, view: &View<M, N>) -> LocalBoxFuture<'static, anyhow::Result<()>> {
        future::ready((self.0)(view)).boxed_local()
    }
}

/// A partial update together with the groups it fully synchronizes.
pub struct UpdateDescriptor<M, N> {
    mask: Groups,
    handler: Rc<dyn PartialUpdate<M, N>>,
}

impl<M, N> UpdateDescriptor<M, N> {
    /// The groups this update covers.
    #[must_use]
    pub const fn mask(&self) -> Groups {
        self.mask
    }

    pub(crate) fn handler(&self) -> &dyn PartialUpdate<M, N> {
        &*self.handler
    }
}

impl<M, N> Clone for UpdateDescriptor<M, N> {
    fn clone(&self) -> Self {
        Self {
            mask: self.mask,
            handler: Rc::clone(&self.handler),
        }
    }
}

impl<M, N> fmt::Debug for UpdateDescriptor<M, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateDescriptor")
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}

struct Tables<M, N> {
    name: String,
    groups: Vec<(String, Groups)>,
    properties: BTreeMap<String, Groups>,
    updates: Vec<UpdateDescriptor<M, N>>,
}

impl<M, N> Tables<M, N> {
    fn base(name: String) -> Self {
        let groups = [
            ("General", Groups::GENERAL),
            ("Size", Groups::SIZE),
            ("Selection", Groups::SELECTION),
            ("Ignored", Groups::IGNORED),
            ("All", Groups::ALL),
        ]
        .into_iter()
        .map(|(group, mask)| (group.to_string(), mask))
        .collect();

        let properties = [
            ("width", Groups::SIZE),
            ("height", Groups::SIZE),
            ("selectionFilter", Groups::SELECTION),
            ("selectionMode", Groups::IGNORED),
        ]
        .into_iter()
        .map(|(property, mask)| (property.to_string(), mask))
        .collect();

        Self {
            name,
            groups,
            properties,
            updates: Vec::new(),
        }
    }

    fn derived(&self, name: String) -> Self {
        Self {
            name,
            groups: self.groups.clone(),
            properties: self.properties.clone(),
            updates: self.updates.clone(),
        }
    }

    fn group(&self, name: &str) -> Option<Groups> {
        self.groups
            .iter()
            .find(|(group, _)| group == name)
            .map(|(_, mask)| *mask)
    }

    fn groups_named(&self, names: &[&str]) -> Groups {
        let mut mask = Groups::NONE;
        for name in names {
            match self.group(name) {
                Some(group) => mask |= group,
                None => tracing::warn!(
                    view_type = %self.name,
                    group = name,
                    "unknown property group ignored"
                ),
            }
        }
        mask
    }

    fn next_free_bit(&self) -> Option<Groups> {
        let used = self
            .groups
            .iter()
            .filter(|(_, mask)| *mask != Groups::ALL)
            .fold(Groups::NONE, |used, (_, mask)| used | *mask);
        (Groups::BUILTIN_BITS..Groups::MAX_NAMED_BITS)
            .map(|bit| Groups::from_bits(1 << bit))
            .find(|bit| !used.contains(*bit))
    }
}

/// The immutable update tables shared by all views of one type.
pub struct ViewType<M, N> {
    tables: Rc<Tables<M, N>>,
}

impl<M: Model, N: DomNode> ViewType<M, N> {
    /// Starts a new view type from the base tables.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ViewTypeBuilder<M, N> {
        ViewTypeBuilder {
            tables: Tables::base(name.into()),
            error: None,
        }
    }

    /// Starts a view type that inherits this type's groups, properties and updates.
    #[must_use]
    pub fn derive(&self, name: impl Into<String>) -> ViewTypeBuilder<M, N> {
        ViewTypeBuilder {
            tables: self.tables.derived(name.into()),
            error: None,
        }
    }
}

impl<M, N> ViewType<M, N> {
    /// The name given to the type when it was built.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.tables.name
    }

    /// Looks up a group by name, such as `"Size"`.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<Groups> {
        self.tables.group(name)
    }

    /// Iterates over the named groups known to this type.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.tables.groups.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the group a property belongs to.
    ///
    /// Properties without a mapping belong to [`Groups::GENERAL`].
    #[must_use]
    pub fn group_of(&self, property: &str) -> Groups {
        self.tables
            .properties
            .get(property)
            .copied()
            .unwrap_or(Groups::GENERAL)
    }

    /// Combines groups by name. Unknown names are logged and skipped.
    #[must_use]
    pub fn groups_named(&self, names: &[&str]) -> Groups {
        self.tables.groups_named(names)
    }

    /// Chooses the update to run for `dirty`.
    ///
    /// An update registered for exactly `dirty` wins; otherwise the first
    /// registered update whose mask covers `dirty` is used.
    #[must_use]
    pub fn select(&self, dirty: Groups) -> Option<&UpdateDescriptor<M, N>> {
        let dirty = DirtySet::from(dirty);
        let updates = &self.tables.updates;
        updates
            .iter()
            .find(|descriptor| dirty.is(descriptor.mask))
            .or_else(|| updates.iter().find(|descriptor| dirty.is_subset_of(descriptor.mask)))
    }

    /// The registered updates, in registration order.
    #[must_use]
    pub fn descriptors(&self) -> &[UpdateDescriptor<M, N>] {
        &self.tables.updates
    }
}

impl<M, N> Clone for ViewType<M, N> {
    fn clone(&self) -> Self {
        Self {
            tables: Rc::clone(&self.tables),
        }
    }
}

impl<M, N> fmt::Debug for ViewType<M, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewType")
            .field("name", &self.tables.name)
            .field("groups", &self.tables.groups)
            .field("properties", &self.tables.properties)
            .field("updates", &self.tables.updates)
            .finish()
    }
}

/// Builder for [`ViewType`].
///
/// Configuration errors are remembered and reported by [`build`](Self::build),
/// so registrations can be chained without intermediate `?`.
pub struct ViewTypeBuilder<M, N> {
    tables: Tables<M, N>,
    error: Option<ConfigError>,
}

impl<M: Model, N: DomNode> ViewTypeBuilder<M, N> {
    /// Defines a new named group on the next free bit.
    #[must_use]
    pub fn define_group(mut self, name: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.tables.group(name).is_some() {
            self.error = Some(ConfigError::DuplicateGroup {
                view_type: self.tables.name.clone(),
                group: name.to_string(),
            });
            return self;
        }
        match self.tables.next_free_bit() {
            Some(bit) => self.tables.groups.push((name.to_string(), bit)),
            None => {
                self.error = Some(ConfigError::TooManyGroups {
                    view_type: self.tables.name.clone(),
                    group: name.to_string(),
                });
            }
        }
        self
    }

    /// Maps a property to a group mask.
    #[must_use]
    pub fn property(mut self, name: &str, group: Groups) -> Self {
        self.tables.properties.insert(name.to_string(), group);
        self
    }

    /// Maps a property to a named group. Unknown group names are logged and skipped.
    #[must_use]
    pub fn property_in(self, name: &str, group: &str) -> Self {
        match self.tables.group(group) {
            Some(mask) => self.property(name, mask),
            None => {
                tracing::warn!(
                    view_type = %self.tables.name,
                    property = name,
                    group,
                    "property mapped to an unknown group; mapping skipped"
                );
                self
            }
        }
    }

    /// Registers the full update, which covers every group.
    #[must_use]
    pub fn update_all(self, handler: impl PartialUpdate<M, N>) -> Self {
        self.update_mask(Groups::ALL, handler)
    }

    /// Registers a partial update for a combination of named groups.
    ///
    /// When none of the names is known the registration is skipped.
    #[must_use]
    pub fn update_groups(self, groups: &[&str], handler: impl PartialUpdate<M, N>) -> Self {
        let mask = self.tables.groups_named(groups);
        if mask.is_empty() {
            tracing::warn!(
                view_type = %self.tables.name,
                ?groups,
                "partial update covers no known group; registration skipped"
            );
            return self;
        }
        self.update_mask(mask, handler)
    }

    /// Registers a partial update for `mask`.
    ///
    /// An update already registered for the same mask is replaced in place.
    #[must_use]
    pub fn update_mask(mut self, mask: Groups, handler: impl PartialUpdate<M, N>) -> Self {
        if mask.is_empty() {
            tracing::warn!(
                view_type = %self.tables.name,
                "partial update with an empty mask; registration skipped"
            );
            return self;
        }
        let handler: Rc<dyn PartialUpdate<M, N>> = Rc::new(handler);
        let updates = &mut self.tables.updates;
        if let Some(existing) = updates.iter_mut().find(|descriptor| descriptor.mask == mask) {
            existing.handler = handler;
        } else {
            updates.push(UpdateDescriptor { mask, handler });
        }
        self
    }

    /// Finishes the type.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error recorded while building, or
    /// [`ConfigError::MissingFullUpdate`] when no update covers every group.
    pub fn build(self) -> Result<ViewType<M, N>, ConfigError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if !self
            .tables
            .updates
            .iter()
            .any(|descriptor| descriptor.mask == Groups::ALL)
        {
            return Err(ConfigError::MissingFullUpdate {
                view_type: self.tables.name,
            });
        }
        tracing::debug!(
            view_type = %self.tables.name,
            updates = self.tables.updates.len(),
            "view type built"
        );
        Ok(ViewType {
            tables: Rc::new(self.tables),
        })
    }
}

impl<M, N> fmt::Debug for ViewTypeBuilder<M, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewTypeBuilder")
            .field("name", &self.tables.name)
            .field("groups", &self.tables.groups)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Changeset, WatchGuard};
    use serde_json::Value;

    struct Empty;

    impl Model for Empty {
        fn validate(&self) -> Vec<String> {
            Vec::new()
        }

        fn watch(&self, _watcher: Box<dyn Fn(&Changeset)>) -> WatchGuard {
            WatchGuard::noop()
        }

        fn property(&self, _name: &str) -> Option<Value> {
            None
        }
    }

    type Builder = ViewTypeBuilder<Empty, u32>;

    fn noop() -> Immediate<impl Fn(&View<Empty, u32>) -> anyhow::Result<()>> {
        immediate(|_view: &View<Empty, u32>| anyhow::Ok(()))
    }

    fn base() -> Builder {
        ViewType::builder("Base").update_all(noop())
    }

    #[test]
    fn base_property_map() {
        let ty = base().build().unwrap();
        assert_eq!(ty.group_of("width"), Groups::SIZE);
        assert_eq!(ty.group_of("height"), Groups::SIZE);
        assert_eq!(ty.group_of("selectionFilter"), Groups::SELECTION);
        assert_eq!(ty.group_of("selectionMode"), Groups::IGNORED);
        assert_eq!(ty.group_of("palette"), Groups::GENERAL);
        assert_eq!(ty.group("Ignored"), Some(Groups::NONE));
        assert_eq!(ty.group("All"), Some(Groups::ALL));
    }

    #[test]
    fn full_update_is_required() {
        let error = ViewType::<Empty, u32>::builder("Bare")
            .update_groups(&["Size"], noop())
            .build()
            .unwrap_err();
        assert_eq!(
            error,
            ConfigError::MissingFullUpdate {
                view_type: "Bare".into()
            }
        );
    }

    #[test]
    fn selection_prefers_exact_then_superset() {
        let ty = base()
            .update_groups(&["Size", "Selection"], noop())
            .update_groups(&["Size"], noop())
            .build()
            .unwrap();

        assert_eq!(ty.select(Groups::SIZE).unwrap().mask(), Groups::SIZE);
        assert_eq!(
            ty.select(Groups::SELECTION).unwrap().mask(),
            Groups::ALL,
            "first registered superset wins"
        );
        assert_eq!(
            ty.select(Groups::SIZE | Groups::SELECTION).unwrap().mask(),
            Groups::SIZE | Groups::SELECTION
        );
        assert_eq!(ty.select(Groups::GENERAL).unwrap().mask(), Groups::ALL);

        // Every mask covers a clean set, so the first registration is used.
        let first = ty.descriptors()[0].mask();
        assert_eq!(ty.select(Groups::NONE).unwrap().mask(), first);
    }

    #[test]
    fn selection_never_under_covers() {
        let ty = base()
            .define_group("Axis")
            .update_groups(&["Size"], noop())
            .update_groups(&["Selection", "Axis"], noop())
            .update_groups(&["Axis"], noop())
            .build()
            .unwrap();

        let groups: Vec<Groups> = ["General", "Size", "Selection", "Axis"]
            .iter()
            .filter_map(|name| ty.group(name))
            .collect();
        for combination in 1_u32..(1 << groups.len()) {
            let dirty = groups
                .iter()
                .enumerate()
                .filter(|(index, _)| combination & (1 << index) != 0)
                .fold(Groups::NONE, |dirty, (_, group)| dirty | *group);
            let selected = ty.select(dirty).unwrap();
            assert!(selected.mask().contains(dirty), "{dirty:?} not covered");
        }
        assert!(ty.select(Groups::ALL).unwrap().mask() == Groups::ALL);
    }

    #[test]
    fn unknown_group_names_are_skipped() {
        let ty = base()
            .update_groups(&["Size", "Nope"], noop())
            .update_groups(&["Nope"], noop())
            .build()
            .unwrap();
        assert_eq!(ty.groups_named(&["Size", "Nope"]), Groups::SIZE);
        let masks: Vec<Groups> = ty.descriptors().iter().map(UpdateDescriptor::mask).collect();
        assert_eq!(masks, [Groups::ALL, Groups::SIZE]);
    }

    #[test]
    fn re_registering_a_mask_replaces_in_place() {
        let ty = base()
            .update_groups(&["Size"], noop())
            .update_groups(&["Selection"], noop())
            .update_mask(Groups::SIZE, noop())
            .build()
            .unwrap();
        let masks: Vec<Groups> = ty.descriptors().iter().map(UpdateDescriptor::mask).collect();
        assert_eq!(masks, [Groups::ALL, Groups::SIZE, Groups::SELECTION]);
    }

    #[test]
    fn defined_groups_take_free_bits() {
        let ty = base()
            .define_group("Axis")
            .define_group("Legend")
            .property_in("axisTitle", "Axis")
            .property_in("legendPosition", "Legend")
            .property_in("orphan", "Missing")
            .build()
            .unwrap();
        assert_eq!(ty.group("Axis"), Some(Groups::from_bits(1 << 3)));
        assert_eq!(ty.group("Legend"), Some(Groups::from_bits(1 << 4)));
        assert_eq!(ty.group_of("axisTitle"), Groups::from_bits(1 << 3));
        assert_eq!(ty.group_of("orphan"), Groups::GENERAL);
    }

    #[test]
    fn duplicate_and_overflowing_groups_fail_the_build() {
        let error = base().define_group("Size").build().unwrap_err();
        assert!(matches!(error, ConfigError::DuplicateGroup { ref group, .. } if group == "Size"));

        let mut builder = base();
        for index in 0..28 {
            builder = builder.define_group(&format!("G{index}"));
        }
        assert!(builder.tables.next_free_bit().is_none());
        let error = builder.define_group("OneTooMany").build().unwrap_err();
        assert!(matches!(
            error,
            ConfigError::TooManyGroups { ref group, .. } if group == "OneTooMany"
        ));
    }

    #[test]
    fn derived_types_leave_the_parent_untouched() {
        let parent = base().build().unwrap();
        let child = parent
            .derive("Child")
            .define_group("Axis")
            .property("width", Groups::GENERAL)
            .update_groups(&["Size"], noop())
            .build()
            .unwrap();

        assert_eq!(child.name(), "Child");
        assert_eq!(child.descriptors().len(), 2);
        assert_eq!(child.group_of("width"), Groups::GENERAL);

        assert_eq!(parent.descriptors().len(), 1);
        assert_eq!(parent.group("Axis"), None);
        assert_eq!(parent.group_of("width"), Groups::SIZE);
    }
}
