//! Persistent heavy-view coordinator
//!
//! Some views wrap an engine that is too expensive to build twice in a
//! session. The coordinator creates each such view once, the first time it is
//! shown, and afterwards only moves it between layout slots. A view that is
//! not shown anywhere is parked: kept alive, not rendered. Instance state
//! (query results, scroll position, selection) therefore survives every
//! layout change.

use crate::core::ViewError;
use log::{debug, info};
use std::collections::HashMap;
use std::fmt;

/// Stable identity of a heavy view
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewId(String);

impl ViewId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ViewId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Layout slot a view can be shown in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutSlot {
    Full,
    SplitLeft,
    SplitRight,
}

/// Where a live view currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    Slot(LayoutSlot),
    Parked,
}

impl Placement {
    pub fn is_visible(&self) -> bool {
        matches!(self, Placement::Slot(_))
    }
}

/// A view instance managed by the coordinator
pub trait HeavyView {
    /// Called when the instance's surface moves; the instance itself is kept
    fn on_relocate(&mut self, _from: Placement, _to: Placement) {}
}

/// Lifecycle event recorded by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    Created(ViewId),
    Relocated {
        view: ViewId,
        from: Placement,
        to: Placement,
    },
    /// Pushed out of its slot by another view
    Parked(ViewId),
}

/// Outcome of a [`PersistentViewCoordinator::relocate`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocateOutcome {
    /// Already at the target; nothing happened
    Unchanged,
    Moved { from: Placement, to: Placement },
}

type ViewFactory<V> = Box<dyn FnMut(&ViewId) -> Result<V, String>>;

struct ViewEntry<V> {
    instance: V,
    placement: Placement,
}

/// Registry of session-lifetime heavy views and their slot assignments
pub struct PersistentViewCoordinator<V: HeavyView> {
    factory: ViewFactory<V>,
    entries: HashMap<ViewId, ViewEntry<V>>,
    slots: HashMap<LayoutSlot, ViewId>,
    creations: HashMap<ViewId, usize>,
    events: Vec<ViewEvent>,
}

impl<V: HeavyView> PersistentViewCoordinator<V> {
    /// `factory` builds an instance the first time a view is materialized
    pub fn new(factory: impl FnMut(&ViewId) -> Result<V, String> + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            entries: HashMap::new(),
            slots: HashMap::new(),
            creations: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Create the view's instance unless it already exists
    ///
    /// A newly created instance starts parked.
    pub fn ensure_materialized(&mut self, view: &ViewId) -> Result<&mut V, ViewError> {
        if !self.entries.contains_key(view) {
            let instance = (self.factory)(view).map_err(|reason| ViewError::Materialize {
                view: view.to_string(),
                reason,
            })?;
            info!("materialized heavy view '{}'", view);
            *self.creations.entry(view.clone()).or_default() += 1;
            self.events.push(ViewEvent::Created(view.clone()));
            self.entries.insert(
                view.clone(),
                ViewEntry {
                    instance,
                    placement: Placement::Parked,
                },
            );
        }
        match self.entries.get_mut(view) {
            Some(entry) => Ok(&mut entry.instance),
            None => unreachable!("entry inserted above"),
        }
    }

    /// Move the live instance to `target`
    ///
    /// Materializes the view if it is shown for the first time. A view already
    /// in `target` is left untouched. A view previously shown in the target
    /// slot is parked.
    pub fn relocate(&mut self, view: &ViewId, target: Placement) -> Result<RelocateOutcome, ViewError> {
        if !self.entries.contains_key(view) {
            if !target.is_visible() {
                return Ok(RelocateOutcome::Unchanged);
            }
            self.ensure_materialized(view)?;
        }

        let from = self.placement(view).unwrap_or(Placement::Parked);
        if from == target {
            return Ok(RelocateOutcome::Unchanged);
        }

        if let Placement::Slot(slot) = target {
            if let Some(occupant) = self.slots.insert(slot, view.clone()) {
                self.park_displaced(&occupant, slot);
            }
        }
        if let Placement::Slot(slot) = from {
            if self.slots.get(&slot) == Some(view) {
                self.slots.remove(&slot);
            }
        }

        if let Some(entry) = self.entries.get_mut(view) {
            entry.placement = target;
            entry.instance.on_relocate(from, target);
        }
        debug!("relocated heavy view '{}' from {:?} to {:?}", view, from, target);
        self.events.push(ViewEvent::Relocated {
            view: view.clone(),
            from,
            to: target,
        });
        Ok(RelocateOutcome::Moved { from, to: target })
    }

    fn park_displaced(&mut self, occupant: &ViewId, slot: LayoutSlot) {
        if let Some(entry) = self.entries.get_mut(occupant) {
            entry.placement = Placement::Parked;
            entry.instance.on_relocate(Placement::Slot(slot), Placement::Parked);
            debug!("parked heavy view '{}' displaced from {:?}", occupant, slot);
            self.events.push(ViewEvent::Parked(occupant.clone()));
        }
    }

    /// Whether the view is currently shown in some slot
    pub fn is_visible(&self, view: &ViewId) -> bool {
        self.placement(view).is_some_and(|p| p.is_visible())
    }

    /// Placement of a materialized view
    pub fn placement(&self, view: &ViewId) -> Option<Placement> {
        self.entries.get(view).map(|e| e.placement)
    }

    /// View shown in `slot`, if any
    pub fn occupant(&self, slot: LayoutSlot) -> Option<&ViewId> {
        self.slots.get(&slot)
    }

    pub fn get(&self, view: &ViewId) -> Option<&V> {
        self.entries.get(view).map(|e| &e.instance)
    }

    pub fn get_mut(&mut self, view: &ViewId) -> Option<&mut V> {
        self.entries.get_mut(view).map(|e| &mut e.instance)
    }

    /// Instances created for `view` this session (0 or 1)
    pub fn creation_count(&self, view: &ViewId) -> usize {
        self.creations.get(view).copied().unwrap_or(0)
    }

    /// Lifecycle events not yet taken, in the order they happened
    pub fn events(&self) -> &[ViewEvent] {
        &self.events
    }

    /// Drain the pending lifecycle events
    pub fn take_events(&mut self) -> Vec<ViewEvent> {
        std::mem::take(&mut self.events)
    }
}
