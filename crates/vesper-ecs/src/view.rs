//! Views join several columns and visit the entities present in all of
//! them.
//!
//! Iteration is driven by the smallest participating column; every other
//! column is only probed for membership, so the join costs
//! `O(smallest * probes)`. With a single component type the view
//! degenerates to a sequential scan of that column's dense buffer.
//!
//! ## Soundness
//!
//! Read-only views are built from `&Registry` and hand out `&T`.
//! [`ViewMut`] is built from an exclusive `&mut Registry` borrow, so the
//! traversal holds the registry exclusively; the `&mut T` references it
//! hands out are derived from per-column raw pointers, and a
//! duplicate-type check rejects the one way two of them could alias.

use std::marker::PhantomData;

use crate::component::{Component, ComponentId};
use crate::entity::Entity;
use crate::registry::Registry;

// ---------------------------------------------------------------------------
// ComponentSet -- tuples of element types
// ---------------------------------------------------------------------------

/// A tuple of component types `(T1, ..., Tn)`, 1 <= n <= 4, usable as a view
/// parameter or a multi-type membership probe.
pub trait ComponentSet {
    /// Immutable references into each column: `(&T1, ..., &Tn)`.
    type Refs<'w>;
    /// Mutable references into each column.
    type RefsMut<'w>;

    /// Resolve every member type to its component id, in tuple order.
    /// `None` when any member is unregistered (no entity can match then).
    fn component_ids(registry: &Registry) -> Option<Vec<ComponentId>>;

    /// Fetch references for `entity`, reading the driver column by `slot`.
    ///
    /// # Safety
    ///
    /// `ids` must be the resolution produced by
    /// [`component_ids`](Self::component_ids) on this same registry,
    /// `entity` must be present in every member column, and when a
    /// member's id equals `driver`, `slot` must be `entity`'s slot in that
    /// column.
    unsafe fn fetch<'w>(
        registry: &'w Registry,
        ids: &[ComponentId],
        driver: ComponentId,
        slot: usize,
        entity: Entity,
    ) -> Self::Refs<'w>;

    /// Mutable variant of [`fetch`](Self::fetch).
    ///
    /// # Safety
    ///
    /// Same contract as `fetch`. Additionally the caller must hold the
    /// registry exclusively and `ids` must be pairwise distinct, or the
    /// returned references would alias.
    unsafe fn fetch_mut<'w>(
        registry: &'w Registry,
        ids: &[ComponentId],
        driver: ComponentId,
        slot: usize,
        entity: Entity,
    ) -> Self::RefsMut<'w>;
}

/// Resolve one member reference. The driver column is read by `slot`
/// directly (the contiguous path); every other column goes through its
/// sparse map.
///
/// # Safety
///
/// See [`ComponentSet::fetch`].
unsafe fn item_ref<'w, T: Component>(
    registry: &'w Registry,
    id: ComponentId,
    driver: ComponentId,
    slot: usize,
    entity: Entity,
) -> &'w T {
    let column = registry.column(id).expect("resolved id has a column");
    let slot = if id == driver {
        slot
    } else {
        column.slot_of(entity).expect("membership probed before fetch")
    };
    &*(column.ptr_at(slot) as *const T)
}

/// Mutable variant of [`item_ref`].
///
/// The write goes through the column's own buffer pointer, not through the
/// shared registry reference, so handing out `&mut T` here is sound as long
/// as the caller upholds the [`ComponentSet::fetch_mut`] contract.
///
/// # Safety
///
/// See [`ComponentSet::fetch_mut`].
unsafe fn item_mut<'w, T: Component>(
    registry: &'w Registry,
    id: ComponentId,
    driver: ComponentId,
    slot: usize,
    entity: Entity,
) -> &'w mut T {
    let column = registry.column(id).expect("resolved id has a column");
    let slot = if id == driver {
        slot
    } else {
        column.slot_of(entity).expect("membership probed before fetch")
    };
    &mut *(column.ptr_at(slot) as *mut T)
}

impl<A: Component> ComponentSet for (A,) {
    type Refs<'w> = (&'w A,);
    type RefsMut<'w> = (&'w mut A,);

    fn component_ids(registry: &Registry) -> Option<Vec<ComponentId>> {
        Some(vec![registry.component_id::<A>()?])
    }

    unsafe fn fetch<'w>(
        registry: &'w Registry,
        ids: &[ComponentId],
        driver: ComponentId,
        slot: usize,
        entity: Entity,
    ) -> Self::Refs<'w> {
        (item_ref::<A>(registry, ids[0], driver, slot, entity),)
    }

    unsafe fn fetch_mut<'w>(
        registry: &'w Registry,
        ids: &[ComponentId],
        driver: ComponentId,
        slot: usize,
        entity: Entity,
    ) -> Self::RefsMut<'w> {
        (item_mut::<A>(registry, ids[0], driver, slot, entity),)
    }
}

impl<A: Component, B: Component> ComponentSet for (A, B) {
    type Refs<'w> = (&'w A, &'w B);
    type RefsMut<'w> = (&'w mut A, &'w mut B);

    fn component_ids(registry: &Registry) -> Option<Vec<ComponentId>> {
        Some(vec![
            registry.component_id::<A>()?,
            registry.component_id::<B>()?,
        ])
    }

    unsafe fn fetch<'w>(
        registry: &'w Registry,
        ids: &[ComponentId],
        driver: ComponentId,
        slot: usize,
        entity: Entity,
    ) -> Self::Refs<'w> {
        (
            item_ref::<A>(registry, ids[0], driver, slot, entity),
            item_ref::<B>(registry, ids[1], driver, slot, entity),
        )
    }

    unsafe fn fetch_mut<'w>(
        registry: &'w Registry,
        ids: &[ComponentId],
        driver: ComponentId,
        slot: usize,
        entity: Entity,
    ) -> Self::RefsMut<'w> {
        (
            item_mut::<A>(registry, ids[0], driver, slot, entity),
            item_mut::<B>(registry, ids[1], driver, slot, entity),
        )
    }
}

impl<A: Component, B: Component, C: Component> ComponentSet for (A, B, C) {
    type Refs<'w> = (&'w A, &'w B, &'w C);
    type RefsMut<'w> = (&'w mut A, &'w mut B, &'w mut C);

    fn component_ids(registry: &Registry) -> Option<Vec<ComponentId>> {
        Some(vec![
            registry.component_id::<A>()?,
            registry.component_id::<B>()?,
            registry.component_id::<C>()?,
        ])
    }

    unsafe fn fetch<'w>(
        registry: &'w Registry,
        ids: &[ComponentId],
        driver: ComponentId,
        slot: usize,
        entity: Entity,
    ) -> Self::Refs<'w> {
        (
            item_ref::<A>(registry, ids[0], driver, slot, entity),
            item_ref::<B>(registry, ids[1], driver, slot, entity),
            item_ref::<C>(registry, ids[2], driver, slot, entity),
        )
    }

    unsafe fn fetch_mut<'w>(
        registry: &'w Registry,
        ids: &[ComponentId],
        driver: ComponentId,
        slot: usize,
        entity: Entity,
    ) -> Self::RefsMut<'w> {
        (
            item_mut::<A>(registry, ids[0], driver, slot, entity),
            item_mut::<B>(registry, ids[1], driver, slot, entity),
            item_mut::<C>(registry, ids[2], driver, slot, entity),
        )
    }
}

impl<A: Component, B: Component, C: Component, D: Component> ComponentSet for (A, B, C, D) {
    type Refs<'w> = (&'w A, &'w B, &'w C, &'w D);
    type RefsMut<'w> = (&'w mut A, &'w mut B, &'w mut C, &'w mut D);

    fn component_ids(registry: &Registry) -> Option<Vec<ComponentId>> {
        Some(vec![
            registry.component_id::<A>()?,
            registry.component_id::<B>()?,
            registry.component_id::<C>()?,
            registry.component_id::<D>()?,
        ])
    }

    unsafe fn fetch<'w>(
        registry: &'w Registry,
        ids: &[ComponentId],
        driver: ComponentId,
        slot: usize,
        entity: Entity,
    ) -> Self::Refs<'w> {
        (
            item_ref::<A>(registry, ids[0], driver, slot, entity),
            item_ref::<B>(registry, ids[1], driver, slot, entity),
            item_ref::<C>(registry, ids[2], driver, slot, entity),
            item_ref::<D>(registry, ids[3], driver, slot, entity),
        )
    }

    unsafe fn fetch_mut<'w>(
        registry: &'w Registry,
        ids: &[ComponentId],
        driver: ComponentId,
        slot: usize,
        entity: Entity,
    ) -> Self::RefsMut<'w> {
        (
            item_mut::<A>(registry, ids[0], driver, slot, entity),
            item_mut::<B>(registry, ids[1], driver, slot, entity),
            item_mut::<C>(registry, ids[2], driver, slot, entity),
            item_mut::<D>(registry, ids[3], driver, slot, entity),
        )
    }
}

// ---------------------------------------------------------------------------
// View (read-only)
// ---------------------------------------------------------------------------

/// Read-only view over the entities holding every type in `Q`.
pub struct View<'w, Q: ComponentSet> {
    registry: &'w Registry,
    _marker: PhantomData<Q>,
}

impl<'w, Q: ComponentSet> View<'w, Q> {
    pub(crate) fn new(registry: &'w Registry) -> Self {
        Self {
            registry,
            _marker: PhantomData,
        }
    }

    /// Visit every entity that holds all of `Q`'s types.
    ///
    /// Order follows the driver (smallest) column's dense order; inserts,
    /// removes, and sorts may reorder it arbitrarily between calls. With a
    /// single component type this is a sequential scan of the dense
    /// buffer.
    pub fn each(&self, mut f: impl FnMut(Entity, Q::Refs<'_>)) {
        let Some(ids) = Q::component_ids(self.registry) else {
            return;
        };
        let Some(driver_column) = self.registry.smallest_column(&ids) else {
            return;
        };
        let driver = driver_column.info().id;
        for slot in 0..driver_column.len() {
            let entity = driver_column.entities()[slot];
            if !contains_all(self.registry, &ids, driver, entity) {
                continue;
            }
            // Safety: ids were resolved on this registry, membership in
            // every column was just probed, and `slot` is `entity`'s slot
            // in the driver column.
            let refs = unsafe { Q::fetch(self.registry, &ids, driver, slot, entity) };
            f(entity, refs);
        }
    }
}

// ---------------------------------------------------------------------------
// ViewMut
// ---------------------------------------------------------------------------

/// Mutable view; yields `&mut` references into every member column.
///
/// Constructed from `&mut Registry` (via `World::view_mut`), which makes
/// the traversal exclusive: no other registry access can overlap it.
pub struct ViewMut<'w, Q: ComponentSet> {
    registry: &'w mut Registry,
    _marker: PhantomData<Q>,
}

impl<'w, Q: ComponentSet> ViewMut<'w, Q> {
    pub(crate) fn new(registry: &'w mut Registry) -> Self {
        Self {
            registry,
            _marker: PhantomData,
        }
    }

    /// Visit every matching entity with mutable access to each value.
    ///
    /// # Panics
    ///
    /// Panics when `Q` names the same component type twice; two mutable
    /// borrows of one column would alias.
    pub fn each(&mut self, mut f: impl FnMut(Entity, Q::RefsMut<'_>)) {
        let registry: &Registry = self.registry;
        let Some(ids) = Q::component_ids(registry) else {
            return;
        };
        for (i, id) in ids.iter().enumerate() {
            assert!(
                !ids[..i].contains(id),
                "view contains duplicate mutable access to the same component type"
            );
        }
        let Some(driver_column) = registry.smallest_column(&ids) else {
            return;
        };
        let driver = driver_column.info().id;
        for slot in 0..driver_column.len() {
            let entity = driver_column.entities()[slot];
            if !contains_all(registry, &ids, driver, entity) {
                continue;
            }
            // Safety: same as the read-only path, plus: this ViewMut was
            // built from `&mut Registry` so the traversal is exclusive,
            // and the duplicate check above guarantees the per-column
            // pointers are distinct.
            let refs = unsafe { Q::fetch_mut(registry, &ids, driver, slot, entity) };
            f(entity, refs);
        }
    }
}

/// Whether `entity` is present in every column of `ids`. The driver is
/// skipped; the entity came from its dense array.
fn contains_all(registry: &Registry, ids: &[ComponentId], driver: ComponentId, entity: Entity) -> bool {
    ids.iter().all(|&id| {
        id == driver
            || registry
                .column(id)
                .is_some_and(|column| column.contains(entity))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Vel {
        dx: f32,
        dy: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Health(u32);

    #[test]
    fn join_visits_intersection_only() {
        let mut registry = Registry::new();
        let mut with_both = Vec::new();
        for i in 0..10u32 {
            let e = registry.create_entity();
            registry.add(e, Pos { x: i as f32, y: 0.0 });
            if i % 3 == 0 {
                registry.add(e, Vel { dx: 1.0, dy: 1.0 });
                with_both.push(e);
            }
        }

        let mut visited = Vec::new();
        View::<(Pos, Vel)>::new(&registry).each(|entity, (pos, vel)| {
            assert_eq!(pos.x, entity.id() as f32);
            assert_eq!(vel.dx, 1.0);
            visited.push(entity);
        });

        visited.sort();
        assert_eq!(visited, with_both);
    }

    #[test]
    fn single_component_scans_dense_order() {
        let mut registry = Registry::new();
        for i in 0..5u32 {
            let e = registry.create_entity();
            registry.add(e, Health(i));
        }

        let mut seen = Vec::new();
        View::<(Health,)>::new(&registry).each(|entity, (health,)| {
            seen.push((entity, health.0));
        });

        // Dense order: insertion order while nothing was removed.
        let column = registry.column(registry.component_id::<Health>().unwrap()).unwrap();
        let dense: Vec<Entity> = column.entities().to_vec();
        assert_eq!(seen.iter().map(|(e, _)| *e).collect::<Vec<_>>(), dense);
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn view_over_unregistered_type_is_empty() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add(e, Pos { x: 0.0, y: 0.0 });

        let mut count = 0;
        View::<(Pos, Vel)>::new(&registry).each(|_, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn three_way_join() {
        let mut registry = Registry::new();
        let a = registry.create_entity();
        let b = registry.create_entity();
        for &e in &[a, b] {
            registry.add(e, Pos { x: 0.0, y: 0.0 });
            registry.add(e, Vel { dx: 0.0, dy: 0.0 });
        }
        registry.add(a, Health(1));

        let mut visited = Vec::new();
        View::<(Pos, Vel, Health)>::new(&registry).each(|entity, (_, _, health)| {
            visited.push((entity, health.0));
        });
        assert_eq!(visited, vec![(a, 1)]);
    }

    #[test]
    fn view_mut_modifies_values() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add(e, Pos { x: 0.0, y: 0.0 });
        registry.add(e, Vel { dx: 1.0, dy: 2.0 });

        ViewMut::<(Pos, Vel)>::new(&mut registry).each(|_, (pos, vel)| {
            pos.x += vel.dx;
            pos.y += vel.dy;
        });

        assert_eq!(registry.get::<Pos>(e), Some(&Pos { x: 1.0, y: 2.0 }));
    }

    #[test]
    #[should_panic(expected = "duplicate mutable access")]
    fn view_mut_rejects_duplicate_types() {
        let mut registry = Registry::new();
        let e = registry.create_entity();
        registry.add(e, Pos { x: 0.0, y: 0.0 });

        ViewMut::<(Pos, Pos)>::new(&mut registry).each(|_, _| {});
    }
}
