//! Vesper ECS -- sparse-set Entity Component System core for the Vesper
//! Engine.
//!
//! Every component type lives in its own [`Column`](column::Column): a
//! dense, contiguous buffer of values paired with a sparse map between
//! entities and slots. Removal is swap-remove, so columns stay packed at
//! the cost of ordering; views join columns by iterating the smallest one
//! and probing the rest; an in-place sort reorders a column while keeping
//! its sparse index consistent.
//!
//! Everything is single-threaded: no operation suspends, and a [`World`]
//! must not be shared across threads without external synchronization.
//!
//! # Quick Start
//!
//! ```
//! use vesper_ecs::prelude::*;
//!
//! #[derive(Debug, Default, Clone, Copy, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Default, Clone, Copy, PartialEq)]
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let mut world = World::new();
//! let player = world
//!     .entity_named("player")
//!     .set(Position { x: 0.0, y: 0.0 })
//!     .set(Velocity { dx: 1.0, dy: 0.5 })
//!     .entity();
//!
//! // Scenery has a position but no velocity; the view skips it.
//! world.entity().set(Position { x: 9.0, y: 9.0 });
//!
//! let mut seen = 0;
//! world.view::<(Position, Velocity)>().each(|entity, (position, velocity)| {
//!     assert_eq!(entity, player);
//!     assert_eq!(position.x + velocity.dx, 1.0);
//!     seen += 1;
//! });
//! assert_eq!(seen, 1);
//! ```

#![deny(unsafe_code)]

#[allow(unsafe_code)]
pub mod column;
pub mod component;
pub mod entity;
#[allow(unsafe_code)]
pub mod registry;
#[allow(unsafe_code)]
pub mod view;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// Most misuse is absorbed by sentinel returns -- absent lookups yield
/// `None`, removes of absent components are no-ops -- so this enum only
/// backs the checked paths.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The 8-bit component-type id space (254 types) is exhausted.
    #[error("component type limit (254) reached; cannot register '{0}'")]
    ComponentLimitReached(&'static str),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::column::{Column, INITIAL_CAPACITY};
    pub use crate::component::{Component, ComponentId, ComponentInfo, MAX_COMPONENT_TYPES};
    pub use crate::entity::Entity;
    pub use crate::registry::Registry;
    pub use crate::view::{ComponentSet, View, ViewMut};
    pub use crate::world::{EntityMut, World};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    // -- test component types -----------------------------------------------

    #[derive(Debug, Default, Clone, Copy, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }

    // -- entity lifecycle ---------------------------------------------------

    #[test]
    fn anonymous_entity_ids_are_unique() {
        let mut world = World::new();
        let a = world.entity().entity();
        let b = world.entity().entity();
        assert_ne!(a, b);
    }

    #[test]
    fn named_lookup() {
        let mut world = World::new();
        let ship = world.entity_named("ship").entity();
        assert_eq!(world.lookup("ship").id(), ship.id());
        assert!(!world.lookup("missing").is_valid());
    }

    #[test]
    fn destroyed_ids_recycle_fifo() {
        let mut world = World::new();
        let a = world.entity().entity();
        let b = world.entity().entity();
        world.entity_mut(a).destroy();
        world.entity_mut(b).destroy();
        // Oldest release comes back first.
        assert_eq!(world.entity().entity(), a);
        assert_eq!(world.entity().entity(), b);
    }

    // -- chained mutation ---------------------------------------------------

    #[test]
    fn chained_mutation() {
        let mut world = World::new();
        let e = world.entity().entity();

        world.entity_mut(e).set(Position { x: 2.5, y: 3.14 });
        assert_eq!(
            world.entity_mut(e).get::<Position>(),
            Some(&Position { x: 2.5, y: 3.14 })
        );

        world
            .entity_mut(e)
            .add::<Velocity>()
            .set(Velocity { dx: 1.0, dy: 1.0 });
        assert!(world.entity_mut(e).has::<(Position, Velocity)>());

        world.entity_mut(e).remove::<Velocity>();
        assert!(!world.entity_mut(e).has::<(Velocity,)>());
        assert!(world.entity_mut(e).has::<(Position,)>());
    }

    // -- round trips --------------------------------------------------------

    #[test]
    fn set_twice_reads_latest() {
        let mut world = World::new();
        let e = world.entity().entity();
        world.entity_mut(e).set(Position { x: 1.0, y: 1.0 });
        world.entity_mut(e).set(Position { x: 2.0, y: 2.0 });
        assert_eq!(
            world.registry().get::<Position>(e),
            Some(&Position { x: 2.0, y: 2.0 })
        );
    }

    #[test]
    fn add_remove_add_is_consistent() {
        let mut world = World::new();
        let e = world.entity().entity();
        world.entity_mut(e).set(Position { x: 1.0, y: 0.0 });
        world.entity_mut(e).remove::<Position>();
        assert!(!world.entity_mut(e).has::<(Position,)>());
        world.entity_mut(e).set(Position { x: 5.0, y: 0.0 });
        assert!(world.entity_mut(e).has::<(Position,)>());
        assert_eq!(
            world.registry().get::<Position>(e),
            Some(&Position { x: 5.0, y: 0.0 })
        );
    }

    // -- swap-remove integrity ----------------------------------------------

    #[test]
    fn swap_remove_preserves_other_values() {
        let mut world = World::new();
        let entities: Vec<Entity> = (0..5)
            .map(|i| {
                world
                    .entity()
                    .set(Position {
                        x: i as f32,
                        y: 0.0,
                    })
                    .entity()
            })
            .collect();

        world.entity_mut(entities[2]).remove::<Position>();

        for (i, &e) in entities.iter().enumerate() {
            if i == 2 {
                assert_eq!(world.registry().get::<Position>(e), None);
            } else {
                assert_eq!(
                    world.registry().get::<Position>(e),
                    Some(&Position {
                        x: i as f32,
                        y: 0.0
                    })
                );
            }
        }
    }

    // -- view join ----------------------------------------------------------

    #[test]
    fn view_joins_on_smallest_column() {
        let mut world = World::new();
        let mut with_velocity = Vec::new();
        for i in 0..10 {
            let e = world
                .entity()
                .set(Position {
                    x: i as f32,
                    y: 0.0,
                })
                .entity();
            if i < 3 {
                world.entity_mut(e).set(Velocity { dx: 1.0, dy: 0.0 });
                with_velocity.push(e);
            }
        }

        let mut visited = Vec::new();
        world
            .view::<(Position, Velocity)>()
            .each(|entity, (_, _)| visited.push(entity));

        assert_eq!(visited.len(), 3);
        visited.sort();
        assert_eq!(visited, with_velocity);
    }

    #[test]
    fn view_mut_integrates_velocity() {
        let mut world = World::new();
        let e = world
            .entity()
            .set(Position { x: 0.0, y: 0.0 })
            .set(Velocity { dx: 1.0, dy: 2.0 })
            .entity();

        world
            .view_mut::<(Position, Velocity)>()
            .each(|_, (position, velocity)| {
                position.x += velocity.dx;
                position.y += velocity.dy;
            });

        assert_eq!(
            world.registry().get::<Position>(e),
            Some(&Position { x: 1.0, y: 2.0 })
        );
    }

    // -- sort ---------------------------------------------------------------

    #[test]
    fn sort_preserves_entity_mapping() {
        let mut world = World::new();
        let xs = [3.0f32, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];
        let entities: Vec<Entity> = xs
            .iter()
            .map(|&x| world.entity().set(Position { x, y: 0.0 }).entity())
            .collect();

        world.sort_by::<Position>(|a, b| a.x < b.x);

        // Dense order is non-decreasing by x.
        let column = world
            .registry()
            .column(world.registry().component_id::<Position>().unwrap())
            .unwrap();
        let dense: Vec<f32> = column
            .entities()
            .iter()
            .map(|&e| world.registry().get::<Position>(e).unwrap().x)
            .collect();
        for pair in dense.windows(2) {
            assert!(pair[0] <= pair[1]);
        }

        // Every entity still reads the value it was inserted with.
        for (&e, &x) in entities.iter().zip(&xs) {
            assert_eq!(
                world.registry().get::<Position>(e),
                Some(&Position { x, y: 0.0 })
            );
        }
    }

    // -- scale --------------------------------------------------------------

    #[test]
    fn scale_10k_entities() {
        let mut world = World::new();

        let entities: Vec<Entity> = (0..10_000)
            .map(|i| {
                world
                    .entity()
                    .set(Position {
                        x: i as f32,
                        y: 0.0,
                    })
                    .set(Velocity { dx: 1.0, dy: -1.0 })
                    .entity()
            })
            .collect();

        let mut count = 0;
        world.view::<(Position, Velocity)>().each(|_, _| count += 1);
        assert_eq!(count, 10_000);

        // Destroy half, count again.
        for &e in entities.iter().take(5_000) {
            world.entity_mut(e).destroy();
        }
        let mut count = 0;
        world.view::<(Position, Velocity)>().each(|_, _| count += 1);
        assert_eq!(count, 5_000);
        assert_eq!(world.entity_count(), 5_000);

        // Survivors kept their values.
        assert_eq!(
            world.registry().get::<Position>(entities[7_500]),
            Some(&Position { x: 7_500.0, y: 0.0 })
        );
    }
}
