//! The world façade: a registry, a name index, and singleton values.
//!
//! [`World`] is the surface applications talk to. It owns a [`Registry`]
//! and a map of world-global singleton values, and hands out
//! [`EntityMut`] wrappers whose methods chain:
//!
//! ```
//! use vesper_ecs::prelude::*;
//!
//! #[derive(Debug, Default, Clone, Copy, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! let mut world = World::new();
//! world.entity_named("player").set(Position { x: 2.0, y: 4.0 });
//! let player = world.lookup("player");
//! assert!(player.is_valid());
//! assert_eq!(world.registry().get::<Position>(player), Some(&Position { x: 2.0, y: 4.0 }));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::component::{Component, ComponentId};
use crate::entity::Entity;
use crate::registry::Registry;
use crate::view::{ComponentSet, View, ViewMut};
use crate::EcsError;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level ECS container.
pub struct World {
    registry: Registry,
    /// World-global singleton values, one per type.
    singletons: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl World {
    /// Create a new, empty world. Independent worlds share no state.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            singletons: HashMap::new(),
        }
    }

    /// Read-only access to the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the registry.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    // -- entities -----------------------------------------------------------

    /// Create a fresh anonymous entity.
    pub fn entity(&mut self) -> EntityMut<'_> {
        let entity = self.registry.create_entity();
        EntityMut { world: self, entity }
    }

    /// Get or create the entity bound to `name`.
    pub fn entity_named(&mut self, name: &str) -> EntityMut<'_> {
        let entity = self.registry.create_named_entity(name);
        EntityMut { world: self, entity }
    }

    /// The entity bound to `name`, or [`Entity::INVALID`] when unbound.
    pub fn lookup(&self, name: &str) -> Entity {
        self.registry.lookup(name).unwrap_or(Entity::INVALID)
    }

    /// Wrap an existing entity id for mutation.
    pub fn entity_mut(&mut self, entity: Entity) -> EntityMut<'_> {
        EntityMut { world: self, entity }
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.registry.entity_count()
    }

    // -- component types ----------------------------------------------------

    /// Register `T` eagerly. See [`Registry::register_type`].
    pub fn register_type<T: Component>(&mut self) -> ComponentId {
        self.registry.register_type::<T>()
    }

    /// Checked registration. See [`Registry::try_register_type`].
    pub fn try_register_type<T: Component>(&mut self) -> Result<ComponentId, EcsError> {
        self.registry.try_register_type::<T>()
    }

    /// Number of registered component types.
    pub fn component_type_count(&self) -> usize {
        self.registry.component_type_count()
    }

    // -- views --------------------------------------------------------------

    /// A read-only view over the entities holding every type in `Q`.
    pub fn view<Q: ComponentSet>(&self) -> View<'_, Q> {
        View::new(&self.registry)
    }

    /// A mutable view over the entities holding every type in `Q`.
    pub fn view_mut<Q: ComponentSet>(&mut self) -> ViewMut<'_, Q> {
        ViewMut::new(&mut self.registry)
    }

    /// Sort `T`'s column in place under `less`. See [`Registry::sort_by`].
    pub fn sort_by<T: Component>(&mut self, less: impl Fn(&T, &T) -> bool) {
        self.registry.sort_by(less);
    }

    // -- singletons ---------------------------------------------------------

    /// Install or replace the world-global `T` value.
    pub fn set_singleton<T: Component>(&mut self, value: T) {
        self.singletons.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// The world-global `T` value, if one was set.
    pub fn singleton<T: Component>(&self) -> Option<&T> {
        self.singletons.get(&TypeId::of::<T>())?.downcast_ref()
    }

    /// Mutable access to the world-global `T` value.
    pub fn singleton_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.singletons.get_mut(&TypeId::of::<T>())?.downcast_mut()
    }

    /// Drop the world-global `T` value, if one was set.
    pub fn remove_singleton<T: Component>(&mut self) -> bool {
        self.singletons.remove(&TypeId::of::<T>()).is_some()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.entity_count())
            .field("component_types", &self.component_type_count())
            .field("singletons", &self.singletons.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EntityMut
// ---------------------------------------------------------------------------

/// A borrowed handle pairing a [`World`] with one entity id.
///
/// Mutating methods return `&mut Self`, so calls chain:
/// `world.entity().add::<Velocity>().set(Position { .. })`.
pub struct EntityMut<'w> {
    world: &'w mut World,
    entity: Entity,
}

impl EntityMut<'_> {
    /// The wrapped entity handle.
    #[inline]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// The raw id value.
    #[inline]
    pub fn id(&self) -> u32 {
        self.entity.id()
    }

    /// Whether the wrapped id is anything other than the invalid sentinel.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.entity.is_valid()
    }

    /// Add a default-constructed `T`. Overwrites when already present.
    pub fn add<T: Component + Default>(&mut self) -> &mut Self {
        self.world.registry.add(self.entity, T::default());
        self
    }

    /// Set the entity's `T` value, adding it when absent.
    pub fn set<T: Component>(&mut self, value: T) -> &mut Self {
        self.world.registry.set(self.entity, value);
        self
    }

    /// Remove the entity's `T` value. No-op when absent.
    pub fn remove<T: Component>(&mut self) -> &mut Self {
        self.world.registry.remove::<T>(self.entity);
        self
    }

    /// Whether the entity holds every type in `Q` (a tuple of 1–4 types).
    pub fn has<Q: ComponentSet>(&self) -> bool {
        let Some(ids) = Q::component_ids(&self.world.registry) else {
            return false;
        };
        ids.iter().all(|&id| {
            self.world
                .registry
                .column(id)
                .is_some_and(|column| column.contains(self.entity))
        })
    }

    /// A reference to the entity's `T` value.
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.world.registry.get(self.entity)
    }

    /// A mutable reference to the entity's `T` value.
    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.world.registry.get_mut(self.entity)
    }

    /// The name bound to this entity, if any.
    pub fn name(&self) -> Option<&str> {
        self.world.registry.name_of(self.entity)
    }

    /// Names of the component types this entity holds.
    pub fn component_names(&self) -> Vec<&'static str> {
        self.world.registry.entity_type(self.entity)
    }

    /// Destroy the entity: every component is removed, the name unbound,
    /// and the id released for reuse.
    pub fn destroy(self) {
        self.world.registry.destroy_entity(self.entity);
    }
}

impl fmt::Debug for EntityMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMut")
            .field("entity", &self.entity)
            .field("name", &self.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
