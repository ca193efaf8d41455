//! The registry owns every column and is the authority for component-type
//! ids and entity ids.
//!
//! Component types are registered on first demand: the first `add`/`set`
//! of a `T` creates `T`'s column and assigns the next 8-bit id. Ids are
//! never recycled. Typed operations resolve `T` to its column and hand the
//! value over as raw bytes; the `TypeId` keyed routing is what makes the
//! raw access sound.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::column::{Column, ComponentVtable};
use crate::component::{Component, ComponentId, ComponentInfo, MAX_COMPONENT_TYPES};
use crate::entity::{Entity, IdAllocator};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owner of all component columns, plus the entity id allocator and the
/// entity name index.
pub struct Registry {
    /// One column per registered component type, indexed by `ComponentId`.
    columns: Vec<Column>,
    /// Rust type -> component id. Ids are never recycled.
    type_to_id: HashMap<TypeId, ComponentId>,
    /// Entity id allocator.
    ids: IdAllocator,
    /// Name bindings. A name maps to one entity; an entity has at most one
    /// name.
    name_to_entity: HashMap<String, Entity>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            type_to_id: HashMap::new(),
            ids: IdAllocator::new(),
            name_to_entity: HashMap::new(),
        }
    }

    // -- component types ----------------------------------------------------

    /// Register `T`, assigning the next component id on first use.
    ///
    /// Idempotent: re-registering returns the existing id. Once
    /// [`MAX_COMPONENT_TYPES`] distinct types exist this returns
    /// [`ComponentId::INVALID`]; operations routed through an invalid id go
    /// nowhere. Use [`try_register_type`](Self::try_register_type) to get
    /// the overflow as an error instead.
    pub fn register_type<T: Component>(&mut self) -> ComponentId {
        match self.try_register_type::<T>() {
            Ok(id) => id,
            Err(err) => {
                warn!("{err}");
                ComponentId::INVALID
            }
        }
    }

    /// Checked variant of [`register_type`](Self::register_type).
    pub fn try_register_type<T: Component>(&mut self) -> Result<ComponentId, EcsError> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.type_to_id.get(&type_id) {
            return Ok(existing);
        }
        if self.columns.len() >= MAX_COMPONENT_TYPES {
            return Err(EcsError::ComponentLimitReached(std::any::type_name::<T>()));
        }
        let id = ComponentId::new(self.columns.len() as u8);
        let info = ComponentInfo::of::<T>(id);
        debug!(name = info.name, id = id.raw(), size = info.size, "registered component type");
        self.columns.push(Column::new(info, ComponentVtable::new::<T>()));
        self.type_to_id.insert(type_id, id);
        Ok(id)
    }

    /// The id assigned to `T`, if `T` has been registered.
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.type_to_id.get(&TypeId::of::<T>()).copied()
    }

    /// Number of registered component types.
    pub fn component_type_count(&self) -> usize {
        self.columns.len()
    }

    /// The column assigned to `id`, if any.
    pub fn column(&self, id: ComponentId) -> Option<&Column> {
        self.columns.get(id.index())
    }

    fn column_mut(&mut self, id: ComponentId) -> Option<&mut Column> {
        self.columns.get_mut(id.index())
    }

    /// The column among `ids` with the fewest values; ties resolve to the
    /// first occurrence. `None` when no id resolves to a column.
    pub fn smallest_column(&self, ids: &[ComponentId]) -> Option<&Column> {
        ids.iter()
            .filter_map(|&id| self.column(id))
            .min_by_key(|column| column.len())
    }

    // -- entities -----------------------------------------------------------

    /// Create a fresh anonymous entity.
    pub fn create_entity(&mut self) -> Entity {
        self.ids.allocate()
    }

    /// Get or create the entity bound to `name`.
    pub fn create_named_entity(&mut self, name: &str) -> Entity {
        if let Some(&existing) = self.name_to_entity.get(name) {
            return existing;
        }
        let entity = self.ids.allocate();
        self.name_to_entity.insert(name.to_owned(), entity);
        entity
    }

    /// The entity bound to `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Entity> {
        self.name_to_entity.get(name).copied()
    }

    /// The name bound to `entity`, if any.
    pub fn name_of(&self, entity: Entity) -> Option<&str> {
        self.name_to_entity
            .iter()
            .find_map(|(name, &bound)| (bound == entity).then_some(name.as_str()))
    }

    /// Destroy `entity`: remove it from every column that holds it, unbind
    /// its name, and release the id for reuse.
    pub fn destroy_entity(&mut self, entity: Entity) {
        if !entity.is_valid() {
            return;
        }
        for column in &mut self.columns {
            column.remove(entity);
        }
        self.name_to_entity.retain(|_, bound| *bound != entity);
        self.ids.release(entity);
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.ids.live_count()
    }

    // -- typed component access ---------------------------------------------

    /// Add `value` for `entity`, registering `T` on first use. Returns a
    /// reference to the stored value, or `None` when the component id
    /// space is exhausted.
    ///
    /// Adding to an entity that already holds a `T` overwrites the value
    /// instead; the index maps would corrupt otherwise.
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) -> Option<&mut T> {
        let id = self.register_type::<T>();
        let column = self.column_mut(id)?;
        let src = &value as *const T as *const u8;
        if column.contains(entity) {
            warn!(
                component = column.name(),
                entity = entity.id(),
                "add on an entity already holding the component; overwriting"
            );
            unsafe { column.write_raw(entity, src) };
        } else {
            unsafe { column.insert_raw(entity, src) };
        }
        std::mem::forget(value);
        let slot = column.slot_of(entity)?;
        Some(unsafe { &mut *(column.ptr_at(slot) as *mut T) })
    }

    /// Set `entity`'s `T` value, adding it when absent.
    pub fn set<T: Component>(&mut self, entity: Entity, value: T) {
        let id = self.register_type::<T>();
        let Some(column) = self.column_mut(id) else {
            return;
        };
        let src = &value as *const T as *const u8;
        if column.contains(entity) {
            unsafe { column.write_raw(entity, src) };
        } else {
            unsafe { column.insert_raw(entity, src) };
        }
        std::mem::forget(value);
    }

    /// Remove `entity`'s `T` value. No-op when absent.
    pub fn remove<T: Component>(&mut self, entity: Entity) {
        let Some(id) = self.component_id::<T>() else {
            return;
        };
        if let Some(column) = self.column_mut(id) {
            column.remove(entity);
        }
    }

    /// Whether `entity` holds a `T` value.
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.component_id::<T>()
            .and_then(|id| self.column(id))
            .is_some_and(|column| column.contains(entity))
    }

    /// A reference to `entity`'s `T` value.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        let column = self.column(self.component_id::<T>()?)?;
        let slot = column.slot_of(entity)?;
        // The column was created for TypeId::of::<T>(), so the cast is the
        // registered element type.
        Some(unsafe { &*(column.ptr_at(slot) as *const T) })
    }

    /// A mutable reference to `entity`'s `T` value.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let id = self.component_id::<T>()?;
        let column = self.column_mut(id)?;
        let slot = column.slot_of(entity)?;
        Some(unsafe { &mut *(column.ptr_at(slot) as *mut T) })
    }

    /// Names of the columns that hold `entity`.
    pub fn entity_type(&self, entity: Entity) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|column| column.contains(entity))
            .map(|column| column.name())
            .collect()
    }

    // -- sort ---------------------------------------------------------------

    /// Sort `T`'s column in place under `less` (a strict "comes before"
    /// order). Equal values may be reordered; every swap updates the index
    /// maps. No-op when `T` is unregistered or the column is already
    /// flagged sorted.
    pub fn sort_by<T: Component>(&mut self, less: impl Fn(&T, &T) -> bool) {
        let Some(id) = self.component_id::<T>() else {
            return;
        };
        let Some(column) = self.column_mut(id) else {
            return;
        };
        let raw_less =
            |a: *const u8, b: *const u8| unsafe { less(&*(a as *const T), &*(b as *const T)) };
        unsafe { column.sort_unstable_by_raw(&raw_less) };
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.entity_count())
            .field("component_types", &self.columns.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
