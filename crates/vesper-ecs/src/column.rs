//! The component pool: one dense, type-erased column per component type.
//!
//! A [`Column`] packs every live value of a single element type into one
//! aligned, contiguous buffer, paired with two index maps that must never
//! disagree: `entities[slot]` names the entity whose value occupies `slot`
//! (dense -> sparse) and `slots[entity]` names the slot holding that
//! entity's value (sparse -> dense). Every mutation updates both maps or
//! neither. Removal is swap-remove: the last value moves into the hole, so
//! the buffer stays dense but relative order is not preserved.
//!
//! # Safety
//!
//! Component data is stored as raw bytes; a column does not know its
//! element type at compile time. Type safety is re-established one layer
//! up: the [`Registry`](crate::registry::Registry) only routes `T` to the
//! column created for `TypeId::of::<T>()`, and every raw access goes
//! through the [`ComponentInfo`] captured at column creation.

use std::alloc::{self, Layout};
use std::collections::HashMap;
use std::fmt;
use std::ptr;

use crate::component::ComponentInfo;
use crate::entity::Entity;

/// Slot capacity every column starts with.
pub const INITIAL_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// ComponentVtable
// ---------------------------------------------------------------------------

/// Type-erased drop glue for a component type.
///
/// Created via [`ComponentVtable::new::<T>()`] and stored in the column so
/// values can be dropped without knowing the concrete type.
#[derive(Clone)]
pub struct ComponentVtable {
    /// Drop a single value in place.
    pub(crate) drop_fn: unsafe fn(*mut u8),
}

impl ComponentVtable {
    /// Create the vtable for a concrete element type `T`.
    pub fn new<T: 'static>() -> Self {
        unsafe fn drop_fn_impl<T>(ptr: *mut u8) {
            ptr::drop_in_place(ptr as *mut T);
        }

        Self {
            drop_fn: drop_fn_impl::<T>,
        }
    }
}

impl fmt::Debug for ComponentVtable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentVtable").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Column
// ---------------------------------------------------------------------------

/// A dense column of values of one element type, indexed both ways between
/// slots and entities.
pub struct Column {
    /// Element type metadata captured at creation.
    info: ComponentInfo,
    /// Drop glue for stored values.
    vtable: ComponentVtable,
    /// The aligned buffer. Dangling (but aligned) for zero-sized elements.
    data: *mut u8,
    /// Slots the buffer can hold. Doubles on growth, so it is always a
    /// power of two at least [`INITIAL_CAPACITY`].
    capacity: usize,
    /// Dense -> sparse: the entity whose value occupies each slot.
    entities: Vec<Entity>,
    /// Sparse -> dense: the slot holding each entity's value.
    slots: HashMap<Entity, usize>,
    /// True only if the latest mutation was a sort.
    sorted: bool,
}

// The column stores raw bytes of element types that are `Send + Sync`
// (the `Component` bound at registration enforces this).
unsafe impl Send for Column {}
unsafe impl Sync for Column {}

impl Column {
    /// Create a column for the element type described by `info`, with
    /// [`INITIAL_CAPACITY`] slots allocated up front.
    pub(crate) fn new(info: ComponentInfo, vtable: ComponentVtable) -> Self {
        let data = if info.size == 0 {
            // ZST: no allocation, dangling aligned pointer.
            info.align as *mut u8
        } else {
            let layout = Self::layout(&info, INITIAL_CAPACITY);
            let data = unsafe { alloc::alloc(layout) };
            assert!(!data.is_null(), "column allocation failed");
            data
        };
        Self {
            info,
            vtable,
            data,
            capacity: INITIAL_CAPACITY,
            entities: Vec::new(),
            slots: HashMap::new(),
            sorted: false,
        }
    }

    fn layout(info: &ComponentInfo, capacity: usize) -> Layout {
        Layout::from_size_align(info.size * capacity, info.align).expect("column layout overflow")
    }

    // -- accessors ----------------------------------------------------------

    /// Metadata of the stored element type.
    #[inline]
    pub fn info(&self) -> &ComponentInfo {
        &self.info
    }

    /// Human-readable name of the stored element type.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.info.name
    }

    /// Number of stored values.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the column is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Slots the current buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the column is known to still be in the order the last sort
    /// established. A hint: mutable borrows handed out by the registry can
    /// break order without clearing it.
    #[inline]
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Whether `entity` has a value in this column.
    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.slots.contains_key(&entity)
    }

    /// The slot holding `entity`'s value, if present.
    #[inline]
    pub fn slot_of(&self, entity: Entity) -> Option<usize> {
        self.slots.get(&entity).copied()
    }

    /// The dense entity array: `entities()[slot]` owns the value in `slot`.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    // -- internal helpers ---------------------------------------------------

    /// Double the buffer. The old buffer is released only after its
    /// contents have moved.
    fn grow(&mut self) {
        let new_capacity = self.capacity * 2;
        if self.info.size > 0 {
            let old_layout = Self::layout(&self.info, self.capacity);
            let new_layout = Self::layout(&self.info, new_capacity);
            let data = unsafe { alloc::realloc(self.data, old_layout, new_layout.size()) };
            assert!(!data.is_null(), "column reallocation failed");
            self.data = data;
        }
        self.capacity = new_capacity;
    }

    /// Pointer to the value in `slot`.
    ///
    /// # Safety
    ///
    /// `slot` must be less than `self.len()`.
    #[inline]
    pub(crate) unsafe fn ptr_at(&self, slot: usize) -> *mut u8 {
        debug_assert!(slot < self.entities.len());
        if self.info.size == 0 {
            return self.info.align as *mut u8;
        }
        self.data.add(slot * self.info.size)
    }

    // -- mutation -----------------------------------------------------------

    /// Move the value at `src` into a fresh slot for `entity` and return a
    /// pointer to the stored copy. Clears the sorted hint.
    ///
    /// # Safety
    ///
    /// `src` must point to a valid, initialized value of the column's
    /// element type. Ownership moves into the column; the caller must not
    /// drop the source. `entity` must not already be present.
    pub(crate) unsafe fn insert_raw(&mut self, entity: Entity, src: *const u8) -> *mut u8 {
        debug_assert!(
            !self.slots.contains_key(&entity),
            "entity {entity} already present in column {}",
            self.info.name
        );
        if self.entities.len() == self.capacity {
            self.grow();
        }
        let slot = self.entities.len();
        self.slots.insert(entity, slot);
        self.entities.push(entity);
        self.sorted = false;
        let dst = self.ptr_at(slot);
        if self.info.size > 0 {
            ptr::copy_nonoverlapping(src, dst, self.info.size);
        }
        dst
    }

    /// Overwrite `entity`'s value with the value at `src`, dropping the old
    /// one. Clears the sorted hint: an overwrite can break a previously
    /// established order.
    ///
    /// # Safety
    ///
    /// Same contract as [`insert_raw`](Self::insert_raw) for `src`;
    /// `entity` must be present.
    pub(crate) unsafe fn write_raw(&mut self, entity: Entity, src: *const u8) {
        let slot = self.slots[&entity];
        if self.info.size > 0 {
            let dst = self.ptr_at(slot);
            (self.vtable.drop_fn)(dst);
            ptr::copy_nonoverlapping(src, dst, self.info.size);
        }
        self.sorted = false;
    }

    /// Swap-remove `entity`'s value: the last slot's value moves into the
    /// hole and both index maps are patched. Returns `false` when `entity`
    /// is not present.
    pub(crate) fn remove(&mut self, entity: Entity) -> bool {
        let Some(slot) = self.slots.remove(&entity) else {
            return false;
        };
        let last = self.entities.len() - 1;
        unsafe {
            if self.info.size > 0 {
                (self.vtable.drop_fn)(self.ptr_at(slot));
                if slot != last {
                    ptr::copy_nonoverlapping(self.ptr_at(last), self.ptr_at(slot), self.info.size);
                }
            }
        }
        self.entities.swap_remove(slot);
        if slot < self.entities.len() {
            let moved = self.entities[slot];
            self.slots.insert(moved, slot);
        }
        self.sorted = false;
        true
    }

    /// Swap the values in slots `i` and `j` together with both index maps.
    ///
    /// Sort goes through here, so the dense/sparse pairing holds after
    /// every partition step.
    pub(crate) fn swap_slots(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }
        assert!(i < self.entities.len() && j < self.entities.len());
        if self.info.size > 0 {
            unsafe {
                ptr::swap_nonoverlapping(self.ptr_at(i), self.ptr_at(j), self.info.size);
            }
        }
        self.entities.swap(i, j);
        self.slots.insert(self.entities[i], i);
        self.slots.insert(self.entities[j], j);
    }

    // -- sort ---------------------------------------------------------------

    /// In-place unstable sort of the column's values under `less`.
    ///
    /// Lomuto-partition quicksort with the last element of each range as
    /// pivot; every swap goes through [`swap_slots`](Self::swap_slots), so
    /// the index maps stay consistent at every step. Equal values may be
    /// reordered. Skips when fewer than two values are stored or the
    /// column is already flagged sorted; sets the flag on completion.
    ///
    /// # Safety
    ///
    /// `less` must treat both pointers as valid instances of the column's
    /// element type.
    pub(crate) unsafe fn sort_unstable_by_raw(&mut self, less: &dyn Fn(*const u8, *const u8) -> bool) {
        if self.sorted || self.entities.len() < 2 {
            return;
        }
        self.quicksort(0, self.entities.len() - 1, less);
        self.sorted = true;
    }

    /// Quicksort over the inclusive slot range `[lo, hi]`.
    unsafe fn quicksort(&mut self, lo: usize, hi: usize, less: &dyn Fn(*const u8, *const u8) -> bool) {
        if lo >= hi {
            return;
        }
        let pivot = self.partition(lo, hi, less);
        if pivot > lo {
            self.quicksort(lo, pivot - 1, less);
        }
        if pivot < hi {
            self.quicksort(pivot + 1, hi, less);
        }
    }

    /// Lomuto partition: the pivot is the value in `hi` and stays there
    /// until the final swap, since `probe` never reaches it.
    unsafe fn partition(&mut self, lo: usize, hi: usize, less: &dyn Fn(*const u8, *const u8) -> bool) -> usize {
        let mut store = lo;
        for probe in lo..hi {
            if less(self.ptr_at(probe), self.ptr_at(hi)) {
                self.swap_slots(store, probe);
                store += 1;
            }
        }
        self.swap_slots(store, hi);
        store
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if self.info.size == 0 {
            return;
        }
        unsafe {
            for slot in 0..self.entities.len() {
                (self.vtable.drop_fn)(self.ptr_at(slot));
            }
            alloc::dealloc(self.data, Self::layout(&self.info, self.capacity));
        }
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.info.name)
            .field("len", &self.entities.len())
            .field("capacity", &self.capacity)
            .field("sorted", &self.sorted)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
