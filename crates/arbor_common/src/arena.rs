//! Generic arena for dense, ID-indexed storage with retirable slots.
//!
//! The [`Arena`] provides O(1) insertion, lookup, and removal by opaque
//! [`ArenaId`] keys. Removed slots stay vacant; IDs are never handed out twice,
//! so a stale ID can only ever observe `None`.

use std::marker::PhantomData;

/// A typed slot number. `from_raw` and `as_raw` must be inverses.
pub trait ArenaId: Copy {
    /// Wraps a slot number.
    fn from_raw(index: u32) -> Self;

    /// Unwraps the slot number.
    fn as_raw(self) -> u32;
}

/// Declares a `u32` newtype usable as an [`ArenaId`], with inherent
/// `from_raw`/`as_raw` so callers need not import the trait.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, ::serde::Serialize, ::serde::Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a slot number.
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            /// Unwraps the slot number.
            pub fn as_raw(self) -> u32 {
                self.0
            }
        }

        impl $crate::arena::ArenaId for $name {
            fn from_raw(index: u32) -> Self {
                Self(index)
            }

            fn as_raw(self) -> u32 {
                self.0
            }
        }
    };
}

/// A dense, ID-indexed container whose slots can be retired.
///
/// Items are appended in allocation order. [`remove`](Self::remove) vacates a
/// slot without shifting the others, keeping every live ID stable.
#[derive(Debug, Clone)]
pub struct Arena<I: ArenaId, T> {
    slots: Vec<Option<T>>,
    live: usize,
    _marker: PhantomData<I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    /// An arena with no slots.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            _marker: PhantomData,
        }
    }

    /// Stores `item` in a fresh slot, or returns `None` once every `u32`
    /// slot number has been handed out.
    pub fn alloc(&mut self, item: T) -> Option<I> {
        let id = I::from_raw(u32::try_from(self.slots.len()).ok()?);
        self.slots.push(Some(item));
        self.live += 1;
        Some(id)
    }

    /// The item in slot `id`, unless it was removed.
    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.as_raw() as usize)?.as_ref()
    }

    /// Mutable access to the item in slot `id`, unless it was removed.
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.as_raw() as usize)?.as_mut()
    }

    /// Vacates the slot for `id`, returning the item it held.
    pub fn remove(&mut self, id: I) -> Option<T> {
        let item = self.slots.get_mut(id.as_raw() as usize)?.take();
        if item.is_some() {
            self.live -= 1;
        }
        item
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if every slot is vacant.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of retired slots still held by the arena.
    pub fn vacant(&self) -> usize {
        self.slots.len() - self.live
    }

    /// How many more slots can be allocated.
    pub fn headroom(&self) -> usize {
        let total = u64::from(u32::MAX) + 1;
        let left = total.saturating_sub(self.slots.len() as u64);
        usize::try_from(left).unwrap_or(usize::MAX)
    }

    /// Iterates over live `(ID, &T)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| Some((I::from_raw(u32::try_from(i).ok()?), slot.as_ref()?)))
    }

    /// Iterates over references to live items in allocation order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    define_id!(
        /// Test-only ID.
        SlotId
    );

    #[test]
    fn slots_are_numbered_in_allocation_order() {
        let mut arena: Arena<SlotId, &str> = Arena::new();
        let root = arena.alloc("root").unwrap();
        let child = arena.alloc("child").unwrap();
        assert_eq!((root.as_raw(), child.as_raw()), (0, 1));
        assert_eq!(arena.get(child), Some(&"child"));
        assert_eq!(arena.get(SlotId::from_raw(9)), None);
    }

    #[test]
    fn removing_keeps_other_slots_in_place() {
        let mut arena: Arena<SlotId, u32> = Arena::new();
        let ids: Vec<SlotId> = (0..3).map(|n| arena.alloc(n * 10).unwrap()).collect();
        assert_eq!(arena.remove(ids[1]), Some(10));
        assert_eq!(arena.remove(ids[1]), None);
        assert_eq!(arena.get(ids[0]), Some(&0));
        assert_eq!(arena.get(ids[2]), Some(&20));
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn retired_slot_numbers_stay_retired() {
        let mut arena: Arena<SlotId, u32> = Arena::new();
        let old = arena.alloc(1).unwrap();
        arena.remove(old);
        assert!(arena.is_empty());
        assert_eq!(arena.vacant(), 1);
        let new = arena.alloc(2).unwrap();
        assert_ne!(old, new);
        assert_eq!(arena.get(old), None);
    }

    #[test]
    fn iteration_skips_vacancies() {
        let mut arena: Arena<SlotId, char> = Arena::new();
        let gone = ['x', 'y', 'z'].map(|c| arena.alloc(c).unwrap())[1];
        arena.remove(gone);
        assert_eq!(arena.values().collect::<String>(), "xz");
        let live: Vec<u32> = arena.iter().map(|(id, _)| id.as_raw()).collect();
        assert_eq!(live, vec![0, 2]);
    }

    #[test]
    fn entries_can_be_edited_in_place() {
        let mut arena: Arena<SlotId, Vec<u32>> = Arena::new();
        let parent = arena.alloc(Vec::new()).unwrap();
        if let Some(children) = arena.get_mut(parent) {
            children.push(7);
        }
        assert_eq!(arena.get(parent), Some(&vec![7]));
    }

    #[test]
    fn headroom_counts_down_from_u32_range() {
        let mut arena: Arena<SlotId, ()> = Arena::new();
        let full = arena.headroom();
        assert_eq!(full as u64, u64::from(u32::MAX) + 1);
        arena.alloc(()).unwrap();
        assert_eq!(arena.headroom(), full - 1);
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&SlotId::from_raw(42)).unwrap();
        assert_eq!(json, "42");
        let back: SlotId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_raw(), 42);
    }
}
