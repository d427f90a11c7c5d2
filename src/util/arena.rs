//! Generational arena for frame and trace records.
//!
//! Frames and trace nodes refer to each other by index rather than by
//! pointer. Every slot carries a generation counter that is bumped when the
//! slot is vacated, so an index that outlives its record resolves to `None`
//! instead of silently aliasing whatever record reuses the slot.

use core::fmt;
use core::hash::{Hash, Hasher};

/// An index into an [`Arena`], tagged with the slot generation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArenaIndex {
    index: u32,
    generation: u32,
}

impl ArenaIndex {
    /// Creates an arena index from raw parts (primarily for testing).
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot position.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the slot generation this index was issued for.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ArenaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaIndex({}:{})", self.index, self.generation)
    }
}

impl Hash for ArenaIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64((u64::from(self.index) << 32) | u64::from(self.generation));
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    state: SlotState<T>,
}

#[derive(Debug)]
enum SlotState<T> {
    Occupied(T),
    Vacant { next_free: Option<u32> },
}

/// A slot allocator handing out generation-checked [`ArenaIndex`]es.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Creates an empty arena with room for `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Returns the number of live records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no record is live.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reserves room for at least `additional` more records.
    pub fn reserve(&mut self, additional: usize) {
        self.slots.reserve(additional);
    }

    /// Inserts a record and returns its index.
    pub fn insert(&mut self, value: T) -> ArenaIndex {
        self.insert_with(|_| value)
    }

    /// Inserts the record built by `f`, which receives the index the record
    /// will live at.
    pub fn insert_with<F>(&mut self, f: F) -> ArenaIndex
    where
        F: FnOnce(ArenaIndex) -> T,
    {
        let idx = match self.free_head {
            Some(free) => {
                let slot = &self.slots[free as usize];
                let SlotState::Vacant { next_free } = slot.state else {
                    unreachable!("arena free list points at an occupied slot");
                };
                self.free_head = next_free;
                ArenaIndex::new(free, slot.generation)
            }
            None => {
                let index = u32::try_from(self.slots.len()).expect("arena overflow");
                self.slots.push(Slot {
                    generation: 0,
                    state: SlotState::Vacant { next_free: None },
                });
                ArenaIndex::new(index, 0)
            }
        };
        self.slots[idx.index as usize].state = SlotState::Occupied(f(idx));
        self.len += 1;
        idx
    }

    /// Removes the record at `index`.
    ///
    /// Returns `None` when the index is stale or the slot is already vacant.
    pub fn remove(&mut self, index: ArenaIndex) -> Option<T> {
        let slot = self.slots.get_mut(index.index as usize)?;
        if slot.generation != index.generation || matches!(slot.state, SlotState::Vacant { .. })
        {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        let old = core::mem::replace(
            &mut slot.state,
            SlotState::Vacant {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(index.index);
        self.len -= 1;
        match old {
            SlotState::Occupied(value) => Some(value),
            SlotState::Vacant { .. } => unreachable!(),
        }
    }

    /// Returns the record at `index`, if it is still live.
    #[must_use]
    pub fn get(&self, index: ArenaIndex) -> Option<&T> {
        match self.slots.get(index.index as usize)? {
            Slot {
                generation,
                state: SlotState::Occupied(value),
            } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Returns the record at `index` mutably, if it is still live.
    pub fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut T> {
        match self.slots.get_mut(index.index as usize)? {
            Slot {
                generation,
                state: SlotState::Occupied(value),
            } if *generation == index.generation => Some(value),
            _ => None,
        }
    }

    /// Returns true if `index` refers to a live record.
    #[must_use]
    pub fn contains(&self, index: ArenaIndex) -> bool {
        self.get(index).is_some()
    }

    /// Iterates over live records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaIndex, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let SlotState::Occupied(value) = &slot.state else {
                return None;
            };
            let index = u32::try_from(i).ok()?;
            Some((ArenaIndex::new(index, slot.generation), value))
        })
    }
}
