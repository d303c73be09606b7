/*!
 * Handle Arena
 * Fixed-capacity slot table addressed by small integer handles
 */

use parking_lot::RwLock;
use std::sync::Arc;

struct Slot<T> {
    generation: u32,
    value: Option<Arc<T>>,
}

/// Fixed-capacity arena of shared values
///
/// Capacity is chosen once; `insert` on a full arena returns `None` rather
/// than growing. Each slot carries a generation bumped on every insert so a
/// handle that outlives its value can be told apart from the slot's next
/// occupant.
pub struct HandleArena<T> {
    slots: Box<[RwLock<Slot<T>>]>,
}

impl<T> HandleArena<T> {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| {
                RwLock::new(Slot {
                    generation: 0,
                    value: None,
                })
            })
            .collect();
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Place a value built from its (index, generation) into the first free slot
    pub fn insert_with<F>(&self, build: F) -> Option<Arc<T>>
    where
        F: FnOnce(u16, u32) -> T,
    {
        self.try_insert_with(|index, generation| {
            Ok::<T, std::convert::Infallible>(build(index, generation))
        })
        .map(|built| match built {
            Ok(value) => value,
            Err(never) => match never {},
        })
    }

    /// Like `insert_with` for a fallible constructor
    ///
    /// `None` when the arena is full; a failed build leaves the slot free
    /// and its generation untouched.
    pub fn try_insert_with<F, E>(&self, build: F) -> Option<Result<Arc<T>, E>>
    where
        F: FnOnce(u16, u32) -> Result<T, E>,
    {
        for (index, slot) in self.slots.iter().enumerate() {
            let mut slot = slot.write();
            if slot.value.is_none() {
                let generation = slot.generation.wrapping_add(1);
                return Some(build(index as u16, generation).map(|value| {
                    let value = Arc::new(value);
                    slot.generation = generation;
                    slot.value = Some(Arc::clone(&value));
                    value
                }));
            }
        }
        None
    }

    /// Look up a slot, requiring the generation to match
    pub fn get(&self, index: u16, generation: u32) -> Option<Arc<T>> {
        let slot = self.slots.get(index as usize)?.read();
        if slot.generation != generation {
            return None;
        }
        slot.value.clone()
    }

    /// Remove a value; fails if the generation moved on
    pub fn remove(&self, index: u16, generation: u32) -> Option<Arc<T>> {
        let mut slot = self.slots.get(index as usize)?.write();
        if slot.generation != generation {
            return None;
        }
        slot.value.take()
    }

    /// Snapshot of every occupied slot
    pub fn values(&self) -> Vec<Arc<T>> {
        self.slots
            .iter()
            .filter_map(|slot| slot.read().value.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.read().value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
