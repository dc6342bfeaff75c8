//! Fixed-capacity generational arena
//!
//! Slots are reused after removal, but every removal bumps the slot's
//! generation so handles to the old occupant stop resolving.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u16,
    generation: u16,
}

impl Handle {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    /// Pack as `(generation << 16) | (index + 1)`; never zero
    pub fn to_wire(self) -> u32 {
        ((self.generation as u32) << 16) | (self.index as u32 + 1)
    }

    pub fn from_wire(id: u32) -> Option<Self> {
        let slot = id & 0xFFFF;
        if slot == 0 {
            return None;
        }
        Some(Self {
            index: (slot - 1) as u16,
            generation: (id >> 16) as u16,
        })
    }
}

struct Slot<T> {
    generation: u16,
    value: Option<T>,
}

pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    capacity: usize,
    len: usize,
}

impl<T> Arena<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(u16::MAX as usize - 1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            len: 0,
        }
    }

    /// Store `value`, handing it back when the arena is full
    pub fn insert(&mut self, value: T) -> Result<Handle, T> {
        if let Some(index) = self.slots.iter().position(|s| s.value.is_none()) {
            let slot = &mut self.slots[index];
            slot.value = Some(value);
            self.len += 1;
            return Ok(Handle {
                index: index as u16,
                generation: slot.generation,
            });
        }
        if self.slots.len() >= self.capacity {
            return Err(value);
        }
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        self.len += 1;
        Ok(Handle {
            index: (self.slots.len() - 1) as u16,
            generation: 0,
        })
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    Handle {
                        index: index as u16,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(|value| {
                (
                    Handle {
                        index: index as u16,
                        generation,
                    },
                    value,
                )
            })
        })
    }
}
