/// A stable handle into a [`Slab`].
///
/// The generation is bumped every time a slot is vacated, so a key kept
/// around after its value was removed never resolves to a later occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

enum Entry<T> {
    Vacant { generation: u32 },
    Occupied { generation: u32, value: T },
}

/// A generational slab allocator.
///
/// A `Slab` stores values of type `T` in a contiguous array and hands out
/// [`Key`]s that stay valid until the value is removed. Freed slots are
/// reused, but each reuse carries a new generation.
///
/// Removal through a stale key is a no-op, which is what lets teardown
/// paths deregister unconditionally.
pub(crate) struct Slab<T> {
    /// Storage for items.
    entries: Vec<Entry<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<u32>,
    /// Number of occupied slots.
    len: usize,
}

impl<T> Slab<T> {
    /// Creates a new `Slab` with room for `capacity` values before it grows.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Inserts a value and returns its key.
    ///
    /// # Panics
    ///
    /// Panics if more than `u32::MAX` slots would be needed.
    pub(crate) fn insert(&mut self, value: T) -> Key {
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.entries[index as usize];
            let generation = match slot {
                Entry::Vacant { generation } => *generation,
                Entry::Occupied { .. } => unreachable!("free list points at an occupied slot"),
            };

            *slot = Entry::Occupied { generation, value };
            return Key { index, generation };
        }

        let index = u32::try_from(self.entries.len()).expect("slab index overflow");
        self.entries.push(Entry::Occupied {
            generation: 0,
            value,
        });

        Key {
            index,
            generation: 0,
        }
    }

    /// Removes and returns the value stored under `key`.
    ///
    /// Returns `None` if the key is stale or was already removed.
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        let slot = self.entries.get_mut(key.index as usize)?;

        match slot {
            Entry::Occupied { generation, .. } if *generation == key.generation => {}
            _ => return None,
        }

        let next = key.generation.wrapping_add(1);
        let old = std::mem::replace(slot, Entry::Vacant { generation: next });

        self.free.push(key.index);
        self.len -= 1;

        match old {
            Entry::Occupied { value, .. } => Some(value),
            Entry::Vacant { .. } => None,
        }
    }

    /// Returns a shared reference to the value under `key`, if it is live.
    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        match self.entries.get(key.index as usize)? {
            Entry::Occupied { generation, value } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    /// Returns a mutable reference to the value under `key`, if it is live.
    pub(crate) fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        match self.entries.get_mut(key.index as usize)? {
            Entry::Occupied { generation, value } if *generation == key.generation => Some(value),
            _ => None,
        }
    }

    /// Returns `true` if `key` still refers to a live value.
    pub(crate) fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    /// Number of live values.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Removes every live value, returning them in slot order.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);

        for (index, slot) in self.entries.iter_mut().enumerate() {
            if let Entry::Occupied { generation, .. } = slot {
                let next = generation.wrapping_add(1);
                if let Entry::Occupied { value, .. } =
                    std::mem::replace(slot, Entry::Vacant { generation: next })
                {
                    out.push(value);
                }
                self.free.push(index as u32);
            }
        }

        self.len = 0;
        out
    }
}
