use super::format::TextureDesc;

/// Generation-checked texture handle.
///
/// The index of a destroyed texture is recycled with a bumped generation, so
/// a handle kept past `destroy_texture` no longer resolves.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TextureHandle {
    pub index: u32,
    pub generation: u32,
}

impl TextureHandle {
    /// Packs the handle for the native boundary. `0` is reserved for "no texture".
    #[inline]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64 + 1)
    }

    /// Inverse of [`to_bits`](Self::to_bits); `0` decodes to `None`.
    #[inline]
    pub const fn from_bits(bits: u64) -> Option<Self> {
        let low = bits & 0xffff_ffff;
        if low == 0 {
            return None;
        }
        Some(Self {
            index: (low - 1) as u32,
            generation: (bits >> 32) as u32,
        })
    }
}

/// A live texture: its description plus backend payload.
#[derive(Debug)]
pub struct TextureRecord<T> {
    pub desc: TextureDesc,
    pub value: T,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    record: Option<TextureRecord<T>>,
}

/// Texture registry owned by a render device.
///
/// Allocation is sequential until the first removal; removed indices are
/// reused through a free list.
#[derive(Debug)]
pub struct TextureStore<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for TextureStore<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<T> TextureStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, desc: TextureDesc, value: T) -> TextureHandle {
        let record = Some(TextureRecord { desc, value });
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.record = record;
            return TextureHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            record,
        });
        TextureHandle {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&TextureRecord<T>> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    pub fn get_mut(&mut self, handle: TextureHandle) -> Option<&mut TextureRecord<T>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    pub fn remove(&mut self, handle: TextureHandle) -> Option<TextureRecord<T>> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?;
        let record = slot.record.take()?;
        self.free.push(handle.index);
        self.live -= 1;
        Some(record)
    }

    #[inline]
    pub fn contains(&self, handle: TextureHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live textures.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureHandle, &TextureRecord<T>)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.record.as_ref().map(|record| {
                (
                    TextureHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    record,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::TextureFormat;

    fn desc(w: u32, h: u32) -> TextureDesc {
        TextureDesc::new(w, h, 1, TextureFormat::Rgba8)
    }

    #[test]
    fn ids_increase_from_zero() {
        let mut store = TextureStore::new();
        let ids: Vec<_> = (0..4).map(|i| store.insert(desc(i + 1, 1), ()).index).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn lookups_return_the_inserted_description() {
        let mut store = TextureStore::new();
        let a = store.insert(desc(64, 32), "a");
        let b = store.insert(desc(8, 8), "b");
        assert_eq!(store.get(a).unwrap().desc.width, 64);
        assert_eq!(store.get(a).unwrap().desc.height, 32);
        assert_eq!(store.get(b).unwrap().value, "b");
    }

    #[test]
    fn removed_handles_go_stale() {
        let mut store = TextureStore::new();
        let a = store.insert(desc(1, 1), ());
        assert!(store.remove(a).is_some());
        assert!(store.get(a).is_none());
        assert!(store.remove(a).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn recycled_index_bumps_generation() {
        let mut store = TextureStore::new();
        let a = store.insert(desc(1, 1), 1);
        store.remove(a);
        let b = store.insert(desc(2, 2), 2);
        assert_eq!(b.index, a.index);
        assert_eq!(b.generation, a.generation + 1);
        assert!(store.get(a).is_none());
        assert_eq!(store.get(b).unwrap().value, 2);
    }

    #[test]
    fn bits_round_trip_and_reserve_zero() {
        let handle = TextureHandle { index: 0, generation: 3 };
        assert_ne!(handle.to_bits(), 0);
        assert_eq!(TextureHandle::from_bits(handle.to_bits()), Some(handle));
        assert_eq!(TextureHandle::from_bits(0), None);
    }

    #[test]
    fn iter_skips_removed_slots() {
        let mut store = TextureStore::new();
        let a = store.insert(desc(1, 1), 'a');
        let b = store.insert(desc(1, 1), 'b');
        store.remove(a);
        let live: Vec<_> = store.iter().map(|(h, r)| (h, r.value)).collect();
        assert_eq!(live, vec![(b, 'b')]);
    }
}
