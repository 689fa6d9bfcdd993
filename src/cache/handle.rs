//! Reference-counted model ownership.
//!
//! Models live in slots of a [`HandleTable`]. Every [`ModelHandle`] counts as one owner of
//! its slot; the cache only remembers the [`SlotKey`], which does not keep anything alive.
//! When the last owner goes away the slot is freed, its generation bumped (so stale keys
//! stop matching) and the model's GPU buffers are destroyed.

use std::{fmt, path::PathBuf, sync::Arc};

use cgmath::{Matrix4, Vector3};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{context::BufferAllocator, data_structures::model::Model};

pub type SharedModel<B> = Arc<RwLock<Model<B>>>;

/// Non-owning reference to a slot of the [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

struct Slot<B> {
    generation: u32,
    owners: usize,
    tag: u32,
    model: Option<SharedModel<B>>,
}

pub(crate) struct HandleTable<B> {
    slots: Vec<Slot<B>>,
    free: Vec<u32>,
}

impl<B> Default for HandleTable<B> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<B> HandleTable<B> {
    /// Stores `model` with a single owner. The tag is copied out of the model so it can be
    /// read without locking the model.
    fn insert(&mut self, model: SharedModel<B>, tag: u32) -> SlotKey {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.owners = 1;
                slot.tag = tag;
                slot.model = Some(model);
                SlotKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    owners: 1,
                    tag,
                    model: Some(model),
                });
                SlotKey {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    fn slot(&self, key: SlotKey) -> Option<&Slot<B>> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation && slot.owners > 0)
    }

    pub(crate) fn is_live(&self, key: SlotKey) -> bool {
        self.slot(key).is_some()
    }

    /// Tag of a live slot.
    pub(crate) fn tag(&self, key: SlotKey) -> Option<u32> {
        self.slot(key).map(|slot| slot.tag)
    }

    /// Adds an owner to a live slot.
    fn acquire(&mut self, key: SlotKey) -> Option<SharedModel<B>> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation && slot.owners > 0)?;
        slot.owners += 1;
        slot.model.clone()
    }

    /// Removes an owner. Returns `true` when that was the last one and the slot got freed.
    fn release(&mut self, key: SlotKey) -> bool {
        let Some(slot) = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation && slot.owners > 0)
        else {
            return false;
        };
        slot.owners -= 1;
        if slot.owners > 0 {
            return false;
        }
        slot.model = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        true
    }
}

/// Table and allocator shared by the cache and every handle it gave out.
pub(crate) struct Shared<A: BufferAllocator> {
    pub(crate) table: Mutex<HandleTable<A::Buffer>>,
    pub(crate) allocator: A,
}

impl<A: BufferAllocator> Shared<A> {
    pub(crate) fn new(allocator: A) -> Self {
        Self {
            table: Mutex::new(HandleTable::default()),
            allocator,
        }
    }

    pub(crate) fn is_live(&self, key: SlotKey) -> bool {
        self.table.lock().is_live(key)
    }
}

pub(crate) fn insert<A: BufferAllocator>(shared: &Arc<Shared<A>>, model: Model<A::Buffer>) -> ModelHandle<A> {
    let tag = model.tag();
    let model = Arc::new(RwLock::new(model));
    let key = shared.table.lock().insert(Arc::clone(&model), tag);
    ModelHandle {
        key,
        model,
        shared: Arc::clone(shared),
    }
}

pub(crate) fn acquire<A: BufferAllocator>(shared: &Arc<Shared<A>>, key: SlotKey) -> Option<ModelHandle<A>> {
    let model = shared.table.lock().acquire(key)?;
    Some(ModelHandle {
        key,
        model,
        shared: Arc::clone(shared),
    })
}

/// Owning handle to a cached model. Clones share the same model.
pub struct ModelHandle<A: BufferAllocator> {
    key: SlotKey,
    model: SharedModel<A::Buffer>,
    shared: Arc<Shared<A>>,
}

impl<A: BufferAllocator> ModelHandle<A> {
    pub fn read(&self) -> RwLockReadGuard<'_, Model<A::Buffer>> {
        self.model.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Model<A::Buffer>> {
        self.model.write()
    }

    pub fn slot_key(&self) -> SlotKey {
        self.key
    }

    /// True if both handles own the same model instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.model, &b.model)
    }

    pub fn tag(&self) -> u32 {
        self.read().tag()
    }

    pub fn key(&self) -> PathBuf {
        self.read().key().to_path_buf()
    }

    pub fn transform(&self) -> Matrix4<f32> {
        self.read().transform()
    }

    pub fn set_transform(&self, transform: Matrix4<f32>) {
        self.write().set_transform(transform);
    }

    pub fn set_position(&self, position: Vector3<f32>) {
        self.write().set_position(position);
    }

    pub fn set_rotation(&self, degrees: f32, axis: Vector3<f32>) {
        self.write().set_rotation(degrees, axis);
    }

    pub fn set_size_meters(&self, meters: f32) {
        self.write().set_size_meters(meters);
    }
}

impl<A: BufferAllocator> Clone for ModelHandle<A> {
    fn clone(&self) -> Self {
        // a held handle keeps its slot live, so this cannot fail
        let mut table = self.shared.table.lock();
        let _ = table.acquire(self.key);
        drop(table);
        Self {
            key: self.key,
            model: Arc::clone(&self.model),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: BufferAllocator> Drop for ModelHandle<A> {
    fn drop(&mut self) {
        let last = self.shared.table.lock().release(self.key);
        if last {
            let mut model = self.model.write();
            log::info!("Releasing GPU buffers of {}", model.key().display());
            model.destroy(&self.shared.allocator);
        }
    }
}

impl<A: BufferAllocator> fmt::Debug for ModelHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str) -> SharedModel<()> {
        Arc::new(RwLock::new(Model::new(name, 0, Vec::new())))
    }

    #[test]
    fn freed_slots_are_reused_with_a_new_generation() {
        let mut table = HandleTable::default();
        let a = table.insert(model("a"), 0);
        assert!(table.release(a));
        assert!(!table.is_live(a));

        let b = table.insert(model("b"), 0);
        assert_eq!(a.index, b.index);
        assert_ne!(a.generation, b.generation);
        assert!(table.acquire(a).is_none());
        assert!(!table.release(a));
        assert!(table.is_live(b));
    }

    #[test]
    fn slot_lives_until_last_owner_releases() {
        let mut table = HandleTable::default();
        let key = table.insert(model("a"), 5);
        assert!(table.acquire(key).is_some());
        assert!(!table.release(key));
        assert_eq!(table.tag(key), Some(5));
        assert!(table.release(key));
        assert_eq!(table.tag(key), None);
    }

    #[test]
    fn reused_slot_carries_the_new_tag() {
        let mut table = HandleTable::default();
        let a = table.insert(model("a"), 1);
        assert!(table.release(a));
        let b = table.insert(model("b"), 2);
        assert_eq!(table.tag(a), None);
        assert_eq!(table.tag(b), Some(2));
    }
}
