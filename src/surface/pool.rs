use std::{
    num::NonZeroUsize,
    ops::{Index, IndexMut},
};

use super::buffer::{BufferHandle, ClientBuffer};

/// Fixed set of [`BufferHandle`] slots owned by one surface
///
/// The pool never grows. Its capacity bounds how many buffers a client may have in flight.
#[derive(Debug)]
pub struct BufferPool<B> {
    slots: Box<[BufferHandle<B>]>,
}

impl<B: ClientBuffer> BufferPool<B> {
    /// Allocate a pool of `capacity` free slots
    pub fn new(capacity: NonZeroUsize) -> Self {
        BufferPool {
            slots: (0..capacity.get()).map(|_| BufferHandle::default()).collect(),
        }
    }

    /// Index of the first free slot, if any
    pub fn acquire(&self) -> Option<usize> {
        self.slots.iter().position(BufferHandle::is_free)
    }

    /// Disown the slot at `index`
    ///
    /// A client may attach the same buffer again while it is still bound to an older slot. The
    /// buffer is only released once the last slot bound to it is disowned.
    pub fn disown(&mut self, index: usize) {
        let shared = self.slots[index].buffer().map_or(false, |buffer| {
            self.slots
                .iter()
                .enumerate()
                .any(|(other, slot)| other != index && slot.holds(Some(buffer)))
        });
        if shared {
            self.slots[index].detach();
        } else {
            self.slots[index].disown();
        }
    }

    /// Disown every slot
    ///
    /// Slots held by hardware stay unavailable until their leases are dropped.
    pub fn disown_all(&mut self) {
        for index in 0..self.slots.len() {
            self.disown(index);
        }
    }

    /// Number of slots bound to an attach
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_registered()).count()
    }

    /// Number of slots held by display hardware
    pub fn held_by_hardware(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_held_by_hardware()).count()
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over the slots
    pub fn iter(&self) -> impl Iterator<Item = &BufferHandle<B>> {
        self.slots.iter()
    }

    /// Iterate mutably over the slots
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BufferHandle<B>> {
        self.slots.iter_mut()
    }
}

impl<B> Index<usize> for BufferPool<B> {
    type Output = BufferHandle<B>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.slots[index]
    }
}

impl<B> IndexMut<usize> for BufferPool<B> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.slots[index]
    }
}
