use std::any::Any;

enum Slot<'h> {
    Shared(&'h dyn Any),
    Exclusive(&'h mut dyn Any),
}

/// Host objects visible to one invocation.
///
/// Scripts never see addresses: a pointer register holds `index + 1` into
/// this table, `0` is the null handle. Lookups check the concrete Rust type,
/// so a handle of the wrong kind behaves like null.
#[derive(Default)]
pub struct HostObjects<'h> {
    slots: Vec<Slot<'h>>,
}

impl<'h> HostObjects<'h> {
    pub fn new() -> Self {
        HostObjects { slots: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Adds a read-only object and returns its handle.
    pub fn share<T: Any>(&mut self, object: &'h T) -> i32 {
        self.slots.push(Slot::Shared(object));
        self.slots.len() as i32
    }

    /// Adds an object natives may modify and returns its handle.
    pub fn lend<T: Any>(&mut self, object: &'h mut T) -> i32 {
        self.slots.push(Slot::Exclusive(object));
        self.slots.len() as i32
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    fn slot_index(handle: i32) -> Option<usize> {
        usize::try_from(handle).ok()?.checked_sub(1)
    }

    pub fn get<T: Any>(&self, handle: i32) -> Option<&T> {
        match self.slots.get(Self::slot_index(handle)?)? {
            Slot::Shared(object) => object.downcast_ref::<T>(),
            Slot::Exclusive(object) => object.downcast_ref::<T>(),
        }
    }

    pub fn get_mut<T: Any>(&mut self, handle: i32) -> Option<&mut T> {
        match self.slots.get_mut(Self::slot_index(handle)?)? {
            Slot::Shared(_) => None,
            Slot::Exclusive(object) => object.downcast_mut::<T>(),
        }
    }
}
