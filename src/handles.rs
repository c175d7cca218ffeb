//! Per-context handle table
//!
//! Every value that one runtime holds on behalf of the other goes through a
//! slot in the owning context's table:
//!
//! - host values exposed to guest code (host objects, callables, classes and
//!   proxies that belong to other contexts) are *host-owned* entries; guest
//!   wrapper objects refer to them by [`HandleId`];
//! - guest objects handed to host code are *guest-owned* entries; the host
//!   side proxy holds the id and releases the slot when dropped.
//!
//! Ids carry a generation so a stale id never resolves to a reused slot.
//! Tearing a context down clears the whole table at once.

use crate::host::{HostClass, HostFunction, HostObject};
use crate::marshal::Value;
use crate::value::JsObjectRef;

/// Generation-checked index into a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    index: u32,
    generation: u32,
}

impl HandleId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Which side keeps an entry alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Host,
    Guest,
}

#[derive(Clone)]
pub enum HandleEntry {
    Object(HostObject),
    Function(HostFunction),
    Class(HostClass),
    /// A proxy of a guest value owned by another context
    Foreign(Value),
    /// A guest object referenced from the host
    Guest(JsObjectRef),
}

impl HandleEntry {
    pub fn ownership(&self) -> Ownership {
        match self {
            HandleEntry::Guest(_) => Ownership::Guest,
            HandleEntry::Object(_)
            | HandleEntry::Function(_)
            | HandleEntry::Class(_)
            | HandleEntry::Foreign(_) => Ownership::Host,
        }
    }
}

struct Slot {
    generation: u32,
    entry: Option<HandleEntry>,
}

#[derive(Default)]
pub struct HandleTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: HandleEntry) -> HandleId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.entry = Some(entry);
                return HandleId {
                    index,
                    generation: slot.generation,
                };
            }
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry: Some(entry),
        });
        HandleId {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, id: HandleId) -> Option<&HandleEntry> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    /// Free the slot. The entry is returned so the caller can drop it after
    /// releasing any borrow of the table.
    pub fn remove(&mut self, id: HandleId) -> Option<HandleEntry> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(entry)
    }

    /// Invalidate every id handed out so far and return the entries.
    pub fn clear(&mut self) -> Vec<HandleEntry> {
        let mut entries = Vec::with_capacity(self.live);
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(entry) = slot.entry.take() {
                entries.push(entry);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
        }
        self.live = 0;
        entries
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
