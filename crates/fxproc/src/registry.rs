//! Liveness bookkeeping for native handles.
//!
//! Every registration gets its own [`HandleId`]; a wrapper is live while its
//! id is in the registry. Ids are never reused, so a wrapper whose object
//! was released stays dead even when the driver hands the same address to a
//! new object. Wrappers only call `Release` after successfully removing their
//! id, so each reference is dropped exactly once no matter how often
//! `release` or `Drop` runs.

use fxproc_core::ComPtr;

/// Identity of one registration in a [`HandleSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

#[derive(Debug)]
struct Entry {
    id: HandleId,
    handle: ComPtr,
    name: String,
}

/// Live handles of one resource class, in insertion order.
#[derive(Debug, Default)]
pub struct HandleSet {
    next_id: u64,
    entries: Vec<Entry>,
}

impl HandleSet {
    /// Track one owned reference to `handle` under a diagnostic `name`.
    pub fn insert(&mut self, handle: ComPtr, name: &str) -> HandleId {
        let id = HandleId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            handle,
            name: name.to_string(),
        });
        id
    }

    /// Stop tracking `id`. Returns the handle only for the call that actually
    /// removed it.
    pub fn remove(&mut self, id: HandleId) -> Option<ComPtr> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index).handle)
    }

    pub fn contains(&self, id: HandleId) -> bool {
        self.get(id).is_some()
    }

    /// The handle registered as `id`, if still live.
    pub fn get(&self, id: HandleId) -> Option<ComPtr> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComPtr, &str)> {
        self.entries.iter().map(|e| (e.handle, e.name.as_str()))
    }

    /// Remove and return every entry, oldest first.
    pub fn take_all(&mut self) -> Vec<(ComPtr, String)> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .map(|e| (e.handle, e.name))
            .collect()
    }
}

/// Live textures and effects of one context.
#[derive(Debug, Default)]
pub struct Registry {
    pub textures: HandleSet,
    pub effects: HandleSet,
}

impl Registry {
    /// Total number of live handles.
    pub fn len(&self) -> usize {
        self.textures.len() + self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty() && self.effects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(addr: usize) -> ComPtr {
        ComPtr::new(addr as *mut std::ffi::c_void).unwrap()
    }

    #[test]
    fn remove_succeeds_once() {
        let mut set = HandleSet::default();
        let id = set.insert(handle(0x10), "a");
        assert_eq!(set.len(), 1);

        assert_eq!(set.remove(id), Some(handle(0x10)));
        assert_eq!(set.remove(id), None);
        assert!(set.is_empty());
    }

    #[test]
    fn reused_address_gets_a_new_identity() {
        let mut set = HandleSet::default();
        let old = set.insert(handle(0x10), "old");
        set.remove(old);

        let new = set.insert(handle(0x10), "new");
        assert_ne!(old, new);
        assert!(!set.contains(old));
        assert_eq!(set.remove(old), None);
        assert_eq!(set.get(new), Some(handle(0x10)));
    }

    #[test]
    fn keeps_insertion_order() {
        let mut set = HandleSet::default();
        set.insert(handle(0x30), "c");
        let a = set.insert(handle(0x10), "a");
        set.insert(handle(0x20), "b");
        set.remove(a);

        let names: Vec<&str> = set.iter().map(|(_, name)| name).collect();
        assert_eq!(names, ["c", "b"]);

        let taken = set.take_all();
        assert_eq!(taken[0], (handle(0x30), "c".to_string()));
        assert!(set.is_empty());
    }

    #[test]
    fn classes_are_tracked_separately() {
        let mut registry = Registry::default();
        let texture = registry.textures.insert(handle(0x10), "tex");
        registry.effects.insert(handle(0x20), "fx");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.textures.get(texture), Some(handle(0x10)));
        assert_eq!(registry.textures.remove(texture), Some(handle(0x10)));
        assert_eq!(registry.effects.len(), 1);
    }
}
