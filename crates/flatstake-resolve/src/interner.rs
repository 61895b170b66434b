//! Entity interning: dense integer ids for entity names.
//!
//! The closure iterates over `(owner, owned)` pairs many times; interning
//! once up front keeps the hot loop on `u32` keys instead of strings.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use flatstake_model::Name;

/// Interned entity id, dense from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bidirectional name <-> id table. Single-threaded by design: one
/// resolver run owns one interner and discards it with the run.
#[derive(Debug, Default)]
pub struct EntityInterner {
    ids: AHashMap<Name, EntityId>,
    names: Vec<Name>,
}

impl EntityInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, returning its id.
    pub fn intern(&mut self, name: &str) -> EntityId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = EntityId(self.names.len() as u32);
        self.ids.insert(name.to_string(), id);
        self.names.push(name.to_string());
        id
    }

    /// Look up an existing id without inserting.
    pub fn id_of(&self, name: &str) -> Option<EntityId> {
        self.ids.get(name).copied()
    }

    /// Look up a name by id.
    pub fn name(&self, id: EntityId) -> &str {
        &self.names[id.index()]
    }

    /// Number of distinct entities seen so far.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
