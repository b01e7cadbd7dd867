use std::borrow::Borrow;

use crate::error::{BindingKind, Error, Result};

/// Capacity of each binding table on a draw call.
pub const MAX_BINDINGS: usize = 10;

/// Small key-value table with a hard capacity, searched linearly.
///
/// Insertion order is kept: slot `i` is the `i`th distinct key ever
/// inserted, which draw calls rely on for texture unit assignment.
#[derive(Debug, Clone)]
pub struct BindingTable<K, V> {
    kind: BindingKind,
    entries: Vec<(K, V)>,
}

impl<K: PartialEq, V> BindingTable<K, V> {
    pub fn new(kind: BindingKind) -> Self {
        Self { kind, entries: Vec::with_capacity(MAX_BINDINGS) }
    }

    pub fn position<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.entries.iter().position(|(k, _)| k.borrow() == key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.position(key).map(|i| &mut self.entries[i].1)
    }

    /// Appends a new entry. The key must not be present yet.
    pub fn push(&mut self, key: K, value: V) -> Result<usize> {
        debug_assert!(self.position(&key).is_none());
        if self.entries.len() >= MAX_BINDINGS {
            return Err(Error::BindingTableFull { kind: self.kind, capacity: MAX_BINDINGS });
        }
        self.entries.push((key, value));
        Ok(self.entries.len() - 1)
    }

    /// Replaces the value under `key`, or appends it. Returns the slot.
    pub fn upsert(&mut self, key: K, value: V) -> Result<usize> {
        match self.position(&key) {
            Some(i) => {
                self.entries[i].1 = value;
                Ok(i)
            }
            None => self.push(key, value),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}
