//! Homogeneous entity collections

use std::collections::HashSet;

use super::{Entity, WriteCache, WriteEntity, WriteOptions};
use crate::core::error::Result;
use crate::core::types::NodeId;
use crate::instances::types::Node;
use crate::instances::ResourcesWrite;

/// Ordered list of read entities
#[derive(Debug, Clone, PartialEq)]
pub struct EntityList<E> {
    items: Vec<E>,
}

/// Ordered list of write entities
#[derive(Debug, Clone, PartialEq)]
pub struct WriteList<W> {
    items: Vec<W>,
}

impl<E> Default for EntityList<E> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<W> Default for WriteList<W> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<E: Entity> EntityList<E> {
    /// Wrap items
    pub fn new(items: Vec<E>) -> Self {
        Self { items }
    }

    /// Decode nodes through the entity's view
    pub fn from_nodes(nodes: &[Node]) -> Result<Self> {
        nodes.iter().map(E::from_node).collect::<Result<Vec<_>>>().map(Self::new)
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// No entities
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in order
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.items.iter()
    }

    /// Items as a slice
    pub fn as_slice(&self) -> &[E] {
        &self.items
    }

    /// Take the items out
    pub fn into_vec(self) -> Vec<E> {
        self.items
    }

    /// Append an entity
    pub fn push(&mut self, item: E) {
        self.items.push(item);
    }

    /// Identifiers in order
    pub fn ids(&self) -> Vec<NodeId> {
        self.items.iter().map(|e| e.id().clone()).collect()
    }

    /// Entity by identifier
    pub fn get_by_id(&self, id: &NodeId) -> Option<&E> {
        self.items.iter().find(|e| e.id() == id)
    }

    /// Write shapes, same order and length
    pub fn as_write(&self) -> WriteList<E::Write> {
        WriteList::new(self.items.iter().map(Entity::as_write).collect())
    }

    /// Ids referenced through `field` by any entity, deduplicated in first-seen order
    pub fn related_ids(&self, field: &str) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .flat_map(|e| e.related_ids(field))
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    /// Entities of `pool` referenced through `field`, in reference order
    pub fn related<T: Entity>(&self, field: &str, pool: &EntityList<T>) -> EntityList<T> {
        EntityList::new(
            self.related_ids(field)
                .iter()
                .filter_map(|id| pool.get_by_id(id).cloned())
                .collect(),
        )
    }
}

impl<W: WriteEntity> WriteList<W> {
    /// Wrap items
    pub fn new(items: Vec<W>) -> Self {
        Self { items }
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// No entities
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in order
    pub fn iter(&self) -> std::slice::Iter<'_, W> {
        self.items.iter()
    }

    /// Append an entity
    pub fn push(&mut self, item: W) {
        self.items.push(item);
    }

    /// Read shapes, same order and length
    pub fn as_read<E: Entity<Write = W>>(&self) -> EntityList<E> {
        EntityList::new(self.items.iter().map(E::from_write).collect())
    }

    /// Expand every entity with one shared cache
    pub fn to_instances_write(&self, cache: &mut WriteCache, options: WriteOptions) -> Result<ResourcesWrite> {
        let mut out = ResourcesWrite::default();
        for item in &self.items {
            super::write_graph(item, cache, options, &mut out)?;
        }
        Ok(out)
    }
}

impl<E> IntoIterator for EntityList<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, E> IntoIterator for &'a EntityList<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<E> FromIterator<E> for EntityList<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<W> FromIterator<W> for WriteList<W> {
    fn from_iter<I: IntoIterator<Item = W>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<W> IntoIterator for WriteList<W> {
    type Item = W;
    type IntoIter = std::vec::IntoIter<W>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
