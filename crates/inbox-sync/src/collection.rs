//! Ordered notification collection with an id index.
//!
//! The vector always holds entities in display order (`created_at`
//! descending, ties by `id`); the index maps ids to positions for O(1)
//! lookup. Order is re-derived after every structural mutation.

use std::collections::HashMap;

use crate::model::{Notification, display_cmp};

/// The canonical in-memory notification set for one user.
#[derive(Debug, Default)]
pub struct NotificationCollection {
    items: Vec<Notification>,
    index: HashMap<String, usize>,
}

impl NotificationCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Notification> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Display position of an entity, if present.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn first(&self) -> Option<&Notification> {
        self.items.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Notification] {
        &self.items
    }

    /// Derived unread count, always recomputed from the entities.
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.viewed).count()
    }

    /// Replace the whole collection, re-sorting into display order.
    pub fn replace_all(&mut self, mut items: Vec<Notification>) {
        items.sort_by(display_cmp);
        items.dedup_by(|a, b| a.id == b.id);
        self.items = items;
        self.reindex(0);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    /// Insert at the sorted position. The caller guarantees the id is not
    /// already present.
    pub fn insert_sorted(&mut self, entity: Notification) -> usize {
        debug_assert!(!self.contains(&entity.id));
        let pos = match self
            .items
            .binary_search_by(|probe| display_cmp(probe, &entity))
        {
            Ok(pos) | Err(pos) => pos,
        };
        self.items.insert(pos, entity);
        self.reindex(pos);
        pos
    }

    /// Insert or replace by id, keeping the sort invariant.
    ///
    /// Returns true when the entity was newly inserted.
    pub fn upsert(&mut self, entity: Notification) -> bool {
        match self.index.get(&entity.id).copied() {
            Some(pos) => {
                if self.items[pos].created_at == entity.created_at {
                    self.items[pos] = entity;
                } else {
                    // created_at is immutable by contract; re-sort anyway so a
                    // misbehaving feed cannot break the order invariant.
                    self.items.remove(pos);
                    self.reindex(pos);
                    self.index.remove(&entity.id);
                    self.insert_sorted(entity);
                }
                false
            }
            None => {
                self.insert_sorted(entity);
                true
            }
        }
    }

    /// Remove by id. Returns the entity, or None if it was absent.
    pub fn remove(&mut self, id: &str) -> Option<Notification> {
        let pos = self.index.remove(id)?;
        let entity = self.items.remove(pos);
        self.reindex(pos);
        Some(entity)
    }

    /// Flip the viewed flag on one entity.
    ///
    /// Returns true when the entity exists and the flag actually changed.
    pub fn set_viewed(&mut self, id: &str, viewed: bool) -> bool {
        match self.index.get(id).copied() {
            Some(pos) if self.items[pos].viewed != viewed => {
                self.items[pos].viewed = viewed;
                true
            }
            _ => false,
        }
    }

    /// Flip every unread entity to viewed. Returns the affected ids.
    pub fn mark_all_viewed(&mut self) -> Vec<String> {
        let mut flipped = Vec::new();
        for item in &mut self.items {
            if !item.viewed {
                item.viewed = true;
                flipped.push(item.id.clone());
            }
        }
        flipped
    }

    fn reindex(&mut self, from: usize) {
        for pos in from..self.items.len() {
            self.index.insert(self.items[pos].id.clone(), pos);
        }
    }
}
