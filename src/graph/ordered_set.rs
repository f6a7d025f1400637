//! Insertion-ordered set used for dependency edges

use std::collections::HashSet;
use std::hash::Hash;

/// A set that remembers insertion order
///
/// Edge order is observable (it drives traversal order), so edges are kept
/// in a `Vec` with a `HashSet` beside it for membership checks.
#[derive(Debug, Clone)]
pub struct OrderedSet<T> {
    items: Vec<T>,
    index: HashSet<T>,
}

impl<T> Default for OrderedSet<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashSet::new(),
        }
    }
}

impl<T: Copy + Eq + Hash> OrderedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item` unless already present. Returns true if inserted.
    pub fn insert(&mut self, item: T) -> bool {
        if self.index.insert(item) {
            self.items.push(item);
            true
        } else {
            false
        }
    }

    /// Remove `item`, keeping the order of the rest. Returns true if removed.
    pub fn remove(&mut self, item: &T) -> bool {
        if self.index.remove(item) {
            self.items.retain(|i| i != item);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Remove and return every item, in order
    pub fn take(&mut self) -> Vec<T> {
        self.index.clear();
        std::mem::take(&mut self.items)
    }
}

impl<T: Copy + Eq + Hash> FromIterator<T> for OrderedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

impl<'a, T: Copy + Eq + Hash> IntoIterator for &'a OrderedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
