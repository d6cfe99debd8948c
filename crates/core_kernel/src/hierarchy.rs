//! Parent-linked category arena
//!
//! Expense categories and locations form self-referencing trees (a category
//! may have a parent category). The arena stores them flat, keyed by id, and
//! rejects a reparent that would introduce a cycle.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::identifiers::CategoryId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("Category not found: {0}")]
    NotFound(CategoryId),

    #[error("Parent not found: {0}")]
    ParentNotFound(CategoryId),

    #[error("Reparenting {child} under {parent} would create a cycle")]
    CycleDetected {
        child: CategoryId,
        parent: CategoryId,
    },
}

/// A node in the category tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub parent: Option<CategoryId>,
    pub is_active: bool,
}

/// Flat arena of categories with cycle-checked parent links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryArena {
    nodes: HashMap<CategoryId, Category>,
}

impl CategoryArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Inserts a category, validating that its parent exists and that the
    /// link does not close a cycle.
    pub fn insert(&mut self, category: Category) -> Result<(), HierarchyError> {
        if let Some(parent) = category.parent {
            if !self.nodes.contains_key(&parent) {
                return Err(HierarchyError::ParentNotFound(parent));
            }
            if parent == category.id || self.is_descendant(parent, category.id) {
                return Err(HierarchyError::CycleDetected {
                    child: category.id,
                    parent,
                });
            }
        }
        self.nodes.insert(category.id, category);
        Ok(())
    }

    /// Moves a category under a new parent (or to the root with `None`).
    pub fn reparent(
        &mut self,
        id: CategoryId,
        new_parent: Option<CategoryId>,
    ) -> Result<(), HierarchyError> {
        if !self.nodes.contains_key(&id) {
            return Err(HierarchyError::NotFound(id));
        }
        if let Some(parent) = new_parent {
            if !self.nodes.contains_key(&parent) {
                return Err(HierarchyError::ParentNotFound(parent));
            }
            if parent == id || self.is_descendant(parent, id) {
                return Err(HierarchyError::CycleDetected { child: id, parent });
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = new_parent;
        }
        Ok(())
    }

    /// Path from a category up to its root, starting with the category.
    pub fn ancestry(&self, id: CategoryId) -> Vec<CategoryId> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            if !self.nodes.contains_key(&c) || path.contains(&c) {
                break;
            }
            path.push(c);
            current = self.nodes.get(&c).and_then(|n| n.parent);
        }
        path
    }

    /// True if `candidate` sits somewhere below `ancestor` in the tree.
    fn is_descendant(&self, candidate: CategoryId, ancestor: CategoryId) -> bool {
        let mut current = self.nodes.get(&candidate).and_then(|n| n.parent);
        let mut hops = 0;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.nodes.len() {
                break;
            }
            current = self.nodes.get(&p).and_then(|n| n.parent);
        }
        false
    }
}
