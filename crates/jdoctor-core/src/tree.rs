//! Identifier-keyed tree arena.
//!
//! Nodes live in a flat map keyed by [`Uuid`]; hierarchy is kept in a separate
//! parent map plus ordered child lists. The synthetic root is always present
//! under [`ROOT_ID`], and a node can only be inserted once its parent exists.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::{DoctorError, Result};

/// Identifier of the synthetic root node.
pub const ROOT_ID: Uuid = Uuid::nil();

#[derive(Debug, Clone)]
pub struct Arena<T> {
    nodes: HashMap<Uuid, T>,
    parents: HashMap<Uuid, Uuid>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl<T> Arena<T> {
    /// Create an arena holding only the synthetic root.
    pub fn new(root: T) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT_ID, root);
        Self {
            nodes,
            parents: HashMap::new(),
            children: HashMap::new(),
        }
    }

    /// Insert `node` as the last child of `parent`.
    pub fn insert(&mut self, id: Uuid, parent: Uuid, node: T) -> Result<()> {
        if self.nodes.contains_key(&id) {
            return Err(DoctorError::DuplicateNode(id));
        }
        if !self.nodes.contains_key(&parent) {
            return Err(DoctorError::MissingParent { child: id, parent });
        }
        self.nodes.insert(id, node);
        self.parents.insert(id, parent);
        self.children.entry(parent).or_default().push(id);
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Option<&T> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn root(&self) -> Option<&T> {
        self.nodes.get(&ROOT_ID)
    }

    pub fn parent(&self, id: &Uuid) -> Option<Uuid> {
        self.parents.get(id).copied()
    }

    /// Children of `id` in insertion order.
    pub fn children(&self, id: &Uuid) -> &[Uuid] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Depth-first, pre-order walk below the root as `(depth, id)` pairs.
    /// Direct children of the root have depth 0.
    pub fn walk(&self) -> Vec<(usize, Uuid)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, Uuid)> = self
            .children(&ROOT_ID)
            .iter()
            .rev()
            .map(|id| (0, *id))
            .collect();
        while let Some((depth, id)) = stack.pop() {
            order.push((depth, id));
            stack.extend(self.children(&id).iter().rev().map(|c| (depth + 1, *c)));
        }
        order
    }
}
