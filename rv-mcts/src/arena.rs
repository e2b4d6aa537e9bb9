//! Arena-backed node storage with slot reuse.
//!
//! Nodes are addressed by `NodeId` handles. Because sibling subtrees are
//! released after every committed move, freed slots go on a free list
//! and are handed out again by later allocations.

use crate::node::{Node, NodeId};

pub struct Arena {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id as usize] = Some(node);
                id
            }
            None => {
                let id = self.slots.len() as u32;
                self.slots.push(Some(node));
                id
            }
        }
    }

    /// Panics on a freed or out-of-range id; handles are only ever
    /// produced by `alloc` and invalidated by release, so that is a
    /// caller bug.
    pub fn get(&self, id: NodeId) -> &Node {
        self.slots[id as usize].as_ref().expect("freed node id")
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id as usize].as_mut().expect("freed node id")
    }

    /// Release `id` and every node reachable through child lists,
    /// iteratively (game trees get deep enough to overflow a recursive
    /// walk).
    pub fn release_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(node) = self.slots[cur as usize].take() {
                stack.extend(node.children);
                self.free.push(cur);
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
