//! A flat arena of `Expr` nodes, owned per expansion run. Host functions
//! exposed to macro code build into this arena and hand back opaque
//! [`NodeId`]s rather than serializing whole subtrees across the JS
//! boundary.

use swc_ecma_ast::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }

    /// Reconstructs a handle from a raw index. Only meant for round-
    /// tripping a [`crate::handle::NodeHandle`] received back from macro
    /// code; callers elsewhere should hold onto the `NodeId` itself.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }
}

#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Expr>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an expression and returns a stable handle to it.
    pub fn insert(&mut self, expr: Expr) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(expr);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Expr> {
        self.nodes.get(id.0)
    }

    /// Takes ownership of the node's expression, replacing it with a
    /// placeholder. Used when a handle is consumed exactly once by the
    /// rewrite phase.
    pub fn take(&mut self, id: NodeId) -> Option<Expr> {
        self.nodes
            .get_mut(id.0)
            .map(|slot| std::mem::replace(slot, crate::factory::null_lit()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::num_lit;

    #[test]
    fn insert_and_get_round_trip() {
        let mut arena = NodeArena::new();
        let id = arena.insert(num_lit(7.0));
        assert!(matches!(arena.get(id), Some(Expr::Lit(_))));
    }

    #[test]
    fn ids_are_stable_across_further_inserts() {
        let mut arena = NodeArena::new();
        let first = arena.insert(num_lit(1.0));
        let _second = arena.insert(num_lit(2.0));
        assert!(arena.get(first).is_some());
        assert_eq!(arena.len(), 2);
    }
}
