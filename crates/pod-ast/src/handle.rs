//! The wire shape of a [`NodeId`] as seen from macro code running inside
//! the host runtime. Macro code never touches arena internals; it only
//! ever holds this tagged handle and passes it back into host functions
//! (`ast.call(...)`, `return`, etc).

use serde::{Deserialize, Serialize};

use crate::arena::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeHandle {
    #[serde(rename = "__pod_node")]
    pub id: usize,
}

impl From<NodeId> for NodeHandle {
    fn from(id: NodeId) -> Self {
        Self { id: id.index() }
    }
}

impl NodeHandle {
    /// Reconstructs the [`NodeId`] this handle refers to. Callers must
    /// validate the id against the arena it came from — a handle carries
    /// no arena identity of its own.
    pub fn to_node_id(self) -> NodeId {
        NodeId::from_index(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_tagged_object() {
        let handle = NodeHandle { id: 3 };
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, r#"{"__pod_node":3}"#);
    }
}
