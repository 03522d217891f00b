use parking_lot::RwLock;

use super::error::{RegistryError, RegistryResult};
use super::types::{Node, NodeId, NodeStatus};

/// The set of known storage nodes, in registration order.
///
/// Registration order defines the snapshot ordering the placement planner
/// consumes, so it must be stable and reproducible: nodes are held in an
/// insertion-ordered list and deregistration preserves the relative order of
/// the survivors.
pub struct NodeRegistry {
    nodes: RwLock<Vec<Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
        }
    }

    /// Register a node. A duplicate id is rejected, never overwritten.
    pub fn register(&self, node: Node) -> RegistryResult<()> {
        let mut nodes = self.nodes.write();
        if nodes.iter().any(|n| n.id == node.id) {
            return Err(RegistryError::DuplicateId(node.id));
        }
        nodes.push(node);
        Ok(())
    }

    /// Remove a node. Existing FileRecords are not rewritten; chunks that
    /// were placed on this node become under-replicated and are surfaced via
    /// `TransferOrchestrator::replication_report`.
    pub fn deregister(&self, id: NodeId) -> RegistryResult<Node> {
        let mut nodes = self.nodes.write();
        let position = nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or(RegistryError::NotFound(id))?;
        Ok(nodes.remove(position))
    }

    /// Explicitly flip a node's liveness status.
    pub fn set_status(&self, id: NodeId, status: NodeStatus) -> RegistryResult<()> {
        let mut nodes = self.nodes.write();
        let node = nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(RegistryError::NotFound(id))?;
        node.status = status;
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Option<Node> {
        self.nodes.read().iter().find(|n| n.id == id).cloned()
    }

    /// Nodes in registration order, optionally restricted to online ones.
    pub fn list(&self, only_online: bool) -> Vec<Node> {
        self.nodes
            .read()
            .iter()
            .filter(|n| !only_online || n.status.is_online())
            .cloned()
            .collect()
    }

    /// The ordered online node ids, captured at a fixed point in time for
    /// one planning pass.
    pub fn snapshot(&self) -> Vec<NodeId> {
        self.nodes
            .read()
            .iter()
            .filter(|n| n.status.is_online())
            .map(|n| n.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
