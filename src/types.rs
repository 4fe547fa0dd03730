//! Core types shared across the control plane.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::ValidationError;

/// Shard identifier within a table, in `[0, ShardTotal)`.
pub type ShardId = u32;

/// Node identifier, unique within its group.
pub type NodeId = u32;

/// Longest accepted group name.
pub const MAX_GROUP_NAME_LEN: usize = 128;

/// Network address of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeAddress {
    /// Host name or IP.
    pub host: String,
    /// Service port.
    pub port: u16,
}

impl NodeAddress {
    /// Create a new address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Role of a node within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// The node serves the group's master traffic.
    Master,
    /// The node replicates from a master.
    Follower,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Master => write!(f, "master"),
            NodeRole::Follower => write!(f, "follower"),
        }
    }
}

/// A group member as declared by the topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier.
    pub node_id: NodeId,
    /// Owning group.
    pub group_name: String,
    /// Data center the node lives in.
    pub dc: String,
    /// Service address.
    pub address: NodeAddress,
    /// Master/follower flag.
    pub role: NodeRole,
    /// Shards this node is declared to lead.
    pub leader_shards: Vec<ShardId>,
    /// Shards this node is declared to follow.
    pub follower_shards: Vec<ShardId>,
}

impl Node {
    /// Create a node with no declared shards.
    pub fn new(node_id: NodeId, group_name: impl Into<String>, address: NodeAddress) -> Self {
        Self {
            node_id,
            group_name: group_name.into(),
            dc: String::new(),
            address,
            role: NodeRole::Follower,
            leader_shards: Vec::new(),
            follower_shards: Vec::new(),
        }
    }

    /// Set the data center.
    pub fn with_dc(mut self, dc: impl Into<String>) -> Self {
        self.dc = dc.into();
        self
    }

    /// Set the role.
    pub fn with_role(mut self, role: NodeRole) -> Self {
        self.role = role;
        self
    }

    /// Set the declared leader shards.
    pub fn with_leader_shards(mut self, shards: impl IntoIterator<Item = ShardId>) -> Self {
        self.leader_shards = shards.into_iter().collect();
        self
    }

    /// Set the declared follower shards.
    pub fn with_follower_shards(mut self, shards: impl IntoIterator<Item = ShardId>) -> Self {
        self.follower_shards = shards.into_iter().collect();
        self
    }

    /// Declared leader shards as a set.
    pub fn leader_set(&self) -> BTreeSet<ShardId> {
        self.leader_shards.iter().copied().collect()
    }

    /// Declared follower shards as a set.
    pub fn follower_set(&self) -> BTreeSet<ShardId> {
        self.follower_shards.iter().copied().collect()
    }

    /// Whether the node declares both leader and follower shards.
    pub fn has_mixed_roles(&self) -> bool {
        !self.leader_shards.is_empty() && !self.follower_shards.is_empty()
    }
}

/// A replica group bound to a data center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Data center.
    pub dc: String,
    /// Name of the node configuration the group runs with.
    pub config_ref: String,
    /// Member nodes.
    pub nodes: Vec<Node>,
}

/// Check that a group name is usable as a registry key.
///
/// Accepts ASCII alphanumerics plus `-`, `_` and `.`, up to
/// [`MAX_GROUP_NAME_LEN`] characters.
pub fn validate_group_name(name: &str) -> Result<(), ValidationError> {
    let well_formed = !name.is_empty()
        && name.len() <= MAX_GROUP_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::MalformedGroupName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_name_validation() {
        assert!(validate_group_name("group-1").is_ok());
        assert!(validate_group_name("dc1.group_a").is_ok());
        assert!(validate_group_name("").is_err());
        assert!(validate_group_name("has space").is_err());
        assert!(validate_group_name("../etc").is_err());
        assert!(validate_group_name(&"g".repeat(MAX_GROUP_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_node_builder() {
        let node = Node::new(3, "g1", NodeAddress::new("10.0.0.3", 9000))
            .with_dc("dc1")
            .with_role(NodeRole::Master)
            .with_leader_shards([2, 0, 2]);

        assert_eq!(node.address.to_string(), "10.0.0.3:9000");
        assert_eq!(node.leader_set().into_iter().collect::<Vec<_>>(), vec![0, 2]);
        assert!(!node.has_mixed_roles());
        assert!(node.clone().with_follower_shards([5]).has_mixed_roles());
    }
}
