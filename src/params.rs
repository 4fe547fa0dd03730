//! Request and response types of the exposed operations.
//!
//! Field names are serialized exactly as the surrounding API layer expects
//! them (`GroupName`, `AssignedListNum`, ...).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::assignment::{ShardAssignment, ShardBucket};
use crate::operations::{BatchSubmission, TargetNode, TaskId, TaskSnapshot};
use crate::readiness::ReadinessReport;
use crate::types::{NodeId, ShardId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckGroupReadyToBeMasterParams {
    pub group_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckGroupReadyToBeMasterResult {
    pub ready: bool,
    pub missing_shards: Vec<ShardId>,
    pub reduplicative_shards: Vec<ShardId>,
    pub unavailable_shards: BTreeMap<NodeId, Vec<ShardId>>,
    pub inconsistent_nodes: Vec<NodeId>,
}

impl From<ReadinessReport> for CheckGroupReadyToBeMasterResult {
    fn from(report: ReadinessReport) -> Self {
        Self {
            ready: report.ready,
            missing_shards: report.missing_shards,
            reduplicative_shards: report.reduplicative_shards,
            unavailable_shards: report.unavailable_shards,
            inconsistent_nodes: report.inconsistent_nodes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignShardListParams {
    pub database_name: String,
    pub table_name: String,
    /// 1 by size, 2 by read/write rate, 3 by count.
    #[serde(rename = "Type")]
    pub assign_type: u32,
    pub assigned_list_num: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignedResultEntry {
    pub size_sum: u64,
    pub kps_sum: u64,
    pub shard_list: Vec<ShardId>,
}

impl From<ShardBucket> for AssignedResultEntry {
    fn from(bucket: ShardBucket) -> Self {
        Self {
            size_sum: bucket.size_sum,
            kps_sum: bucket.kps_sum,
            shard_list: bucket.shards,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssignedTableShardResult {
    pub total_shard_list_info: AssignedResultEntry,
    pub assigned_shard_list_infos: Vec<AssignedResultEntry>,
}

impl From<ShardAssignment> for AssignedTableShardResult {
    fn from(assignment: ShardAssignment) -> Self {
        Self {
            total_shard_list_info: assignment.total.into(),
            assigned_shard_list_infos: assignment.buckets.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeOperationParams {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub dc: String,
    #[serde(default)]
    pub node_id: u32,
}

impl From<NodeOperationParams> for TargetNode {
    fn from(p: NodeOperationParams) -> Self {
        TargetNode {
            host: p.host,
            port: p.port,
            group_name: p.group_name,
            dc: p.dc,
            node_id: p.node_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeBatchOperationParams {
    pub nodes: Vec<NodeOperationParams>,
    #[serde(default)]
    pub ansible_vars: serde_json::Map<String, serde_json::Value>,
    pub tags: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub operation_name: String,
}

impl From<NodeBatchOperationParams> for BatchSubmission {
    fn from(p: NodeBatchOperationParams) -> Self {
        BatchSubmission {
            targets: p.nodes.into_iter().map(Into::into).collect(),
            vars: p.ansible_vars,
            tags: p.tags,
            roles: p.roles,
            operation_name: p.operation_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeBatchOperationResult {
    pub task_id: String,
}

impl From<TaskId> for NodeBatchOperationResult {
    fn from(task_id: TaskId) -> Self {
        Self {
            task_id: task_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeBatchOperationInfoParams {
    pub group_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeBatchOperationInfo {
    pub has_task: bool,
    pub operation_name: String,
    pub log: String,
    pub done: bool,
}

impl From<Option<TaskSnapshot>> for NodeBatchOperationInfo {
    fn from(snapshot: Option<TaskSnapshot>) -> Self {
        match snapshot {
            Some(task) => Self {
                has_task: true,
                done: task.done(),
                operation_name: task.operation_name,
                log: task.log,
            },
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_readiness_result_field_names() {
        let mut unavailable = BTreeMap::new();
        unavailable.insert(2, vec![2, 3]);
        let result = CheckGroupReadyToBeMasterResult {
            ready: false,
            missing_shards: vec![3],
            reduplicative_shards: vec![1],
            unavailable_shards: unavailable,
            inconsistent_nodes: vec![],
        };

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "Ready": false,
                "MissingShards": [3],
                "ReduplicativeShards": [1],
                "UnavailableShards": {"2": [2, 3]},
                "InconsistentNodes": []
            })
        );
    }

    #[test]
    fn test_assign_params_from_wire() {
        let params: AssignShardListParams = serde_json::from_value(json!({
            "DatabaseName": "db",
            "TableName": "t",
            "Type": 3,
            "AssignedListNum": 2
        }))
        .unwrap();
        assert_eq!(params.assign_type, 3);
        assert_eq!(params.assigned_list_num, 2);
    }

    #[test]
    fn test_batch_params_from_wire() {
        let params: NodeBatchOperationParams = serde_json::from_value(json!({
            "Nodes": [
                {"Host": "10.0.0.1", "Port": 9000, "GroupName": "g1", "Dc": "dc1", "NodeId": 1}
            ],
            "AnsibleVars": {"version": "1.2.3"},
            "Tags": "upgrade",
            "OperationName": "upgrade g1"
        }))
        .unwrap();

        let submission = BatchSubmission::from(params);
        assert_eq!(submission.targets[0].group_name, "g1");
        assert_eq!(submission.vars["version"], "1.2.3");
        assert!(submission.roles.is_empty());
    }

    #[test]
    fn test_info_without_task() {
        let info = NodeBatchOperationInfo::from(None);
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({"HasTask": false, "OperationName": "", "Log": "", "Done": false})
        );
    }
}
