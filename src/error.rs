//! Error types for the control plane.

use thiserror::Error;

/// Result type alias for control plane operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Caller-facing status codes.
///
/// The surrounding API layer reports these verbatim, so the values are part
/// of the wire contract and must not be renumbered.
pub mod codes {
    /// Generic failure.
    pub const ERROR: u32 = 1;
    /// Request parameters failed validation.
    pub const PARAMS_INVALID: u32 = 100;
    /// No cluster is configured.
    pub const CLUSTER_NOT_EXIST: u32 = 30003;
    /// The named group is unknown to the topology.
    pub const GROUP_NOT_EXIST: u32 = 50002;
    /// The weight source has no metrics for the table.
    pub const GET_INFO_FAILED: u32 = 80001;
    /// The batch operation tags are not supported.
    pub const UNKNOWN_TAGS: u32 = 100001;
    /// A batch operation is already live for the group.
    pub const GROUP_HAS_TASK_IN_PROGRESS: u32 = 100003;
    /// The batch operation parameters are malformed.
    pub const BATCH_PARAMS_ERROR: u32 = 100004;
}

/// Main error type for the control plane.
#[derive(Error, Debug)]
pub enum Error {
    /// The request was rejected before any collaborator was contacted.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// A batch operation is already live for the group.
    #[error("group {group} already has a live batch operation ({task_id})")]
    Conflict { group: String, task_id: String },

    /// Topology or weight lookups failed.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// The execution engine failed.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The caller-facing status code for this error.
    pub fn code(&self) -> u32 {
        match self {
            Error::Validation(ValidationError::UnsupportedTags(_)) => codes::UNKNOWN_TAGS,
            Error::Validation(
                ValidationError::NoTargetNodes
                | ValidationError::MixedGroups { .. }
                | ValidationError::EmptyOperationName,
            ) => codes::BATCH_PARAMS_ERROR,
            Error::Validation(_) => codes::PARAMS_INVALID,
            Error::Conflict { .. } => codes::GROUP_HAS_TASK_IN_PROGRESS,
            Error::Topology(TopologyError::GroupNotFound(_)) => codes::GROUP_NOT_EXIST,
            Error::Topology(TopologyError::ClusterNotFound) => codes::CLUSTER_NOT_EXIST,
            Error::Topology(TopologyError::TableNotFound { .. }) => codes::GET_INFO_FAILED,
            Error::Topology(_) | Error::Execution(_) | Error::Internal(_) => codes::ERROR,
        }
    }

    /// Whether the request was rejected synchronously during validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Whether the request collided with a live batch operation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

/// Request validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Group name is empty, too long or contains unsupported characters.
    #[error("malformed group name: {0:?}")]
    MalformedGroupName(String),

    /// `AssignedListNum` was zero.
    #[error("assigned list number must be greater than zero")]
    ZeroListNum,

    /// `AssignedListNum` exceeded the configured ceiling.
    #[error("assigned list number {requested} exceeds the limit of {max}")]
    ListNumTooLarge { requested: u32, max: u32 },

    /// The assignment mode code is not recognised.
    #[error("unknown assignment type: {0}")]
    UnknownAssignMode(u32),

    /// Database or table name was empty.
    #[error("database and table names must not be empty")]
    EmptyTableName,

    /// No target nodes were supplied.
    #[error("batch operation needs at least one target node")]
    NoTargetNodes,

    /// Target nodes span more than one group.
    #[error("target nodes span groups {first:?} and {other:?}")]
    MixedGroups { first: String, other: String },

    /// Tags are outside the supported set.
    #[error("unsupported tags: {0:?}")]
    UnsupportedTags(String),

    /// Operation name was empty.
    #[error("operation name must not be empty")]
    EmptyOperationName,
}

/// Errors from the topology, registry and weight collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// No cluster is configured.
    #[error("cluster not found")]
    ClusterNotFound,

    /// The group is unknown.
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// The table is unknown to the weight source.
    #[error("table not found: {database}.{table}")]
    TableNotFound { database: String, table: String },

    /// The node at this address did not answer.
    #[error("node unreachable: {0}")]
    Unreachable(String),

    /// Backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors reported by the execution engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The engine refused the request.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The handle is unknown to the engine.
    #[error("unknown execution handle: {0}")]
    UnknownHandle(String),

    /// Progress could not be read.
    #[error("poll failed: {0}")]
    PollFailed(String),

    /// The engine did not answer in time.
    #[error("{call} timed out after {after_ms}ms")]
    TimedOut { call: &'static str, after_ms: u64 },
}
