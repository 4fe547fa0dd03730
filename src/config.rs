//! Configuration types for the control plane.

use std::collections::BTreeSet;
use std::time::Duration;

/// Tags accepted by default for batch operations.
pub const DEFAULT_SUPPORTED_TAGS: &[&str] =
    &["start", "stop", "restart", "upgrade", "enable", "disable"];

/// Main configuration for the control plane core.
#[derive(Debug, Clone, Default)]
pub struct ControlPlaneConfig {
    /// Readiness checker configuration.
    pub readiness: ReadinessConfig,

    /// Shard assigner configuration.
    pub assigner: AssignerConfig,

    /// Batch operation orchestrator configuration.
    pub orchestrator: OrchestratorConfig,
}

impl ControlPlaneConfig {
    /// Create a configuration with defaults for every component.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set readiness configuration.
    pub fn with_readiness_config(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    /// Set assigner configuration.
    pub fn with_assigner_config(mut self, assigner: AssignerConfig) -> Self {
        self.assigner = assigner;
        self
    }

    /// Set orchestrator configuration.
    pub fn with_orchestrator_config(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }
}

/// Readiness check configuration.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Upper bound on a single registry query. Queries run concurrently, so
    /// this also bounds the whole fan-out.
    pub registry_timeout: Duration,

    /// Treat a node that declares both leader and follower shards as
    /// inconsistent.
    pub reject_mixed_roles: bool,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            registry_timeout: Duration::from_secs(3),
            reject_mixed_roles: true,
        }
    }
}

impl ReadinessConfig {
    /// Set the per-node registry timeout.
    pub fn with_registry_timeout(mut self, timeout: Duration) -> Self {
        self.registry_timeout = timeout;
        self
    }

    /// Enable or disable the mixed-role rule.
    pub fn with_reject_mixed_roles(mut self, enabled: bool) -> Self {
        self.reject_mixed_roles = enabled;
        self
    }
}

/// Shard assigner configuration.
#[derive(Debug, Clone)]
pub struct AssignerConfig {
    /// Largest accepted `AssignedListNum`.
    pub max_list_num: u32,
}

impl Default for AssignerConfig {
    fn default() -> Self {
        Self { max_list_num: 4096 }
    }
}

impl AssignerConfig {
    /// Set the largest accepted list count.
    pub fn with_max_list_num(mut self, max: u32) -> Self {
        self.max_list_num = max;
        self
    }
}

/// Batch operation orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Tags a submission may carry.
    pub supported_tags: BTreeSet<String>,

    /// Delay between progress polls against the execution engine.
    pub poll_interval: Duration,

    /// Consecutive poll errors tolerated before a task is failed. A poll
    /// that times out counts as an error.
    pub max_poll_failures: u32,

    /// Upper bound on a single submit or poll call to the engine.
    pub engine_call_timeout: Duration,

    /// SSH port written into the rendered inventory.
    pub ssh_port: u16,

    /// Cap on the retained task log. The oldest output is dropped first.
    pub max_log_bytes: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            supported_tags: DEFAULT_SUPPORTED_TAGS.iter().map(|t| t.to_string()).collect(),
            poll_interval: Duration::from_secs(1),
            max_poll_failures: 5,
            engine_call_timeout: Duration::from_secs(30),
            ssh_port: 22,
            max_log_bytes: 4 * 1024 * 1024,
        }
    }
}

impl OrchestratorConfig {
    /// Replace the supported tag set.
    pub fn with_supported_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the tolerated number of consecutive poll failures.
    pub fn with_max_poll_failures(mut self, max: u32) -> Self {
        self.max_poll_failures = max;
        self
    }

    /// Set the per-call engine timeout.
    pub fn with_engine_call_timeout(mut self, timeout: Duration) -> Self {
        self.engine_call_timeout = timeout;
        self
    }

    /// Set the SSH port used in inventories.
    pub fn with_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    /// Set the log size cap.
    pub fn with_max_log_bytes(mut self, bytes: usize) -> Self {
        self.max_log_bytes = bytes;
        self
    }

    /// Whether `tags` is an accepted tag value.
    pub fn supports_tags(&self, tags: &str) -> bool {
        self.supported_tags.contains(tags)
    }
}
