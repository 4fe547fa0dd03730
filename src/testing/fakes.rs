//! In-memory collaborators.
//!
//! Every fake is cheap to clone and clones share state, so a test can hand
//! one copy to the component under test and keep another to script or
//! inspect it.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{ExecutionError, Result, TopologyError};
use crate::operations::{ExecutionEngine, ExecutionHandle, ExecutionProgress, ExecutionRequest};
use crate::topology::{NodeShardReport, RegistryReader, ShardMetrics, TopologyReader, WeightSource};
use crate::types::{Group, Node, NodeAddress, ShardId};

#[derive(Debug, Default)]
struct TopologyState {
    shard_total: u32,
    unconfigured: bool,
    groups: RwLock<HashMap<String, Group>>,
    lookups: AtomicUsize,
}

/// Fixed topology: a shard total and a set of groups.
#[derive(Debug, Clone, Default)]
pub struct StaticTopology {
    state: Arc<TopologyState>,
}

impl StaticTopology {
    /// A topology whose groups all split into `shard_total` shards.
    pub fn new(shard_total: u32) -> Self {
        Self {
            state: Arc::new(TopologyState {
                shard_total,
                ..Default::default()
            }),
        }
    }

    /// A topology with no cluster configured. Every lookup fails with
    /// [`TopologyError::ClusterNotFound`].
    pub fn unconfigured() -> Self {
        Self {
            state: Arc::new(TopologyState {
                unconfigured: true,
                ..Default::default()
            }),
        }
    }

    /// Add a group made of `nodes`.
    pub fn with_group(self, name: &str, nodes: Vec<Node>) -> Self {
        let dc = nodes.first().map(|n| n.dc.clone()).unwrap_or_default();
        self.insert_group(Group {
            name: name.to_string(),
            dc,
            config_ref: String::new(),
            nodes,
        });
        self
    }

    /// Add or replace a group.
    pub fn insert_group(&self, group: Group) {
        self.state.groups.write().insert(group.name.clone(), group);
    }

    /// Number of calls made against this topology.
    pub fn lookups(&self) -> usize {
        self.state.lookups.load(Ordering::SeqCst)
    }

    fn group(&self, name: &str) -> Result<Group> {
        self.state.lookups.fetch_add(1, Ordering::SeqCst);
        if self.state.unconfigured {
            return Err(TopologyError::ClusterNotFound.into());
        }
        self.state
            .groups
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| TopologyError::GroupNotFound(name.to_string()).into())
    }
}

#[async_trait]
impl TopologyReader for StaticTopology {
    async fn get_group_members(&self, group_name: &str) -> Result<Vec<Node>> {
        Ok(self.group(group_name)?.nodes)
    }

    async fn get_shard_total(&self, group_name: &str) -> Result<u32> {
        self.group(group_name)?;
        Ok(self.state.shard_total)
    }
}

#[derive(Debug, Clone)]
enum RegistryScript {
    Reply(NodeShardReport),
    Hang,
    Fail,
}

/// Registry with a scripted answer per node address.
///
/// Addresses without a script are unreachable.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRegistry {
    scripts: Arc<RwLock<HashMap<NodeAddress, RegistryScript>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedRegistry {
    /// A registry where every node is unreachable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries for `address` with `report`.
    pub fn reply(self, address: &NodeAddress, report: NodeShardReport) -> Self {
        self.set(address, RegistryScript::Reply(report));
        self
    }

    /// Never answer queries for `address`.
    pub fn hang(self, address: &NodeAddress) -> Self {
        self.set(address, RegistryScript::Hang);
        self
    }

    /// Fail queries for `address`.
    pub fn fail(self, address: &NodeAddress) -> Self {
        self.set(address, RegistryScript::Fail);
        self
    }

    /// Change the answer for `address` on a shared registry.
    pub fn set_reply(&self, address: &NodeAddress, report: NodeShardReport) {
        self.set(address, RegistryScript::Reply(report));
    }

    /// Number of queries received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set(&self, address: &NodeAddress, script: RegistryScript) {
        self.scripts.write().insert(address.clone(), script);
    }
}

#[async_trait]
impl RegistryReader for ScriptedRegistry {
    async fn get_node_shard_ownership(&self, address: &NodeAddress) -> Result<NodeShardReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.read().get(address).cloned();
        match script {
            Some(RegistryScript::Reply(report)) => Ok(report),
            Some(RegistryScript::Hang) => std::future::pending().await,
            Some(RegistryScript::Fail) | None => {
                Err(TopologyError::Unreachable(address.to_string()).into())
            }
        }
    }
}

type TableKey = (String, String);

#[derive(Debug, Default)]
struct WeightState {
    tables: RwLock<HashMap<TableKey, Vec<ShardId>>>,
    metrics: RwLock<HashMap<TableKey, HashMap<ShardId, ShardMetrics>>>,
    lookups: AtomicUsize,
}

/// Fixed table shards and shard metrics.
#[derive(Debug, Clone, Default)]
pub struct StaticWeights {
    state: Arc<WeightState>,
}

impl StaticWeights {
    /// A source with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table with the given shards.
    pub fn with_table(
        self,
        database: &str,
        table: &str,
        shards: impl IntoIterator<Item = ShardId>,
    ) -> Self {
        self.state
            .tables
            .write()
            .insert(key(database, table), shards.into_iter().collect());
        self
    }

    /// Set metrics for one shard.
    pub fn with_metrics(
        self,
        database: &str,
        table: &str,
        shard_id: ShardId,
        metrics: ShardMetrics,
    ) -> Self {
        self.state
            .metrics
            .write()
            .entry(key(database, table))
            .or_default()
            .insert(shard_id, metrics);
        self
    }

    /// Number of calls made against this source.
    pub fn lookups(&self) -> usize {
        self.state.lookups.load(Ordering::SeqCst)
    }

    fn ensure_table(&self, database: &str, table: &str) -> Result<TableKey> {
        self.state.lookups.fetch_add(1, Ordering::SeqCst);
        let k = key(database, table);
        if self.state.tables.read().contains_key(&k) {
            Ok(k)
        } else {
            Err(TopologyError::TableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            }
            .into())
        }
    }
}

fn key(database: &str, table: &str) -> TableKey {
    (database.to_string(), table.to_string())
}

#[async_trait]
impl WeightSource for StaticWeights {
    async fn get_table_shards(&self, database: &str, table: &str) -> Result<Vec<ShardId>> {
        let k = self.ensure_table(database, table)?;
        Ok(self.state.tables.read().get(&k).cloned().unwrap_or_default())
    }

    async fn get_shard_metrics(
        &self,
        database: &str,
        table: &str,
    ) -> Result<HashMap<ShardId, ShardMetrics>> {
        let k = self.ensure_table(database, table)?;
        Ok(self.state.metrics.read().get(&k).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
enum EngineStep {
    Progress(ExecutionProgress),
    PollError(String),
    Panic,
    Hang,
}

#[derive(Debug, Default)]
struct EngineState {
    steps: Mutex<VecDeque<EngineStep>>,
    reject: Mutex<Option<String>>,
    hang_on_submit: AtomicBool,
    held: AtomicBool,
    handles: Mutex<HashSet<ExecutionHandle>>,
    requests: Mutex<Vec<ExecutionRequest>>,
}

/// Execution engine that plays back a script of poll results.
///
/// Once the script is exhausted every poll reports success. While held, polls
/// report a running execution without consuming the script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<EngineState>,
}

impl ScriptedEngine {
    /// An engine whose runs succeed on the first poll.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next poll returns `chunk` and keeps running.
    pub fn then_log(self, chunk: &str) -> Self {
        self.push(EngineStep::Progress(ExecutionProgress::running(chunk)))
    }

    /// Next poll returns `chunk` and finishes successfully.
    pub fn then_succeed(self, chunk: &str) -> Self {
        self.push(EngineStep::Progress(ExecutionProgress::succeeded(chunk)))
    }

    /// Next poll returns `chunk` and finishes with `reason`.
    pub fn then_fail(self, chunk: &str, reason: &str) -> Self {
        self.push(EngineStep::Progress(ExecutionProgress::failed(chunk, reason)))
    }

    /// Next poll errors.
    pub fn then_poll_error(self, message: &str) -> Self {
        self.push(EngineStep::PollError(message.to_string()))
    }

    /// Next poll panics.
    pub fn then_panic(self) -> Self {
        self.push(EngineStep::Panic)
    }

    /// Next poll never returns.
    pub fn then_hang(self) -> Self {
        self.push(EngineStep::Hang)
    }

    /// Submissions never return.
    pub fn hang_on_submit(self) -> Self {
        self.state.hang_on_submit.store(true, Ordering::SeqCst);
        self
    }

    /// Refuse every submission with `reason`.
    pub fn reject_with(self, reason: &str) -> Self {
        *self.state.reject.lock() = Some(reason.to_string());
        self
    }

    /// Keep executions running until [`release`](Self::release).
    pub fn hold(&self) {
        self.state.held.store(true, Ordering::SeqCst);
    }

    /// Let held executions progress again.
    pub fn release(&self) {
        self.state.held.store(false, Ordering::SeqCst);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.state.requests.lock().clone()
    }

    fn push(self, step: EngineStep) -> Self {
        self.state.steps.lock().push_back(step);
        self
    }
}

#[async_trait]
impl ExecutionEngine for ScriptedEngine {
    async fn submit_execution(&self, request: ExecutionRequest) -> Result<ExecutionHandle> {
        if self.state.hang_on_submit.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        if let Some(reason) = self.state.reject.lock().clone() {
            return Err(ExecutionError::Rejected(reason).into());
        }
        let handle = ExecutionHandle(format!("exec-{}", request.task_id));
        self.state.handles.lock().insert(handle.clone());
        self.state.requests.lock().push(request);
        Ok(handle)
    }

    async fn poll_execution(&self, handle: &ExecutionHandle) -> Result<ExecutionProgress> {
        if !self.state.handles.lock().contains(handle) {
            return Err(ExecutionError::UnknownHandle(handle.to_string()).into());
        }
        if self.state.held.load(Ordering::SeqCst) {
            return Ok(ExecutionProgress::running(""));
        }
        let step = self.state.steps.lock().pop_front();
        match step {
            Some(EngineStep::Progress(progress)) => Ok(progress),
            Some(EngineStep::PollError(message)) => Err(ExecutionError::PollFailed(message).into()),
            Some(EngineStep::Panic) => panic!("scripted engine failure on {}", handle),
            Some(EngineStep::Hang) => std::future::pending().await,
            None => Ok(ExecutionProgress::succeeded("")),
        }
    }
}
