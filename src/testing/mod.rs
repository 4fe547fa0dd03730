//! Testing utilities for the control plane.
//!
//! In-memory stand-ins for every external collaborator:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       ControlPlane                        │
//! │   ReadinessChecker    ShardAssigner    Orchestrator       │
//! └──────┬─────────┬───────────┬────────────────┬─────────────┘
//!        │         │           │                │
//!        ▼         ▼           ▼                ▼
//!  StaticTopology  ScriptedRegistry  StaticWeights  ScriptedEngine
//!  (groups, total) (reply/hang/fail) (shards, metrics) (scripted polls)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use shardplane::testing::{ScriptedRegistry, StaticTopology};
//! use shardplane::topology::NodeShardReport;
//!
//! let topology = StaticTopology::new(4).with_group("g1", vec![a.clone(), b.clone()]);
//! let registry = ScriptedRegistry::new()
//!     .reply(&a.address, NodeShardReport::leaders([0, 1]))
//!     .hang(&b.address);
//! ```

mod fakes;


pub use fakes::{ScriptedEngine, ScriptedRegistry, StaticTopology, StaticWeights};

use tracing_subscriber::EnvFilter;

/// Install a test log subscriber. Honors `RUST_LOG`, defaults to `info`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
