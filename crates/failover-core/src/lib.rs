//! `failover-core` — regional failover/failback for RDS instances behind
//! RDS Proxy.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator            ← per-pair workflow, pair-level failure isolation
//!     │
//!     ├── probe           ← describe + classify (absent / primary / replica)
//!     ├── ReplicaLifecycle← create replica, delete, rename (each polled)
//!     ├── Promoter        ← promote + settle heuristics
//!     └── ProxyRetargeter ← deregister-all, register-one, copy settings
//!             │
//!             ▼
//!          Poller         ← bounded, cancellable retry-until-condition
//!             │
//!             ▼
//!          RdsApi         ← cloud capability (AWS SDK, Delayed, fake)
//! ```

pub mod cloud;
pub mod config;
pub mod delay;
pub mod error;
pub mod orchestrator;
pub mod poller;
pub mod probe;
pub mod promotion;
pub mod proxy;
pub mod replica;
pub mod stamp;
pub mod types;

#[cfg(test)]
mod fake;

pub use cloud::{CloudError, CloudResult, CreateReplicaRequest, DbInstance, RdsApi};
pub use config::{FailoverConfig, RunOptions, Timings};
pub use error::{FailoverError, Result};
pub use orchestrator::{Orchestrator, PairOutcome, RunReport};
pub use types::Direction;
