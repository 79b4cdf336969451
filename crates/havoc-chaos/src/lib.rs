//! Havoc Chaos: fault injection and chaos orchestration
//!
//! Deliberately makes dependencies misbehave so callers can prove their
//! resilience story. Faults are never injected by mutating a live object:
//! every dependency sits behind a swap proxy ([`StoreProxy`] / [`QueueProxy`])
//! and the injector swaps *which implementation instance* the proxy delegates
//! to, under a registry mutex.
//!
//! ```text
//! ┌──────────────────────┐
//! │      Caller          │
//! └─────────┬────────────┘
//!           │ ObjectStore / MessageQueue
//!           ▼
//! ┌──────────────────────┐     swap      ┌─────────────────────────┐
//! │   StoreProxy         │◄──────────────│     ChaosInjector       │
//! │  (delegates to Arc)  │               │ (one fault per service, │
//! └─────────┬────────────┘               │  reject on conflict)    │
//!           │                            └─────────────────────────┘
//!           ▼
//!   LatencyStore / FailingStore / CorruptingStore / original
//! ```
//!
//! # Fault kinds
//!
//! - **Latency**: `put` sleeps a fixed delay inside a bounded time window
//! - **Service outage**: every operation of a service group raises a tagged
//!   unavailability error; storage and messaging fail independently
//! - **Data corruption**: writes are probabilistically mutated (nulled
//!   columns, duplicated rows, truncation) before delegating
//! - **Resource pressure**: bounded CPU / memory load with utilization
//!   sampling; self-terminating, no deactivation
//!
//! Every activation is recorded in the [`ExperimentLog`]; the
//! [`ChaosMonkey`] drives randomized experiments for a bounded run and the
//! log flushes to a JSON [`ChaosReport`].

pub mod corruption;
pub mod error;
pub mod experiment;
pub mod injector;
pub mod latency;
pub mod monkey;
pub mod outage;
pub mod pressure;
pub mod proxy;

// Re-export main types for convenience
pub use corruption::{CorruptingStore, CorruptionStrategy};
pub use error::{ChaosError, ServiceKind};
pub use experiment::{ChaosReport, ExperimentKind, ExperimentLog, ExperimentLogEntry};
pub use injector::ChaosInjector;
pub use latency::LatencyStore;
pub use monkey::{ChaosMonkey, MonkeyPolicy};
pub use outage::{FailingQueue, FailingStore};
pub use pressure::{cpu_load, memory_pressure, PressureReport};
pub use proxy::{QueueProxy, StoreProxy};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use havoc_chaos::prelude::*;
/// ```
pub mod prelude {
    pub use super::error::{ChaosError, ServiceKind};
    pub use super::experiment::{ChaosReport, ExperimentKind, ExperimentLog};
    pub use super::injector::ChaosInjector;
    pub use super::monkey::{ChaosMonkey, MonkeyPolicy};
    pub use super::proxy::{QueueProxy, StoreProxy};
}
