//! # Grouping Engine
//!
//! Keeps a live, host-owned entry list presenting the groups stored for it
//! without reacting to its own writes.
//!
//! ## Cycle
//!
//! ```text
//! Host mutation / settings change
//!     │
//!     ├──> classify (ignored | entries | wrappers)
//!     │      ├─ guard set      -> dropped
//!     │      ├─ entries        -> debounced pass (150ms)
//!     │      └─ wrappers       -> immediate pass + follow-up
//!     │
//!     └──> pass
//!            ├─ read order + stored groups, normalize, resolve
//!            ├─ signature unchanged and presentation intact -> skip
//!            ├─ nothing resolved -> retry (450ms, 1200ms, ...)
//!            └─ rebuild: unwrap all, wrap spans, guard until next tick
//! ```
//!
//! [`GroupingEngine`] is a synchronous state machine driven with explicit
//! instants; [`spawn_engine`] runs one on a tokio task.

mod config;
mod engine;
mod error;
mod reconciler;
mod runtime;
mod scheduler;
mod signature;
pub mod test_support;
mod view;

pub use config::SyncConfig;
pub use engine::{EngineStatus, GroupingEngine, SyncState};
pub use error::{EngineError, Result};
pub use reconciler::{AbortReason, RebuildSummary, ReconcileOutcome, Reconciler};
pub use runtime::{spawn_engine, EngineHandle};
pub use scheduler::{TaskTag, TimerQueue};
pub use signature::Signature;
pub use view::{
    classify, EventSink, GroupLabel, MutationRecord, NodeRef, Relevance, SettingsEvents,
    SubscriptionId, ViewAdapter, ViewEvent, ViewId,
};
