//! # Grouping Records
//!
//! Group definitions kept as metadata next to a host's entry collections.
//!
//! ## Pipeline
//!
//! ```text
//! Host container document
//!     │
//!     ├──> Normalizer (read_all / write_all)
//!     │      ├─ anchor records pass through
//!     │      └─ positional records upgrade, or stay flagged unresolved
//!     │
//!     ├──> Anchor Resolver
//!     │      └─ anchors -> inclusive spans over the live key order
//!     │
//!     └──> Group Store (add / update / remove)
//!            ├─ save container (no host broadcast)
//!            └─ mirror into live session settings when active
//! ```
//!
//! World-info groups are stored per book as id-keyed groups plus an explicit
//! `groupOrder` list, see [`BookGroups`].

mod config;
mod error;
mod host;
mod model;
mod normalize;
mod resolve;
mod store;
mod world_info;
mod world_info_store;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use host::{HostDocuments, MemoryHost, SaveOptions, SaveRecord};
pub use model::{
    derived_group_id, display_name, generate_group_id, GroupAnchor, GroupMode, GroupRecord,
    StoredGroup, UnresolvedAnchor, DEFAULT_GROUP_NAME,
};
pub use normalize::{read_all, to_values, write_all};
pub use resolve::{
    position_of, resolve, resolve_all, GroupStatus, Resolution, ResolvedGroup, Span,
    UnresolvedReason,
};
pub use store::{GroupPatch, GroupStore};
pub use world_info::{BookGroups, Section, WorldInfoGroup, EMPTY_GROUP_LABEL};
pub use world_info_store::WorldInfoStore;
