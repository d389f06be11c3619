//! Local mirror of the remote chains.
//!
//! The mirror holds chains, blocks, transactions, events, accounts, tokens, applications and
//! organizations. `MirrorStore` is the repository contract; `InMemoryMirror` implements it and
//! `FileSnapshotRepository` persists it as checkpoints so the synchronizer can resume.
//! `MirrorQuery` holds the read-side policies used by the API.

/// Entity definitions
pub mod model;
/// Page arithmetic
pub mod pagination;
/// Read-side projections
pub mod query;
/// Checkpoint persistence
pub mod snapshot;
/// Repository trait and in-memory implementation
pub mod store;

pub use model::*;
pub use pagination::{DEFAULT_PAGE_SIZE, Page, Pagination};
pub use query::{DEFAULT_NATIVE_TOKEN, MirrorQuery, RichListEntry};
pub use snapshot::{FileSnapshotRepository, SnapshotMetadata, SnapshotRepository};
pub use store::{AccountRefresh, InMemoryMirror, MirrorState, MirrorStore, StoreError};
