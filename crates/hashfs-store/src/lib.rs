#![warn(missing_docs)]

//! Hashfs backing-store contract.
//!
//! This crate defines the collaborator interface the overlay talks to: a
//! flat, string-keyed object store with capability-gated optional
//! primitives. Backends advertise what they support through
//! [`Capabilities`]; every optional primitive a backend lacks must surface
//! as [`StoreError::Unsupported`], never as a silent no-op.

pub mod context;
pub mod error;
pub mod memory;
pub mod store;

pub use context::{CancelHandle, OpContext};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, MemoryStoreStats};
pub use store::{
    Capabilities, ChangeCallback, ChangeKind, ChecksumKind, EntryKind, ObjectMeta, ObjectStore,
    StoreEntry, Usage,
};
