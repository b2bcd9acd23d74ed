//! The capability-gated object store trait and its wire-level types.
//!
//! A backing store is a flat namespace of string keys. Keys may contain `/`
//! separators; a key prefix that other keys extend is a *container*. Beyond
//! the mandatory get/put/delete/list primitives everything is optional:
//! backends advertise optional primitives in [`Capabilities`] and the
//! default trait methods return [`StoreError::Unsupported`] so that a
//! missing capability is always an explicit error, never a silent no-op.

use std::io::Read;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::context::OpContext;
use crate::error::{StoreError, StoreResult};

/// Whether a listed entry is a plain object or a container.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EntryKind {
    /// A stored object with a payload.
    Object,
    /// A container holding further keys.
    Container,
}

/// One entry from a raw container listing.
#[derive(Clone, Debug)]
pub struct StoreEntry {
    /// Key relative to the listed container.
    pub key: String,
    /// Object or container.
    pub kind: EntryKind,
    /// Size in bytes; -1 when the backend does not know.
    pub size: i64,
    /// Last modification time as reported by the backend.
    pub mod_time: SystemTime,
}

/// Metadata for a single stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Full key of the object.
    pub key: String,
    /// Payload size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mod_time: SystemTime,
}

/// The kind of entry a change notification refers to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChangeKind {
    /// An object was created, updated or deleted.
    Object,
    /// A container was created or deleted.
    Container,
}

/// Usage and quota information from the backend.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Total bytes available, if known.
    pub total: Option<u64>,
    /// Bytes in use, if known.
    pub used: Option<u64>,
    /// Bytes free, if known.
    pub free: Option<u64>,
}

/// Checksum kinds a backend may support for stored objects.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ChecksumKind {
    /// MD5 digest, hex encoded.
    Md5,
    /// SHA-1 digest, hex encoded.
    Sha1,
    /// SHA-256 digest, hex encoded.
    Sha256,
}

/// Optional-primitive advertisement for a backend.
///
/// A `true` flag promises the corresponding trait method is implemented;
/// a `false` flag means calling it returns [`StoreError::Unsupported`].
#[derive(Clone, Copy, Debug)]
pub struct Capabilities {
    /// Server-side container move ([`ObjectStore::server_move`]).
    pub server_move: bool,
    /// Server-side object copy ([`ObjectStore::server_copy`]).
    pub server_copy: bool,
    /// Recursive container delete ([`ObjectStore::purge`]).
    pub purge: bool,
    /// Key-change notifications ([`ObjectStore::change_notify`]).
    pub change_notify: bool,
    /// Usage/quota query ([`ObjectStore::about`]).
    pub about: bool,
    /// The backend can persist a container with no objects in it.
    pub empty_containers: bool,
}

impl Capabilities {
    /// Everything supported.
    pub fn full() -> Self {
        Self {
            server_move: true,
            server_copy: true,
            purge: true,
            change_notify: true,
            about: true,
            empty_containers: true,
        }
    }

    /// Only the mandatory primitives.
    pub fn minimal() -> Self {
        Self {
            server_move: false,
            server_copy: false,
            purge: false,
            change_notify: false,
            about: false,
            empty_containers: false,
        }
    }
}

/// Callback invoked with `(key, kind)` for every observed key change.
pub type ChangeCallback = Box<dyn Fn(&str, ChangeKind) + Send + Sync>;

/// A flat, string-keyed remote object store.
pub trait ObjectStore: Send + Sync {
    /// The optional primitives this backend implements.
    fn capabilities(&self) -> Capabilities;

    /// Modification-time precision of the backend.
    fn precision(&self) -> Duration;

    /// Checksum kinds the backend can report for stored objects.
    fn checksum_kinds(&self) -> Vec<ChecksumKind>;

    /// Open an object for reading.
    fn get(&self, ctx: &OpContext, key: &str) -> StoreResult<Box<dyn Read + Send>>;

    /// Metadata for a single object.
    fn stat(&self, ctx: &OpContext, key: &str) -> StoreResult<ObjectMeta>;

    /// Write an object, replacing any previous payload under `key`.
    ///
    /// `size_hint` is the expected payload size when the caller knows it;
    /// `None` means the payload is streamed with unknown length.
    fn put(
        &self,
        ctx: &OpContext,
        key: &str,
        data: &mut dyn Read,
        size_hint: Option<u64>,
    ) -> StoreResult<ObjectMeta>;

    /// Delete a single object. Fails `NotFound` if the key is absent.
    fn delete(&self, ctx: &OpContext, key: &str) -> StoreResult<()>;

    /// Create a container. Idempotent.
    fn make_container(&self, ctx: &OpContext, key: &str) -> StoreResult<()>;

    /// List the immediate entries of `container` (`""` for the store root).
    fn list(&self, ctx: &OpContext, container: &str) -> StoreResult<Vec<StoreEntry>>;

    /// Checksum of an object, or `None` if the backend has none of `kind`.
    fn checksum(
        &self,
        ctx: &OpContext,
        key: &str,
        kind: ChecksumKind,
    ) -> StoreResult<Option<String>>;

    /// MIME type of an object, if the backend tracks one.
    fn mime_type(&self, _ctx: &OpContext, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    /// Set the modification time of an object.
    fn set_mod_time(
        &self,
        _ctx: &OpContext,
        _key: &str,
        _mod_time: SystemTime,
    ) -> StoreResult<()> {
        Err(StoreError::Unsupported("set-mod-time"))
    }

    /// Delete a container and everything under it.
    fn purge(&self, _ctx: &OpContext, _container: &str) -> StoreResult<()> {
        Err(StoreError::Unsupported("purge"))
    }

    /// Server-side move of a container and everything under it.
    fn server_move(&self, _ctx: &OpContext, _src: &str, _dst: &str) -> StoreResult<()> {
        Err(StoreError::Unsupported("server-side move"))
    }

    /// Server-side copy of a single object.
    fn server_copy(&self, _ctx: &OpContext, _src: &str, _dst: &str) -> StoreResult<ObjectMeta> {
        Err(StoreError::Unsupported("server-side copy"))
    }

    /// Usage and quota information.
    fn about(&self, _ctx: &OpContext) -> StoreResult<Usage> {
        Err(StoreError::Unsupported("about"))
    }

    /// Register a callback for raw key-change events.
    ///
    /// `poll_interval` is a hint for polling backends; event-driven backends
    /// may ignore it.
    fn change_notify(
        &self,
        _ctx: &OpContext,
        _callback: ChangeCallback,
        _poll_interval: Duration,
    ) -> StoreResult<()> {
        Err(StoreError::Unsupported("change-notify"))
    }
}
