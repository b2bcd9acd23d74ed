//! The overlay facade.
//!
//! [`HashFs`] owns the directory tree index and the handle to the backing
//! store. Mutation algorithms live in [`crate::dirops`] and
//! [`crate::fileops`], the listing engine in [`crate::list`] and the
//! change-notification translator in [`crate::notify`]; this module holds
//! construction, shared resolution helpers and the passthrough delegations.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use hashfs_store::{ChecksumKind, EntryKind, ObjectStore, OpContext, Usage};

use crate::codec;
use crate::config::Config;
use crate::error::{FsError, FsResult};
use crate::hashing::HashAlgo;
use crate::paths::key_join;
use crate::tree::{DirId, DirTree};

/// Key of the persisted root index object.
pub(crate) const ROOT_INDEX_KEY: &str = "map";
/// Leaf name of each directory's persisted file index.
pub(crate) const FILE_INDEX_LEAF: &str = "map";
/// Leaf name of a file's name-reconstruction record.
pub(crate) const NAME_LEAF: &str = "name";
/// Leaf name of a file's payload object.
pub(crate) const DATA_LEAF: &str = "data";

/// A hierarchical path namespace over a flat, hash-keyed object store.
///
/// The tree index and the per-directory file tables are process-local
/// caches: concurrent mutation of overlapping directories from multiple
/// callers is not serialized by this layer and must be serialized by the
/// caller. Internal lock scopes never span a backing-store call.
pub struct HashFs {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) algo: HashAlgo,
    pub(crate) tree: RwLock<DirTree>,
    name: String,
    remote: String,
}

impl HashFs {
    /// Construct the overlay, loading the persisted root index.
    ///
    /// An absent root index means a fresh store (empty tree); a present but
    /// malformed one refuses to load with [`FsError::BadState`].
    pub fn new(
        ctx: &OpContext,
        name: &str,
        store: Arc<dyn ObjectStore>,
        config: Config,
    ) -> FsResult<Self> {
        config.validate(name)?;
        let algo = config.hash_algo;
        let tree = match store.get(ctx, ROOT_INDEX_KEY) {
            Ok(reader) => DirTree::decode_from(reader, algo)
                .map_err(|e| FsError::bad_state("", e))?,
            Err(e) if e.is_not_found() => DirTree::new(algo),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(
            name = %name,
            remote = %config.remote,
            algo = %algo,
            dirs = tree.len(),
            "loaded directory index"
        );
        Ok(Self {
            store,
            algo,
            tree: RwLock::new(tree),
            name: name.to_string(),
            remote: config.remote,
        })
    }

    /// The name this overlay instance was constructed under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured hash algorithm.
    pub fn algo(&self) -> HashAlgo {
        self.algo
    }

    /// Modification-time precision, straight from the backing store.
    pub fn precision(&self) -> Duration {
        self.store.precision()
    }

    /// Checksum kinds, straight from the backing store.
    pub fn checksum_kinds(&self) -> Vec<ChecksumKind> {
        self.store.checksum_kinds()
    }

    /// Usage and quota information from the backing store.
    pub fn about(&self, ctx: &OpContext) -> FsResult<Usage> {
        if !self.store.capabilities().about {
            return Err(FsError::Unsupported("about"));
        }
        Ok(self.store.about(ctx)?)
    }

    /// Rewrite the persisted root index from the in-memory tree.
    ///
    /// Runs after every structural mutation. A write failure leaves memory
    /// ahead of the store; the gap closes on the next successful rewrite.
    pub(crate) fn persist_index(&self, ctx: &OpContext) -> FsResult<()> {
        let pairs = self.tree.read().unwrap().sorted_pairs();
        let hint = codec::encoded_len(&pairs);
        let mut reader = codec::encode_pairs(pairs);
        self.store
            .put(ctx, ROOT_INDEX_KEY, &mut reader, Some(hint))?;
        Ok(())
    }

    /// Split a file path into its indexed parent, file key and leaf name.
    pub(crate) fn resolve_parent(&self, path: &str) -> FsResult<(DirId, String, String)> {
        let (parent, leaf) = crate::paths::split_parent(path);
        let tree = self.tree.read().unwrap();
        let dir = tree
            .lookup_path(parent)
            .ok_or_else(|| FsError::DirNotFound(parent.to_string()))?;
        Ok((dir, self.algo.hash(leaf), leaf.to_string()))
    }

    pub(crate) fn node_key(&self, id: DirId) -> String {
        self.tree.read().unwrap().node(id).key.clone()
    }

    pub(crate) fn node_path(&self, id: DirId) -> String {
        self.tree.read().unwrap().node(id).path.clone()
    }

    /// Delete a container and its contents, preferring the store's bulk
    /// delete and falling back to list-and-delete when it lacks one.
    pub(crate) fn purge_container(&self, ctx: &OpContext, container: &str) -> FsResult<()> {
        if self.store.capabilities().purge {
            self.store.purge(ctx, container)?;
            return Ok(());
        }
        for entry in self.store.list(ctx, container)? {
            let key = key_join(&[container, &entry.key]);
            match entry.kind {
                EntryKind::Container => self.purge_container(ctx, &key)?,
                EntryKind::Object => self.store.delete(ctx, &key)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for HashFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hashfs ({}) '{}'", self.algo, self.remote)
    }
}
