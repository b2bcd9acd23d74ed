//! Lazy per-directory file tables.
//!
//! Each directory's `filename -> fileKey` table is loaded on first access
//! from the `<dirKey>/map` object. An absent object means the directory is
//! empty and not yet materialized (a successful, empty load); any other
//! read or decode failure marks the table `LoadFailed` so the next access
//! retries instead of caching a false empty.

use std::collections::BTreeMap;

use hashfs_store::OpContext;

use crate::codec;
use crate::error::{FsError, FsResult};
use crate::overlay::{HashFs, FILE_INDEX_LEAF};
use crate::paths::key_join;
use crate::tree::{DirId, FileState};

impl HashFs {
    /// The directory's file table, loading it on first access.
    ///
    /// Returns a snapshot; mutations go back through [`Self::commit_files`].
    pub(crate) fn load_files(
        &self,
        ctx: &OpContext,
        dir: DirId,
    ) -> FsResult<BTreeMap<String, String>> {
        let (dir_key, dir_path) = {
            let tree = self.tree.read().unwrap();
            let node = tree.node(dir);
            if let FileState::Loaded(map) = &node.files {
                return Ok(map.clone());
            }
            (node.key.clone(), node.path.clone())
        };

        let index_key = key_join(&[&dir_key, FILE_INDEX_LEAF]);
        let loaded: FsResult<BTreeMap<String, String>> = match self.store.get(ctx, &index_key) {
            Ok(reader) => codec::decode_pairs(reader)
                .map(|pairs| pairs.into_iter().map(|(key, name)| (name, key)).collect())
                .map_err(|e| FsError::bad_state(&dir_path, e)),
            Err(e) if e.is_not_found() => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        };

        let mut tree = self.tree.write().unwrap();
        match loaded {
            Ok(map) => {
                tree.node_mut(dir).files = FileState::Loaded(map.clone());
                Ok(map)
            }
            Err(err) => {
                tree.node_mut(dir).files = FileState::LoadFailed;
                tracing::debug!(dir = %dir_path, error = %err, "file index load failed");
                Err(err)
            }
        }
    }

    /// Like [`Self::load_files`] but wraps failures as [`FsError::BadState`]
    /// for callers that refuse to mutate on an unreadable index.
    pub(crate) fn load_files_strict(
        &self,
        ctx: &OpContext,
        dir: DirId,
        dir_path: &str,
    ) -> FsResult<BTreeMap<String, String>> {
        self.load_files(ctx, dir).map_err(|e| match e {
            FsError::BadState { .. } => e,
            other => FsError::bad_state(dir_path, other),
        })
    }

    /// Install `map` as the directory's file table and rewrite the
    /// persisted `<dirKey>/map` object, sorted ascending by filename.
    pub(crate) fn commit_files(
        &self,
        ctx: &OpContext,
        dir: DirId,
        map: BTreeMap<String, String>,
    ) -> FsResult<()> {
        let index_key = {
            let mut tree = self.tree.write().unwrap();
            let node = tree.node_mut(dir);
            node.files = FileState::Loaded(map.clone());
            key_join(&[&node.key, FILE_INDEX_LEAF])
        };
        // BTreeMap iterates sorted by filename, the persisted order.
        let pairs: Vec<(String, String)> = map
            .into_iter()
            .map(|(name, key)| (key, name))
            .collect();
        let hint = codec::encoded_len(&pairs);
        let mut reader = codec::encode_pairs(pairs);
        self.store.put(ctx, &index_key, &mut reader, Some(hint))?;
        Ok(())
    }
}
