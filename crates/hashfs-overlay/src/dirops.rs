//! Directory mutation algorithms: Mkdir, Rmdir, Purge, DirMove.
//!
//! Every structural mutation ends with a rewrite of the persisted root
//! index. The recursive operations run as plain depth-bounded recursion
//! with sequential fan-out; Purge and DirMove stop at the first error but
//! still persist whatever succeeded before it.

use hashfs_store::OpContext;

use crate::error::{FsError, FsResult};
use crate::overlay::{HashFs, NAME_LEAF};
use crate::paths::{self, key_join, normalize, validate_name};
use crate::tree::DirId;

impl HashFs {
    /// Create a directory. Succeeds without touching anything if the path
    /// is already indexed.
    pub fn mkdir(&self, ctx: &OpContext, dir: &str) -> FsResult<()> {
        let dir = normalize(dir);
        if self.tree.read().unwrap().lookup_path(&dir).is_some() {
            return Ok(());
        }
        validate_name(&dir)?;
        let key = {
            let mut tree = self.tree.write().unwrap();
            let id = tree.ensure(&dir);
            tree.node(id).key.clone()
        };
        if self.store.capabilities().empty_containers {
            self.store.make_container(ctx, &key)?;
        }
        tracing::debug!(dir = %dir, key = %key, "mkdir");
        self.persist_index(ctx)
    }

    /// Remove an empty directory.
    ///
    /// Fails [`FsError::DirNotEmpty`] if any file or child directory exists,
    /// and [`FsError::BadState`] if the file index cannot be loaded (never
    /// silently treated as empty). Deleting the backing container tolerates
    /// `NotFound`: already absent counts as success.
    pub fn rmdir(&self, ctx: &OpContext, dir: &str) -> FsResult<()> {
        let dir = normalize(dir);
        let id = self
            .tree
            .read()
            .unwrap()
            .lookup_path(&dir)
            .ok_or_else(|| FsError::DirNotFound(dir.clone()))?;
        let files = self.load_files_strict(ctx, id, &dir)?;
        let (key, has_children) = {
            let tree = self.tree.read().unwrap();
            let node = tree.node(id);
            (node.key.clone(), !node.children.is_empty())
        };
        if !files.is_empty() || has_children {
            return Err(FsError::DirNotEmpty(dir));
        }
        self.tree.write().unwrap().remove(&dir);
        self.persist_index(ctx)?;
        tracing::debug!(dir = %dir, "rmdir");
        match self.purge_container(ctx, &key) {
            Err(FsError::Store(e)) if e.is_not_found() => Ok(()),
            result => result,
        }
    }

    /// Recursively delete a directory and everything beneath it.
    ///
    /// Requires the store's bulk delete. Children are purged before their
    /// parent; the first error stops the recursion, but the root index is
    /// rewritten regardless so the surviving state is persisted.
    pub fn purge(&self, ctx: &OpContext, dir: &str) -> FsResult<()> {
        if !self.store.capabilities().purge {
            return Err(FsError::Unsupported("purge"));
        }
        let dir = normalize(dir);
        let id = self
            .tree
            .read()
            .unwrap()
            .lookup_path(&dir)
            .ok_or_else(|| FsError::DirNotFound(dir.clone()))?;
        let result = self.purge_node(ctx, id);
        self.persist_index(ctx)?;
        result
    }

    fn purge_node(&self, ctx: &OpContext, id: DirId) -> FsResult<()> {
        // Snapshot the children; the recursion unlinks nodes as it goes.
        let children = self.tree.read().unwrap().children_of(id);
        for child in children {
            self.purge_node(ctx, child)?;
        }
        let (path, key, is_root) = {
            let tree = self.tree.read().unwrap();
            let node = tree.node(id);
            (node.path.clone(), node.key.clone(), node.parent.is_none())
        };
        match self.store.purge(ctx, &key) {
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
            Ok(()) => {}
        }
        // The root entry itself stays in the tree; only its contents go.
        if !is_root {
            self.tree.write().unwrap().remove(&path);
        }
        tracing::debug!(dir = %path, "purged directory");
        Ok(())
    }

    /// Move a directory tree from `src` to `dst`.
    ///
    /// Requires the store's server-side move. The recursion visits children
    /// before their parent so no intermediate state references a relocated
    /// but not-yet-existing parent; each level rewrites the name records of
    /// its own direct files. The root index is rewritten at the end
    /// regardless of partial failure.
    pub fn dir_move(&self, ctx: &OpContext, src: &str, dst: &str) -> FsResult<()> {
        if !self.store.capabilities().server_move {
            return Err(FsError::Unsupported("server-side move"));
        }
        let src = normalize(src);
        let dst = normalize(dst);
        if self.tree.read().unwrap().lookup_path(&dst).is_some() {
            return Err(FsError::DirExists(dst));
        }
        let src_id = self
            .tree
            .read()
            .unwrap()
            .lookup_path(&src)
            .ok_or_else(|| FsError::DirNotFound(src.clone()))?;
        let result = self.move_node(ctx, src_id, &src, &dst);
        self.persist_index(ctx)?;
        result
    }

    fn move_node(
        &self,
        ctx: &OpContext,
        id: DirId,
        src_root: &str,
        dst_root: &str,
    ) -> FsResult<()> {
        let children = self.tree.read().unwrap().children_of(id);
        for child in children {
            self.move_node(ctx, child, src_root, dst_root)?;
        }
        let (path, key) = {
            let tree = self.tree.read().unwrap();
            let node = tree.node(id);
            (node.path.clone(), node.key.clone())
        };
        let relative = path
            .strip_prefix(src_root)
            .unwrap_or(path.as_str())
            .trim_start_matches('/');
        let dst_path = paths::join(dst_root, relative);
        let dst_key = self.algo.hash(&dst_path);
        // A directory known to the index but never materialized in the
        // store has nothing to move; already-absent counts as success.
        match self.store.server_move(ctx, &key, &dst_key) {
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
            Ok(()) => {}
        }
        {
            let mut tree = self.tree.write().unwrap();
            tree.ensure(&dst_path);
            tree.remove(&path);
        }
        tracing::debug!(src = %path, dst = %dst_path, "moved directory");
        self.rewrite_name_records(ctx, &dst_path)
    }

    /// Rewrite the name records of the directory's own files to point at
    /// their new logical location. Not recursive; each moved level handles
    /// only its direct files.
    fn rewrite_name_records(&self, ctx: &OpContext, dir_path: &str) -> FsResult<()> {
        let id = self
            .tree
            .read()
            .unwrap()
            .lookup_path(dir_path)
            .expect("destination directory was just indexed");
        let files = self.load_files_strict(ctx, id, dir_path)?;
        let dir_key = self.node_key(id);
        for (name, file_key) in &files {
            let name_key = key_join(&[&dir_key, file_key, NAME_LEAF]);
            self.store.delete(ctx, &name_key)?;
            let full = paths::join(dir_path, name);
            let record = format!("{full}\n");
            self.store
                .put(ctx, &name_key, &mut record.as_bytes(), Some(record.len() as u64))?;
        }
        Ok(())
    }
}
