//! The listing engine.
//!
//! A single-level listing merges three sources: the tree index's children,
//! the backing store's raw top-level listing (for live container metadata),
//! and the directory's file table. Children with no matching container in
//! the store are still surfaced — the index knows them even if they were
//! never materialized — with size -1 and the current time. A per-file
//! resolution failure is logged and skipped; it never aborts the listing.

use std::collections::HashMap;
use std::time::SystemTime;

use hashfs_store::{EntryKind, OpContext, StoreEntry};

use crate::error::{FsError, FsResult};
use crate::fileops::FileHandle;
use crate::overlay::{HashFs, DATA_LEAF};
use crate::paths::{self, key_join, normalize};
use crate::tree::DirId;

/// A directory entry in a listing.
#[derive(Clone, Debug)]
pub struct DirInfo {
    /// Logical path of the directory.
    pub path: String,
    /// Size reported by the backing store; -1 when unknown.
    pub size: i64,
    /// Modification time from the backing store, or the listing time when
    /// the directory has no materialized container.
    pub mod_time: SystemTime,
    /// Number of known entries: child directories plus cached file-table
    /// entries. Loading every file table just for this count would be
    /// expensive, so unloaded tables count zero.
    pub items: i64,
}

/// One entry of a directory listing.
#[derive(Clone, Debug)]
pub enum ListEntry {
    /// A child directory.
    Dir(DirInfo),
    /// A file.
    File(FileHandle),
}

impl ListEntry {
    /// Logical path of the entry.
    pub fn path(&self) -> &str {
        match self {
            ListEntry::Dir(info) => &info.path,
            ListEntry::File(handle) => handle.path(),
        }
    }

    /// True for directory entries.
    pub fn is_dir(&self) -> bool {
        matches!(self, ListEntry::Dir(_))
    }
}

impl HashFs {
    /// List a directory, single level: child directories then files.
    pub fn list(&self, ctx: &OpContext, dir: &str) -> FsResult<Vec<ListEntry>> {
        let dir = normalize(dir);
        let id = self
            .tree
            .read()
            .unwrap()
            .lookup_path(&dir)
            .ok_or_else(|| FsError::DirNotFound(dir.clone()))?;
        self.list_dir(ctx, id)
    }

    /// Recursively list `dir`, streaming one tranche per directory to
    /// `consumer`, parent before children, depth-first.
    ///
    /// The first error from the consumer or from any directory load aborts
    /// the whole traversal.
    pub fn list_recursive(
        &self,
        ctx: &OpContext,
        dir: &str,
        consumer: &mut dyn FnMut(Vec<ListEntry>) -> FsResult<()>,
    ) -> FsResult<()> {
        let dir = normalize(dir);
        let id = self
            .tree
            .read()
            .unwrap()
            .lookup_path(&dir)
            .ok_or_else(|| FsError::DirNotFound(dir.clone()))?;
        self.walk(ctx, id, consumer)
    }

    fn walk(
        &self,
        ctx: &OpContext,
        id: DirId,
        consumer: &mut dyn FnMut(Vec<ListEntry>) -> FsResult<()>,
    ) -> FsResult<()> {
        let entries = self.list_dir(ctx, id)?;
        consumer(entries)?;
        let children = self.tree.read().unwrap().children_of(id);
        for child in children {
            self.walk(ctx, child, consumer)?;
        }
        Ok(())
    }

    fn list_dir(&self, ctx: &OpContext, id: DirId) -> FsResult<Vec<ListEntry>> {
        struct Child {
            path: String,
            key: String,
            items: i64,
        }
        let (dir_path, dir_key, children) = {
            let tree = self.tree.read().unwrap();
            let node = tree.node(id);
            let children: Vec<Child> = node
                .children
                .iter()
                .map(|&cid| {
                    let child = tree.node(cid);
                    let cached_files =
                        child.files.loaded().map_or(0, |m| m.len());
                    Child {
                        path: child.path.clone(),
                        key: child.key.clone(),
                        items: (child.children.len() + cached_files) as i64,
                    }
                })
                .collect();
            (node.path.clone(), node.key.clone(), children)
        };
        let files = self.load_files(ctx, id)?;

        let mut entries = Vec::with_capacity(children.len() + files.len());
        if !children.is_empty() {
            let raw = self.store.list(ctx, "")?;
            let mut containers: HashMap<String, StoreEntry> = raw
                .into_iter()
                .filter(|e| e.kind == EntryKind::Container)
                .map(|e| (e.key.clone(), e))
                .collect();
            for child in children {
                match containers.remove(&child.key) {
                    Some(live) => entries.push(ListEntry::Dir(DirInfo {
                        path: child.path,
                        size: live.size,
                        mod_time: live.mod_time,
                        items: child.items,
                    })),
                    // Known from the index, not yet materialized in the
                    // store. Surface it anyway.
                    None => entries.push(ListEntry::Dir(DirInfo {
                        path: child.path,
                        size: -1,
                        mod_time: SystemTime::now(),
                        items: child.items,
                    })),
                }
            }
        }

        for (name, file_key) in &files {
            let full = paths::join(&dir_path, name);
            let base = key_join(&[&dir_key, file_key]);
            match self.store.stat(ctx, &key_join(&[&base, DATA_LEAF])) {
                Ok(meta) => entries.push(ListEntry::File(FileHandle::new(&full, base, &meta))),
                Err(err) => {
                    tracing::warn!(file = %full, error = %err, "error fetching file entry, skipping");
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hashing::HashAlgo;
    use hashfs_store::{MemoryStore, ObjectStore};
    use std::sync::Arc;

    fn identity_fs() -> (Arc<MemoryStore>, HashFs, OpContext) {
        let store = Arc::new(MemoryStore::new());
        let ctx = OpContext::background();
        let fs = HashFs::new(
            &ctx,
            "overlay",
            store.clone(),
            Config::with_algo("backing", HashAlgo::Identity),
        )
        .unwrap();
        (store, fs, ctx)
    }

    fn names(entries: &[ListEntry]) -> Vec<String> {
        entries.iter().map(|e| e.path().to_string()).collect()
    }

    #[test]
    fn test_list_missing_dir() {
        let (_store, fs, ctx) = identity_fs();
        assert!(matches!(
            fs.list(&ctx, "ghost"),
            Err(FsError::DirNotFound(_))
        ));
    }

    #[test]
    fn test_list_merges_dirs_and_files() {
        let (_store, fs, ctx) = identity_fs();
        fs.mkdir(&ctx, "d/sub").unwrap();
        fs.put(&ctx, "d/file", &mut "xy".as_bytes(), Some(2)).unwrap();

        let entries = fs.list(&ctx, "d").unwrap();
        assert_eq!(names(&entries), vec!["d/sub", "d/file"]);
        match &entries[1] {
            ListEntry::File(handle) => assert_eq!(handle.size(), 2),
            other => panic!("expected file entry, got {:?}", other),
        }
    }

    #[test]
    fn test_list_attaches_live_container_metadata() {
        let (_store, fs, ctx) = identity_fs();
        fs.mkdir(&ctx, "materialized").unwrap();

        let entries = fs.list(&ctx, "").unwrap();
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            // MemoryStore reports containers with unknown size; what matters
            // is the entry carries the store's answer, not a placeholder.
            ListEntry::Dir(info) => {
                assert_eq!(info.path, "materialized");
                assert_eq!(info.size, -1);
            }
            other => panic!("expected dir entry, got {:?}", other),
        }
    }

    #[test]
    fn test_list_surfaces_unmaterialized_children() {
        let mut caps = hashfs_store::Capabilities::full();
        caps.empty_containers = false;
        let store = Arc::new(MemoryStore::with_capabilities(caps));
        let ctx = OpContext::background();
        let fs = HashFs::new(
            &ctx,
            "overlay",
            store,
            Config::with_algo("backing", HashAlgo::Identity),
        )
        .unwrap();
        // Indexed but never materialized: no container in the store.
        fs.mkdir(&ctx, "phantom").unwrap();

        let entries = fs.list(&ctx, "").unwrap();
        assert_eq!(names(&entries), vec!["phantom"]);
        match &entries[0] {
            ListEntry::Dir(info) => assert_eq!(info.size, -1),
            other => panic!("expected dir entry, got {:?}", other),
        }
    }

    #[test]
    fn test_list_skips_broken_file_entry() {
        let (store, fs, ctx) = identity_fs();
        fs.mkdir(&ctx, "d").unwrap();
        fs.put(&ctx, "d/good", &mut "ok".as_bytes(), Some(2)).unwrap();
        // A file-table entry whose data object is gone.
        store
            .put(&ctx, "d/map", &mut "gone gone\ngood good\n".as_bytes(), None)
            .unwrap();
        let fs = HashFs::new(
            &ctx,
            "overlay",
            store.clone(),
            Config::with_algo("backing", HashAlgo::Identity),
        )
        .unwrap();

        let entries = fs.list(&ctx, "d").unwrap();
        assert_eq!(names(&entries), vec!["d/good"]);
    }

    #[test]
    fn test_list_counts_items() {
        let (_store, fs, ctx) = identity_fs();
        fs.mkdir(&ctx, "d/sub").unwrap();
        fs.put(&ctx, "d/sub/f", &mut "x".as_bytes(), Some(1)).unwrap();

        // The put above loaded d/sub's file table, so the count is cached.
        let entries = fs.list(&ctx, "d").unwrap();
        match &entries[0] {
            ListEntry::Dir(info) => assert_eq!(info.items, 1),
            other => panic!("expected dir entry, got {:?}", other),
        }
    }

    #[test]
    fn test_list_recursive_streams_parent_before_children() {
        let (_store, fs, ctx) = identity_fs();
        fs.mkdir(&ctx, "a/b").unwrap();
        fs.mkdir(&ctx, "a/c").unwrap();
        fs.put(&ctx, "a/b/f", &mut "x".as_bytes(), Some(1)).unwrap();

        let mut tranches: Vec<Vec<String>> = Vec::new();
        fs.list_recursive(&ctx, "", &mut |entries| {
            tranches.push(names(&entries));
            Ok(())
        })
        .unwrap();

        assert_eq!(tranches.len(), 4); // root, a, a/b, a/c
        assert_eq!(tranches[0], vec!["a"]);
        assert_eq!(tranches[1], vec!["a/b", "a/c"]);
        assert_eq!(tranches[2], vec!["a/b/f"]);
        assert!(tranches[3].is_empty());
    }

    #[test]
    fn test_list_recursive_consumer_error_aborts() {
        let (_store, fs, ctx) = identity_fs();
        fs.mkdir(&ctx, "a/b").unwrap();

        let mut calls = 0;
        let result = fs.list_recursive(&ctx, "", &mut |_entries| {
            calls += 1;
            Err(FsError::Config("stop".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_list_recursive_missing_dir() {
        let (_store, fs, ctx) = identity_fs();
        let result = fs.list_recursive(&ctx, "nope", &mut |_| Ok(()));
        assert!(matches!(result, Err(FsError::DirNotFound(_))));
    }
}
