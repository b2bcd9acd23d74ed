//! The in-memory directory tree index.
//!
//! Nodes live in an arena addressed by opaque [`DirId`]s with explicit
//! parent identifiers; the single-owner tree invariant is enforced through
//! the arena's API. Two secondary indices resolve nodes by logical path and
//! by storage key. The tree always contains the root entry (`""`).

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use crate::codec::{self, DecodeError};
use crate::hashing::HashAlgo;
use crate::paths::split_parent;

/// Opaque identifier of a directory node in the arena.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct DirId(usize);

/// Lazy-load state of a directory's file table.
///
/// The explicit tri-state keeps a transient read error from being cached as
/// a false empty table: `LoadFailed` makes the next access retry.
#[derive(Clone, Debug, Default)]
pub enum FileState {
    /// The file index object has not been read yet.
    #[default]
    NotLoaded,
    /// Mapping from filename to file key.
    Loaded(BTreeMap<String, String>),
    /// The last load attempt failed; retry on next access.
    LoadFailed,
}

impl FileState {
    /// The loaded table, if any.
    pub fn loaded(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            FileState::Loaded(map) => Some(map),
            _ => None,
        }
    }
}

/// One directory node.
#[derive(Debug)]
pub struct DirNode {
    /// Normalized logical path; `""` for the root.
    pub path: String,
    /// Storage key, always `hash(path)`.
    pub key: String,
    /// Parent node; `None` only for the root.
    pub parent: Option<DirId>,
    /// Child directories.
    pub children: Vec<DirId>,
    /// Lazily loaded file table.
    pub files: FileState,
}

/// Arena of directory nodes with path and key lookup.
pub struct DirTree {
    nodes: Vec<Option<DirNode>>,
    free: Vec<usize>,
    by_path: HashMap<String, DirId>,
    by_key: HashMap<String, DirId>,
    root: DirId,
    algo: HashAlgo,
}

impl DirTree {
    /// Empty tree containing only the root entry.
    pub fn new(algo: HashAlgo) -> Self {
        let root_key = algo.hash("");
        let root = DirNode {
            path: String::new(),
            key: root_key.clone(),
            parent: None,
            children: Vec::new(),
            files: FileState::NotLoaded,
        };
        let mut by_path = HashMap::new();
        let mut by_key = HashMap::new();
        by_path.insert(String::new(), DirId(0));
        by_key.insert(root_key, DirId(0));
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            by_path,
            by_key,
            root: DirId(0),
            algo,
        }
    }

    /// Rebuild a tree from a persisted root index.
    ///
    /// Only the logical paths are used; storage keys are recomputed from the
    /// configured algorithm. Ancestors referenced by a path but missing from
    /// the index are created defensively.
    pub fn decode_from<R: Read>(reader: R, algo: HashAlgo) -> Result<Self, DecodeError> {
        let mut tree = Self::new(algo);
        for (_key, path) in codec::decode_pairs(reader)? {
            tree.ensure(&path);
        }
        Ok(tree)
    }

    /// The root node's identifier.
    pub fn root(&self) -> DirId {
        self.root
    }

    /// Number of live directory nodes, root included.
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// True when only the root entry exists.
    pub fn is_empty(&self) -> bool {
        self.by_path.len() == 1
    }

    /// Borrow a node. Panics on a stale identifier; identifiers stay valid
    /// for as long as the node is in the tree.
    pub fn node(&self, id: DirId) -> &DirNode {
        self.nodes[id.0].as_ref().expect("stale directory id")
    }

    /// Mutably borrow a node. Panics on a stale identifier.
    pub fn node_mut(&mut self, id: DirId) -> &mut DirNode {
        self.nodes[id.0].as_mut().expect("stale directory id")
    }

    /// Resolve a node by logical path.
    pub fn lookup_path(&self, path: &str) -> Option<DirId> {
        self.by_path.get(path).copied()
    }

    /// Resolve a node by storage key.
    pub fn lookup_key(&self, key: &str) -> Option<DirId> {
        self.by_key.get(key).copied()
    }

    /// Idempotently index `path`, creating missing ancestors.
    pub fn ensure(&mut self, path: &str) -> DirId {
        if let Some(id) = self.by_path.get(path) {
            return *id;
        }
        let (parent_path, _) = split_parent(path);
        let parent = self.ensure(parent_path);
        let key = self.algo.hash(path);
        let id = self.alloc(DirNode {
            path: path.to_string(),
            key: key.clone(),
            parent: Some(parent),
            children: Vec::new(),
            files: FileState::NotLoaded,
        });
        self.node_mut(parent).children.push(id);
        self.by_path.insert(path.to_string(), id);
        self.by_key.insert(key, id);
        id
    }

    /// Unlink `path` from the tree and both indices.
    ///
    /// No-op if the path is not indexed. The caller has already verified the
    /// node holds no files or children. Panics if asked to remove the root.
    pub fn remove(&mut self, path: &str) {
        let Some(id) = self.lookup_path(path) else {
            return;
        };
        let node = self.nodes[id.0].take().expect("stale directory id");
        let parent = node.parent.expect("cannot remove the root directory");
        self.node_mut(parent).children.retain(|c| *c != id);
        self.by_path.remove(&node.path);
        self.by_key.remove(&node.key);
        self.free.push(id.0);
    }

    /// Snapshot of a node's children, for traversals that mutate the tree.
    pub fn children_of(&self, id: DirId) -> Vec<DirId> {
        self.node(id).children.clone()
    }

    /// Every `(storageKey, logicalPath)` pair, sorted ascending by path.
    /// This is the persisted root-index order.
    pub fn sorted_pairs(&self) -> Vec<(String, String)> {
        let mut paths: Vec<&String> = self.by_path.keys().collect();
        paths.sort();
        paths
            .into_iter()
            .map(|path| {
                let node = self.node(self.by_path[path]);
                (node.key.clone(), node.path.clone())
            })
            .collect()
    }

    fn alloc(&mut self, node: DirNode) -> DirId {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                DirId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                DirId(self.nodes.len() - 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_contains_root() {
        let tree = DirTree::new(HashAlgo::Md5);
        assert_eq!(tree.len(), 1);
        assert!(tree.is_empty());
        let root = tree.node(tree.root());
        assert_eq!(root.path, "");
        assert_eq!(root.key, HashAlgo::Md5.hash(""));
        assert!(root.parent.is_none());
    }

    #[test]
    fn test_ensure_creates_ancestors() {
        let mut tree = DirTree::new(HashAlgo::Md5);
        let id = tree.ensure("a/b/c");
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.node(id).path, "a/b/c");
        assert_eq!(tree.node(id).key, HashAlgo::Md5.hash("a/b/c"));

        let b = tree.lookup_path("a/b").unwrap();
        assert_eq!(tree.node(id).parent, Some(b));
        assert!(tree.node(b).children.contains(&id));

        let a = tree.lookup_path("a").unwrap();
        assert_eq!(tree.node(a).parent, Some(tree.root()));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let mut tree = DirTree::new(HashAlgo::Sha1);
        let first = tree.ensure("a/b");
        let second = tree.ensure("a/b");
        assert_eq!(first, second);
        assert_eq!(tree.len(), 3);
        let parent = tree.lookup_path("a").unwrap();
        assert_eq!(
            tree.node(parent)
                .children
                .iter()
                .filter(|c| **c == first)
                .count(),
            1
        );
    }

    #[test]
    fn test_lookup_by_key() {
        let mut tree = DirTree::new(HashAlgo::Sha256);
        let id = tree.ensure("x/y");
        let key = tree.node(id).key.clone();
        assert_eq!(tree.lookup_key(&key), Some(id));
        assert_eq!(tree.lookup_key("unknown"), None);
    }

    #[test]
    fn test_remove_unlinks() {
        let mut tree = DirTree::new(HashAlgo::Md5);
        let id = tree.ensure("a/b");
        let key = tree.node(id).key.clone();
        let parent = tree.lookup_path("a").unwrap();

        tree.remove("a/b");
        assert_eq!(tree.lookup_path("a/b"), None);
        assert_eq!(tree.lookup_key(&key), None);
        assert!(!tree.node(parent).children.contains(&id));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut tree = DirTree::new(HashAlgo::Md5);
        tree.remove("ghost");
        assert_eq!(tree.len(), 1);
    }

    #[test]
    #[should_panic(expected = "cannot remove the root directory")]
    fn test_remove_root_panics() {
        let mut tree = DirTree::new(HashAlgo::Md5);
        tree.remove("");
    }

    #[test]
    fn test_slot_reuse_after_remove() {
        let mut tree = DirTree::new(HashAlgo::Md5);
        tree.ensure("a");
        tree.remove("a");
        let id = tree.ensure("b");
        assert_eq!(tree.node(id).path, "b");
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_sorted_pairs_order() {
        let mut tree = DirTree::new(HashAlgo::Identity);
        tree.ensure("b");
        tree.ensure("a/z");
        tree.ensure("a");
        let pairs = tree.sorted_pairs();
        let paths: Vec<&str> = pairs.iter().map(|(_, p)| p.as_str()).collect();
        assert_eq!(paths, vec!["", "a", "a/z", "b"]);
        for (key, path) in &pairs {
            assert_eq!(key, path);
        }
    }

    #[test]
    fn test_decode_recomputes_keys_and_fills_ancestors() {
        // Index mentions a deep path without its ancestors; stored keys are
        // ignored in favor of the configured algorithm.
        let input = "bogus a/b/c\n";
        let tree = DirTree::decode_from(input.as_bytes(), HashAlgo::Md5).unwrap();
        assert_eq!(tree.len(), 4);
        let id = tree.lookup_path("a/b/c").unwrap();
        assert_eq!(tree.node(id).key, HashAlgo::Md5.hash("a/b/c"));
        assert!(tree.lookup_path("a").is_some());
        assert!(tree.lookup_path("a/b").is_some());
    }

    #[test]
    fn test_decode_malformed_refused() {
        assert!(DirTree::decode_from("nospace\n".as_bytes(), HashAlgo::Md5).is_err());
    }

    #[test]
    fn test_roundtrip_through_codec() {
        let mut tree = DirTree::new(HashAlgo::Md5);
        tree.ensure("a/b");
        tree.ensure("c");
        let mut encoded = Vec::new();
        crate::codec::encode_pairs(tree.sorted_pairs())
            .read_to_end(&mut encoded)
            .unwrap();

        let reloaded = DirTree::decode_from(encoded.as_slice(), HashAlgo::Md5).unwrap();
        assert_eq!(reloaded.sorted_pairs(), tree.sorted_pairs());
    }
}
