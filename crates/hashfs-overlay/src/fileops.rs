//! File operations: Put, Copy, Remove, stat/open/update and passthroughs.
//!
//! A file is a composite of three store objects under
//! `<dirKey>/<fileKey>/`: the `name` record carrying the full logical path,
//! the raw `data` payload, and an entry in the owning directory's file
//! table. Put writes all three; Remove purges the sub-container and the
//! table entry.

use std::io::Read;
use std::time::SystemTime;

use hashfs_store::{ChecksumKind, ObjectMeta, OpContext};

use crate::error::{FsError, FsResult};
use crate::overlay::{HashFs, DATA_LEAF, NAME_LEAF};
use crate::paths::{key_join, normalize, validate_name};

/// A resolved file: logical path plus its storage location and metadata.
#[derive(Clone, Debug)]
pub struct FileHandle {
    path: String,
    base_key: String,
    size: u64,
    mod_time: SystemTime,
}

impl FileHandle {
    pub(crate) fn new(path: impl Into<String>, base_key: impl Into<String>, meta: &ObjectMeta) -> Self {
        Self {
            path: path.into(),
            base_key: base_key.into(),
            size: meta.size,
            mod_time: meta.mod_time,
        }
    }

    /// Full logical path of the file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Payload modification time.
    pub fn mod_time(&self) -> SystemTime {
        self.mod_time
    }

    /// Storage key of the file's sub-container (`<dirKey>/<fileKey>`).
    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    pub(crate) fn data_key(&self) -> String {
        key_join(&[&self.base_key, DATA_LEAF])
    }
}

impl HashFs {
    /// Write a file. The parent directory must be indexed.
    ///
    /// `size_hint` is the payload size when known; `None` streams with
    /// unknown length. Writes the name record and payload, then records the
    /// file in the owning directory's persisted file table.
    pub fn put(
        &self,
        ctx: &OpContext,
        path: &str,
        data: &mut dyn Read,
        size_hint: Option<u64>,
    ) -> FsResult<FileHandle> {
        let path = normalize(path);
        validate_name(&path)?;
        let (dir, file_key, leaf) = self.resolve_parent(&path)?;
        let dir_key = self.node_key(dir);
        self.prepare_dest(ctx, &path, &dir_key, &file_key)?;

        let data_key = key_join(&[&dir_key, &file_key, DATA_LEAF]);
        let meta = self.store.put(ctx, &data_key, data, size_hint)?;

        let mut files = self.load_files(ctx, dir)?;
        files.insert(leaf, file_key.clone());
        let handle = FileHandle::new(&path, key_join(&[&dir_key, &file_key]), &meta);
        self.commit_files(ctx, dir, files)?;
        tracing::debug!(file = %path, key = %data_key, size = meta.size, "put");
        Ok(handle)
    }

    /// Server-side copy of `src` to `dst`. The source is untouched.
    pub fn copy(&self, ctx: &OpContext, src: &str, dst: &str) -> FsResult<FileHandle> {
        if !self.store.capabilities().server_copy {
            return Err(FsError::Unsupported("server-side copy"));
        }
        let dst = normalize(dst);
        validate_name(&dst)?;
        let src_handle = self.stat(ctx, src)?;
        let (dir, file_key, leaf) = self.resolve_parent(&dst)?;
        let dir_key = self.node_key(dir);
        self.prepare_dest(ctx, &dst, &dir_key, &file_key)?;

        let mut files = self.load_files(ctx, dir)?;
        files.insert(leaf, file_key.clone());
        self.commit_files(ctx, dir, files)?;

        let dst_data = key_join(&[&dir_key, &file_key, DATA_LEAF]);
        let meta = self
            .store
            .server_copy(ctx, &src_handle.data_key(), &dst_data)?;
        Ok(FileHandle::new(&dst, key_join(&[&dir_key, &file_key]), &meta))
    }

    /// Delete a file: purge its `<dirKey>/<fileKey>` sub-container (name
    /// record and payload) and drop it from the directory's file table.
    pub fn remove(&self, ctx: &OpContext, path: &str) -> FsResult<()> {
        let path = normalize(path);
        let (dir, file_key, leaf) = self.resolve_parent(&path)?;
        let dir_path = self.node_path(dir);
        let mut files = self.load_files_strict(ctx, dir, &dir_path)?;
        if !files.contains_key(&leaf) {
            return Err(FsError::ObjectNotFound(path));
        }
        let dir_key = self.node_key(dir);
        let base = key_join(&[&dir_key, &file_key]);
        match self.purge_container(ctx, &base) {
            Err(FsError::Store(e)) if e.is_not_found() => {}
            Err(e) => return Err(e),
            Ok(()) => {}
        }
        files.remove(&leaf);
        tracing::debug!(file = %path, "removed file");
        self.commit_files(ctx, dir, files)
    }

    /// Resolve a logical path to a file handle.
    ///
    /// Returns [`FsError::IsDirectory`] for an indexed directory path and
    /// [`FsError::ObjectNotFound`] for anything else that is not a known
    /// file.
    pub fn stat(&self, ctx: &OpContext, path: &str) -> FsResult<FileHandle> {
        let path = normalize(path);
        if self.tree.read().unwrap().lookup_path(&path).is_some() {
            return Err(FsError::IsDirectory(path));
        }
        let (dir, file_key, leaf) = match self.resolve_parent(&path) {
            Ok(resolved) => resolved,
            Err(FsError::DirNotFound(_)) => return Err(FsError::ObjectNotFound(path)),
            Err(e) => return Err(e),
        };
        let files = self.load_files(ctx, dir)?;
        if !files.contains_key(&leaf) {
            return Err(FsError::ObjectNotFound(path));
        }
        let dir_key = self.node_key(dir);
        let base = key_join(&[&dir_key, &file_key]);
        let meta = self.store.stat(ctx, &key_join(&[&base, DATA_LEAF]))?;
        Ok(FileHandle::new(&path, base, &meta))
    }

    /// Open a file's payload for reading.
    pub fn open(&self, ctx: &OpContext, path: &str) -> FsResult<Box<dyn Read + Send>> {
        let handle = self.stat(ctx, path)?;
        Ok(self.store.get(ctx, &handle.data_key())?)
    }

    /// Rewrite an existing file's payload in place.
    pub fn update(
        &self,
        ctx: &OpContext,
        path: &str,
        data: &mut dyn Read,
        size_hint: Option<u64>,
    ) -> FsResult<FileHandle> {
        let handle = self.stat(ctx, path)?;
        let meta = self.store.put(ctx, &handle.data_key(), data, size_hint)?;
        Ok(FileHandle::new(handle.path(), handle.base_key(), &meta))
    }

    /// Set a file's modification time on the backing store.
    pub fn set_mod_time(&self, ctx: &OpContext, path: &str, mod_time: SystemTime) -> FsResult<()> {
        let handle = self.stat(ctx, path)?;
        Ok(self.store.set_mod_time(ctx, &handle.data_key(), mod_time)?)
    }

    /// Checksum of a file's payload, passed through from the backing store.
    pub fn checksum(
        &self,
        ctx: &OpContext,
        path: &str,
        kind: ChecksumKind,
    ) -> FsResult<Option<String>> {
        let handle = self.stat(ctx, path)?;
        Ok(self.store.checksum(ctx, &handle.data_key(), kind)?)
    }

    /// MIME type of a file's payload, passed through from the backing store.
    pub fn mime_type(&self, ctx: &OpContext, path: &str) -> FsResult<Option<String>> {
        let handle = self.stat(ctx, path)?;
        Ok(self.store.mime_type(ctx, &handle.data_key())?)
    }

    /// Create the directory structure for a file: the directory container,
    /// the file's sub-container and its name record. Does not create the
    /// payload object.
    fn prepare_dest(
        &self,
        ctx: &OpContext,
        logical: &str,
        dir_key: &str,
        file_key: &str,
    ) -> FsResult<()> {
        if !dir_key.is_empty() {
            self.store.make_container(ctx, dir_key)?;
        }
        self.store
            .make_container(ctx, &key_join(&[dir_key, file_key]))?;
        let record = format!("{logical}\n");
        self.store.put(
            ctx,
            &key_join(&[dir_key, file_key, NAME_LEAF]),
            &mut record.as_bytes(),
            Some(record.len() as u64),
        )?;
        Ok(())
    }
}
