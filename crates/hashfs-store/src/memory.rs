//! In-memory reference implementation of [`ObjectStore`].
//!
//! Used by the overlay's test suites. Capability toggles let tests exercise
//! the `Unsupported` paths, and per-key read-fault injection drives the
//! index retry behavior. Change callbacks fire synchronously on mutation;
//! the poll interval is ignored.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::sync::RwLock;
use std::time::{Duration, SystemTime};

use crate::context::OpContext;
use crate::error::{StoreError, StoreResult};
use crate::store::{
    Capabilities, ChangeCallback, ChangeKind, ChecksumKind, EntryKind, ObjectMeta, ObjectStore,
    StoreEntry, Usage,
};

/// Operation counters for assertions in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryStoreStats {
    /// Number of get operations.
    pub gets: u64,
    /// Number of put operations.
    pub puts: u64,
    /// Number of delete operations.
    pub deletes: u64,
    /// Number of list operations.
    pub lists: u64,
    /// Number of purge operations.
    pub purges: u64,
    /// Number of server-side moves.
    pub moves: u64,
    /// Number of server-side copies.
    pub copies: u64,
}

struct StoredObject {
    data: Vec<u8>,
    mod_time: SystemTime,
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, StoredObject>,
    containers: BTreeMap<String, SystemTime>,
    read_faults: HashMap<String, u32>,
    stats: MemoryStoreStats,
}

/// In-memory [`ObjectStore`] backed by a `BTreeMap`. Thread-safe via `RwLock`.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    subscribers: RwLock<Vec<ChangeCallback>>,
    caps: Capabilities,
}

impl MemoryStore {
    /// Store with every capability enabled.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::full())
    }

    /// Store advertising exactly `caps`; disabled primitives fail `Unsupported`.
    pub fn with_capabilities(caps: Capabilities) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            subscribers: RwLock::new(Vec::new()),
            caps,
        }
    }

    /// Make the next `times` reads of `key` fail with a backend error.
    pub fn inject_read_fault(&self, key: &str, times: u32) {
        let mut inner = self.inner.write().unwrap();
        inner.read_faults.insert(key.to_string(), times);
    }

    /// Snapshot of the operation counters.
    pub fn stats(&self) -> MemoryStoreStats {
        self.inner.read().unwrap().stats
    }

    /// Every object key currently stored, sorted. Test introspection.
    pub fn raw_keys(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        inner.objects.keys().cloned().collect()
    }

    fn notify(&self, events: Vec<(String, ChangeKind)>) {
        if events.is_empty() {
            return;
        }
        let subscribers = self.subscribers.read().unwrap();
        for (key, kind) in &events {
            for callback in subscribers.iter() {
                callback(key, *kind);
            }
        }
    }

    fn container_exists(inner: &Inner, container: &str) -> bool {
        if container.is_empty() || inner.containers.contains_key(container) {
            return true;
        }
        let prefix = format!("{}/", container);
        inner.objects.range(prefix.clone()..).next().is_some_and(|(k, _)| k.starts_with(&prefix))
            || inner
                .containers
                .range(prefix.clone()..)
                .next()
                .is_some_and(|(k, _)| k.starts_with(&prefix))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn precision(&self) -> Duration {
        Duration::from_nanos(1)
    }

    fn checksum_kinds(&self) -> Vec<ChecksumKind> {
        Vec::new()
    }

    fn get(&self, ctx: &OpContext, key: &str) -> StoreResult<Box<dyn Read + Send>> {
        ctx.check()?;
        let mut inner = self.inner.write().unwrap();
        inner.stats.gets += 1;
        if let Some(remaining) = inner.read_faults.get_mut(key) {
            if *remaining > 0 {
                *remaining -= 1;
                tracing::debug!(key = %key, "injected read fault");
                return Err(StoreError::Backend(format!("injected read fault: {key}")));
            }
        }
        match inner.objects.get(key) {
            Some(obj) => Ok(Box::new(Cursor::new(obj.data.clone()))),
            None => Err(StoreError::not_found(key)),
        }
    }

    fn stat(&self, ctx: &OpContext, key: &str) -> StoreResult<ObjectMeta> {
        ctx.check()?;
        let inner = self.inner.read().unwrap();
        match inner.objects.get(key) {
            Some(obj) => Ok(ObjectMeta {
                key: key.to_string(),
                size: obj.data.len() as u64,
                mod_time: obj.mod_time,
            }),
            None => Err(StoreError::not_found(key)),
        }
    }

    fn put(
        &self,
        ctx: &OpContext,
        key: &str,
        data: &mut dyn Read,
        _size_hint: Option<u64>,
    ) -> StoreResult<ObjectMeta> {
        ctx.check()?;
        let mut buf = Vec::new();
        data.read_to_end(&mut buf)?;
        let mod_time = SystemTime::now();
        let size = buf.len() as u64;
        {
            let mut inner = self.inner.write().unwrap();
            inner.stats.puts += 1;
            inner.objects.insert(
                key.to_string(),
                StoredObject {
                    data: buf,
                    mod_time,
                },
            );
        }
        self.notify(vec![(key.to_string(), ChangeKind::Object)]);
        Ok(ObjectMeta {
            key: key.to_string(),
            size,
            mod_time,
        })
    }

    fn delete(&self, ctx: &OpContext, key: &str) -> StoreResult<()> {
        ctx.check()?;
        {
            let mut inner = self.inner.write().unwrap();
            inner.stats.deletes += 1;
            if inner.objects.remove(key).is_none() {
                return Err(StoreError::not_found(key));
            }
        }
        self.notify(vec![(key.to_string(), ChangeKind::Object)]);
        Ok(())
    }

    fn make_container(&self, ctx: &OpContext, key: &str) -> StoreResult<()> {
        ctx.check()?;
        let mut inner = self.inner.write().unwrap();
        inner
            .containers
            .entry(key.to_string())
            .or_insert_with(SystemTime::now);
        Ok(())
    }

    fn list(&self, ctx: &OpContext, container: &str) -> StoreResult<Vec<StoreEntry>> {
        ctx.check()?;
        let mut inner = self.inner.write().unwrap();
        inner.stats.lists += 1;
        if !Self::container_exists(&inner, container) {
            return Err(StoreError::not_found(container));
        }

        let prefix = if container.is_empty() {
            String::new()
        } else {
            format!("{}/", container)
        };
        // name -> (kind, size, mod_time); sub-containers win over same-named objects.
        let mut seen: BTreeMap<String, (EntryKind, i64, SystemTime)> = BTreeMap::new();
        for (key, obj) in inner.objects.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            let rest = &key[prefix.len()..];
            match rest.split_once('/') {
                Some((first, _)) => {
                    let entry = seen
                        .entry(first.to_string())
                        .or_insert((EntryKind::Container, -1, obj.mod_time));
                    entry.0 = EntryKind::Container;
                    entry.1 = -1;
                    if obj.mod_time > entry.2 {
                        entry.2 = obj.mod_time;
                    }
                }
                None => {
                    seen.entry(rest.to_string()).or_insert((
                        EntryKind::Object,
                        obj.data.len() as i64,
                        obj.mod_time,
                    ));
                }
            }
        }
        for (key, created) in inner.containers.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            let rest = &key[prefix.len()..];
            let first = rest.split('/').next().unwrap_or(rest);
            if first.is_empty() {
                continue;
            }
            seen.entry(first.to_string())
                .and_modify(|e| {
                    e.0 = EntryKind::Container;
                    e.1 = -1;
                })
                .or_insert((EntryKind::Container, -1, *created));
        }

        Ok(seen
            .into_iter()
            .map(|(key, (kind, size, mod_time))| StoreEntry {
                key,
                kind,
                size,
                mod_time,
            })
            .collect())
    }

    fn checksum(
        &self,
        ctx: &OpContext,
        _key: &str,
        _kind: ChecksumKind,
    ) -> StoreResult<Option<String>> {
        ctx.check()?;
        Ok(None)
    }

    fn set_mod_time(
        &self,
        ctx: &OpContext,
        key: &str,
        mod_time: SystemTime,
    ) -> StoreResult<()> {
        ctx.check()?;
        let mut inner = self.inner.write().unwrap();
        match inner.objects.get_mut(key) {
            Some(obj) => {
                obj.mod_time = mod_time;
                Ok(())
            }
            None => Err(StoreError::not_found(key)),
        }
    }

    fn purge(&self, ctx: &OpContext, container: &str) -> StoreResult<()> {
        if !self.caps.purge {
            return Err(StoreError::Unsupported("purge"));
        }
        ctx.check()?;
        let mut events = Vec::new();
        {
            let mut inner = self.inner.write().unwrap();
            inner.stats.purges += 1;
            if !Self::container_exists(&inner, container) {
                return Err(StoreError::not_found(container));
            }
            // Purging "" empties the whole store.
            let prefix = if container.is_empty() {
                String::new()
            } else {
                format!("{}/", container)
            };
            let doomed: Vec<String> = inner
                .objects
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(k, _)| k.clone())
                .collect();
            for key in doomed {
                inner.objects.remove(&key);
                events.push((key, ChangeKind::Object));
            }
            let doomed_containers: Vec<String> = inner
                .containers
                .range(container.to_string()..)
                .take_while(|(k, _)| *k == container || k.starts_with(&prefix))
                .map(|(k, _)| k.clone())
                .collect();
            for key in doomed_containers {
                inner.containers.remove(&key);
            }
        }
        events.push((container.to_string(), ChangeKind::Container));
        self.notify(events);
        Ok(())
    }

    fn server_move(&self, ctx: &OpContext, src: &str, dst: &str) -> StoreResult<()> {
        if !self.caps.server_move {
            return Err(StoreError::Unsupported("server-side move"));
        }
        ctx.check()?;
        let mut events = Vec::new();
        {
            let mut inner = self.inner.write().unwrap();
            inner.stats.moves += 1;
            if !Self::container_exists(&inner, src) {
                return Err(StoreError::not_found(src));
            }
            let src_prefix = format!("{}/", src);
            let moved: Vec<String> = inner
                .objects
                .range(src_prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&src_prefix))
                .map(|(k, _)| k.clone())
                .collect();
            for key in moved {
                let obj = inner.objects.remove(&key).unwrap();
                let new_key = format!("{}/{}", dst, &key[src_prefix.len()..]);
                events.push((key, ChangeKind::Object));
                events.push((new_key.clone(), ChangeKind::Object));
                inner.objects.insert(new_key, obj);
            }
            let moved_containers: Vec<String> = inner
                .containers
                .range(src.to_string()..)
                .take_while(|(k, _)| *k == src || k.starts_with(&src_prefix))
                .map(|(k, _)| k.clone())
                .collect();
            for key in moved_containers {
                let created = inner.containers.remove(&key).unwrap();
                let new_key = if key == src {
                    dst.to_string()
                } else {
                    format!("{}/{}", dst, &key[src_prefix.len()..])
                };
                inner.containers.insert(new_key, created);
            }
        }
        events.push((src.to_string(), ChangeKind::Container));
        events.push((dst.to_string(), ChangeKind::Container));
        self.notify(events);
        Ok(())
    }

    fn server_copy(&self, ctx: &OpContext, src: &str, dst: &str) -> StoreResult<ObjectMeta> {
        if !self.caps.server_copy {
            return Err(StoreError::Unsupported("server-side copy"));
        }
        ctx.check()?;
        let meta = {
            let mut inner = self.inner.write().unwrap();
            inner.stats.copies += 1;
            let data = match inner.objects.get(src) {
                Some(obj) => obj.data.clone(),
                None => return Err(StoreError::not_found(src)),
            };
            let mod_time = SystemTime::now();
            let size = data.len() as u64;
            inner
                .objects
                .insert(dst.to_string(), StoredObject { data, mod_time });
            ObjectMeta {
                key: dst.to_string(),
                size,
                mod_time,
            }
        };
        self.notify(vec![(dst.to_string(), ChangeKind::Object)]);
        Ok(meta)
    }

    fn about(&self, ctx: &OpContext) -> StoreResult<Usage> {
        if !self.caps.about {
            return Err(StoreError::Unsupported("about"));
        }
        ctx.check()?;
        let inner = self.inner.read().unwrap();
        let used: u64 = inner.objects.values().map(|o| o.data.len() as u64).sum();
        Ok(Usage {
            total: None,
            used: Some(used),
            free: None,
        })
    }

    fn change_notify(
        &self,
        ctx: &OpContext,
        callback: ChangeCallback,
        _poll_interval: Duration,
    ) -> StoreResult<()> {
        if !self.caps.change_notify {
            return Err(StoreError::Unsupported("change-notify"));
        }
        ctx.check()?;
        self.subscribers.write().unwrap().push(callback);
        Ok(())
    }
}
