//! Link cache: pinned dependency bindings that survive across builds.
//!
//! The cache keeps two layers. `committed` holds what was loaded from disk
//! (or committed earlier in this process); `staged` holds this session's
//! puts, invalidations and pin flags. Reads see staged over committed.
//! [`LinkCache::commit`] persists the merged pins in one atomic file
//! replace; [`LinkCache::discard`] drops the staged layer, so a cancelled
//! or failed session never changes a committed pin.
//!
//! # File Format
//!
//! ```text
//! <cache path>         # bincode-encoded CacheFile
//! <cache path>.tmp     # written first, then renamed over the cache path
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use modlink_ir::{ContentHash, ModuleName};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Version of the on-disk layout. Bump when `CacheFile` changes.
pub const FORMAT_VERSION: u32 = 1;

/// Stable identity of one dependency: consuming module plus slot position.
///
/// Derived only from the consumer, never from the resolved module, so the
/// cache can be consulted before resolution.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    pub consumer: ModuleName,
    pub slot: u32,
}

impl LinkKey {
    pub fn new(consumer: impl Into<ModuleName>, slot: u32) -> Self {
        LinkKey {
            consumer: consumer.into(),
            slot,
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.consumer, self.slot)
    }
}

impl fmt::Debug for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkKey({self})")
    }
}

/// Error parsing a `consumer#slot` key.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("malformed link key `{0}`: expected `<module>#<slot>`")]
pub struct ParseLinkKeyError(pub String);

impl FromStr for LinkKey {
    type Err = ParseLinkKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (consumer, slot) = s
            .rsplit_once('#')
            .ok_or_else(|| ParseLinkKeyError(s.to_string()))?;
        if consumer.is_empty() {
            return Err(ParseLinkKeyError(s.to_string()));
        }
        let slot = slot.parse().map_err(|_| ParseLinkKeyError(s.to_string()))?;
        Ok(LinkKey::new(consumer, slot))
    }
}

/// A resolved dependency.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct LinkBinding {
    pub key: LinkKey,
    pub module: ModuleName,
    /// Fingerprint of the module when it was bound.
    pub fingerprint: ContentHash,
    pub pinned: bool,
    /// Set when revalidation failed.
    pub stale: bool,
    /// Trust label of the space the module was found in, for audit.
    pub trust: String,
}

impl LinkBinding {
    pub fn new(key: LinkKey, module: ModuleName, fingerprint: ContentHash) -> Self {
        LinkBinding {
            key,
            module,
            fingerprint,
            pinned: false,
            stale: false,
            trust: String::new(),
        }
    }

    #[must_use]
    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = pinned;
        self
    }

    #[must_use]
    pub fn with_trust(mut self, trust: impl Into<String>) -> Self {
        self.trust = trust.into();
        self
    }
}

/// What this session did to a key.
#[derive(Clone, Debug)]
enum Staged {
    Put(LinkBinding),
    Removed,
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    format_version: u32,
    tool_version: String,
    bindings: Vec<LinkBinding>,
}

/// Dependency key → binding, persisted as pins.
#[derive(Debug, Default)]
pub struct LinkCache {
    path: Option<PathBuf>,
    committed: RwLock<BTreeMap<LinkKey, LinkBinding>>,
    staged: RwLock<BTreeMap<LinkKey, Staged>>,
    in_flight: DashMap<LinkKey, Arc<Mutex<()>>>,
}

impl LinkCache {
    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        LinkCache::default()
    }

    /// Load the pins stored at `path`. A missing file is an empty cache.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let committed = if path.exists() {
            load(&path)?
        } else {
            tracing::debug!("no cache file yet");
            BTreeMap::new()
        };
        tracing::debug!(pins = committed.len(), "link cache loaded");
        Ok(LinkCache {
            path: Some(path),
            committed: RwLock::new(committed),
            ..LinkCache::default()
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current binding for `key`, staged changes first.
    pub fn get(&self, key: &LinkKey) -> Option<LinkBinding> {
        match self.staged.read().get(key) {
            Some(Staged::Put(binding)) => return Some(binding.clone()),
            Some(Staged::Removed) => return None,
            None => {}
        }
        self.committed.read().get(key).cloned()
    }

    /// Stage a binding for its key.
    pub fn put(&self, binding: LinkBinding) {
        tracing::trace!(key = %binding.key, module = %binding.module, pinned = binding.pinned, "binding staged");
        self.staged
            .write()
            .insert(binding.key.clone(), Staged::Put(binding));
    }

    /// Stage removal of `key`.
    pub fn invalidate(&self, key: &LinkKey) {
        tracing::trace!(%key, "binding invalidated");
        self.staged.write().insert(key.clone(), Staged::Removed);
    }

    /// Flag the binding for `key` as stale. Returns false if there is none.
    pub fn mark_stale(&self, key: &LinkKey) -> bool {
        self.update(key, |binding| binding.stale = true)
    }

    /// Pin the binding for `key`. Returns false if there is none.
    pub fn pin(&self, key: &LinkKey) -> bool {
        self.update(key, |binding| binding.pinned = true)
    }

    /// Unpin the binding for `key`. Returns false if there is none.
    pub fn unpin(&self, key: &LinkKey) -> bool {
        self.update(key, |binding| binding.pinned = false)
    }

    fn update(&self, key: &LinkKey, f: impl FnOnce(&mut LinkBinding)) -> bool {
        let Some(mut binding) = self.get(key) else {
            return false;
        };
        f(&mut binding);
        self.put(binding);
        true
    }

    /// Pinned bindings as this session currently sees them, sorted by key.
    pub fn pins(&self) -> Vec<LinkBinding> {
        self.merged().into_values().filter(|b| b.pinned).collect()
    }

    pub fn has_staged_changes(&self) -> bool {
        !self.staged.read().is_empty()
    }

    /// The lock that serializes resolution of `key`.
    pub fn key_lock(&self, key: &LinkKey) -> Arc<Mutex<()>> {
        self.in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn merged(&self) -> BTreeMap<LinkKey, LinkBinding> {
        // Same lock order as `commit`: staged, then committed.
        let staged = self.staged.read();
        let mut merged = self.committed.read().clone();
        for (key, change) in staged.iter() {
            match change {
                Staged::Put(binding) => {
                    merged.insert(key.clone(), binding.clone());
                }
                Staged::Removed => {
                    merged.remove(key);
                }
            }
        }
        merged
    }

    /// Make staged changes permanent and persist every pin.
    ///
    /// Unpinned bindings live only for the session. Nothing is applied in
    /// memory unless the file write succeeded. Returns the number of pins.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn commit(&self) -> Result<usize, CacheError> {
        let mut staged = self.staged.write();
        let mut committed = self.committed.write();

        let mut merged = committed.clone();
        for (key, change) in staged.iter() {
            match change {
                Staged::Put(binding) if binding.pinned => {
                    merged.insert(key.clone(), binding.clone());
                }
                Staged::Put(_) | Staged::Removed => {
                    merged.remove(key);
                }
            }
        }

        if let Some(path) = &self.path {
            store(path, &merged)?;
        }
        let pins = merged.len();
        *committed = merged;
        staged.clear();
        tracing::debug!(pins, "link cache committed");
        Ok(pins)
    }

    /// Drop every staged change.
    pub fn discard(&self) {
        let mut staged = self.staged.write();
        if !staged.is_empty() {
            tracing::debug!(changes = staged.len(), "staged link cache changes discarded");
        }
        staged.clear();
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn load(path: &Path) -> Result<BTreeMap<LinkKey, LinkBinding>, CacheError> {
    let data = std::fs::read(path).map_err(|e| io_error(path, &e))?;
    let file: CacheFile = bincode::deserialize(&data).map_err(|e| CacheError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if file.format_version != FORMAT_VERSION {
        return Err(CacheError::VersionMismatch {
            path: path.to_path_buf(),
            found: file.format_version,
            expected: FORMAT_VERSION,
        });
    }
    if file.tool_version != env!("CARGO_PKG_VERSION") {
        tracing::debug!(written_by = %file.tool_version, "cache written by another version");
    }
    Ok(file
        .bindings
        .into_iter()
        .map(|binding| (binding.key.clone(), binding))
        .collect())
}

fn store(path: &Path, bindings: &BTreeMap<LinkKey, LinkBinding>) -> Result<(), CacheError> {
    let file = CacheFile {
        format_version: FORMAT_VERSION,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        bindings: bindings.values().cloned().collect(),
    };
    let data = bincode::serialize(&file).map_err(|e| CacheError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_error(dir, &e))?;
    }
    let tmp = temp_path(path);
    std::fs::write(&tmp, &data).map_err(|e| io_error(&tmp, &e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_error(path, &e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
