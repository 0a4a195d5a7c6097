//! Link session configuration.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::cache::LinkKey;

/// Which stale or pinned bindings may be re-resolved this session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Pins are only revalidated; a failed revalidation is an error.
    #[default]
    None,
    /// Every dependency is searched again.
    All,
    /// Only these dependencies are searched again.
    Keys(BTreeSet<LinkKey>),
}

impl RefreshPolicy {
    pub fn covers(&self, key: &LinkKey) -> bool {
        match self {
            RefreshPolicy::None => false,
            RefreshPolicy::All => true,
            RefreshPolicy::Keys(keys) => keys.contains(key),
        }
    }
}

/// Configuration for a [`LinkSession`](crate::LinkSession).
#[derive(Clone, Debug, Default)]
pub struct LinkConfig {
    /// Where pins are persisted. `None` keeps the cache in memory.
    pub cache_path: Option<PathBuf>,
    /// Pin every new resolution.
    pub pin_new: bool,
    pub refresh: RefreshPolicy,
    /// Number of worker threads (0 = rayon default).
    pub num_threads: usize,
}

impl LinkConfig {
    pub fn new() -> Self {
        LinkConfig::default()
    }

    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_pinning(mut self, pin_new: bool) -> Self {
        self.pin_new = pin_new;
        self
    }

    #[must_use]
    pub fn with_refresh(mut self, refresh: RefreshPolicy) -> Self {
        self.refresh = refresh;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Get the effective number of threads.
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            rayon::current_num_threads()
        } else {
            self.num_threads
        }
    }
}
