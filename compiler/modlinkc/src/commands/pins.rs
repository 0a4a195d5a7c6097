//! The `pins` and `unpin` commands: inspect and edit a persisted cache.

use std::path::Path;

use modlink::{CacheError, LinkBinding, LinkCache, LinkKey};

/// Every pin stored at `path`, sorted by key.
pub fn list_pins(path: &Path) -> Result<Vec<LinkBinding>, CacheError> {
    Ok(LinkCache::open(path)?.pins())
}

/// Drop the pin for `key` and persist. Returns false if `key` had no pin.
pub fn unpin(path: &Path, key: &LinkKey) -> Result<bool, CacheError> {
    let cache = LinkCache::open(path)?;
    if !cache.get(key).is_some_and(|binding| binding.pinned) {
        return Ok(false);
    }
    cache.unpin(key);
    cache.commit()?;
    tracing::debug!(%key, "pin removed");
    Ok(true)
}
