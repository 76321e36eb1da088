//! Storage layer for the ZID cache.
//!
//! A cache is a single file of fixed-size records:
//!
//! ```text
//! record 0     own-ZID header (the cache's own identity)
//! record 1..N  peer records, appended on first contact, updated in place
//! ```
//!
//! Old deployments wrote a legacy layout; opening such a file migrates it
//! forward and leaves the original beside it as `<path>.save`.
//!
//! # Modules
//!
//! - [`cache_file`] — [`ZidCacheFile`], the file-backed store.
//! - [`migration`] — legacy → current upgrade run from `open`.

pub mod cache_file;
pub mod migration;

use std::path::Path;

use crate::error::Result;
use crate::record::Zid;

pub use cache_file::{CacheConfig, PeerRecord, ZidCacheFile};
pub use migration::{MigrationOutcome, MigrationReport};

/// Contract between the key-agreement protocol and its peer cache.
///
/// The protocol fetches a peer's record when a session starts, updates its
/// retained secrets and verification flag as the session progresses, and
/// hands the record back to [`save`](ZidCache::save).
pub trait ZidCache {
    /// Open (creating or migrating as needed) the cache at `path` and return
    /// its own identity.
    fn open(&mut self, path: &Path) -> Result<Zid>;

    /// Release the underlying file. Safe to call repeatedly.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Own identity recovered by the last successful `open`.
    fn own_zid(&self) -> Result<Zid>;

    /// Return the record for `zid`, appending a fresh one on first contact.
    fn lookup_or_create(&mut self, zid: &Zid) -> Result<PeerRecord>;

    /// Write `record` back at the position it was read from.
    fn save(&mut self, record: &PeerRecord) -> Result<()>;

    /// Peer display names are not stored by file caches; always `None`.
    fn peer_name(&self, _zid: &Zid) -> Option<String> {
        None
    }

    /// Accepted and discarded by file caches.
    fn put_peer_name(&mut self, _zid: &Zid, _name: &str) -> Result<()> {
        Ok(())
    }
}
