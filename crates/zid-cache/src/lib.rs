//! ZID cache — persistent continuity state for key-agreement peers.
//!
//! Associates each peer identifier (ZID) with its retained secrets and
//! SAS-verification flag so repeat sessions can recognise known peers.
//! State lives in a single file of fixed-size records that survives
//! restarts, and caches written in the legacy layout are migrated forward
//! on open.

pub mod crypto;
pub mod error;
pub mod record;
pub mod storage;
pub mod time;

// Re-export primary types
pub use error::{CacheError, Result};
pub use record::{Retention, Zid, ZidRecord, RECORD_LEN, RS_LEN, ZID_LEN};
pub use storage::{
    CacheConfig, MigrationOutcome, MigrationReport, PeerRecord, ZidCache, ZidCacheFile,
};
