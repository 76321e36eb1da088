//! Record codec — fixed-size binary layouts for cache records.
//!
//! The current format ([`ZidRecord`]) is read and written by the store.
//! The legacy format ([`LegacyRecord`]) is only ever read, through
//! [`RawRecord`], while migrating an old cache file forward.

pub mod current;
pub mod legacy;
pub mod raw;
pub mod zid;

pub use current::{Retention, ZidRecord, CURRENT_VERSION, RECORD_LEN, RS_LEN};
pub use legacy::{LegacyRecord, LEGACY_RECORD_LEN};
pub use raw::{FileFormat, RawRecord};
pub use zid::{Zid, ZID_LEN};
