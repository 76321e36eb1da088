//! File-backed ZID cache.
//!
//! Records are scanned sequentially on every lookup; there is no in-memory
//! index. The store is the sole writer of its file and assumes a single
//! handle per path: concurrent instances on the same path are not
//! coordinated.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::migration::{self, MigrationOutcome};
use super::ZidCache;
use crate::error::{CacheError, Result};
use crate::record::{FileFormat, RawRecord, Zid, ZidRecord, CURRENT_VERSION, RECORD_LEN};

/// Offset of the first peer record.
const FIRST_PEER_OFFSET: u64 = RECORD_LEN as u64;

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

// ── Configuration ─────────────────────────────────────────────────────────────

/// Tunables for a [`ZidCacheFile`].
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Call `sync_data` after every write.
    pub sync: bool,
    /// Source of the identity given to a newly created cache.
    pub zid_source: fn() -> Zid,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sync: true,
            zid_source: Zid::random,
        }
    }
}

// ── PeerRecord handle ─────────────────────────────────────────────────────────

/// A peer record bound to the cache session and file offset it came from.
///
/// Only [`ZidCacheFile`] can mint one, and [`ZidCacheFile::save`] rejects
/// handles from any other cache or from an earlier open of the same cache.
/// Changes made through `DerefMut` reach disk only when saved.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    session: u64,
    offset: u64,
    record: ZidRecord,
}

impl PeerRecord {
    /// Byte offset of this record in the cache file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn record(&self) -> &ZidRecord {
        &self.record
    }
}

impl Deref for PeerRecord {
    type Target = ZidRecord;

    fn deref(&self) -> &ZidRecord {
        &self.record
    }
}

impl DerefMut for PeerRecord {
    fn deref_mut(&mut self) -> &mut ZidRecord {
        &mut self.record
    }
}

// ── ZidCacheFile ──────────────────────────────────────────────────────────────

struct OpenCache {
    file: File,
    path: PathBuf,
    own_zid: Zid,
    session: u64,
}

/// ZID cache stored in a single file of fixed-size records.
///
/// Starts closed; [`open`](ZidCache::open) moves it to open and
/// [`close`](ZidCache::close) back. Dropping the cache closes the file.
pub struct ZidCacheFile {
    config: CacheConfig,
    open: Option<OpenCache>,
    last_migration: Option<MigrationOutcome>,
}

impl Default for ZidCacheFile {
    fn default() -> Self {
        Self::new()
    }
}

impl ZidCacheFile {
    /// Create a closed cache with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Create a closed cache with an explicit configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            open: None,
            last_migration: None,
        }
    }

    /// Path of the open cache file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.open.as_ref().map(|o| o.path.as_path())
    }

    /// What the last `open` found: no migration, a migration, or a rebuild.
    pub fn last_migration(&self) -> Option<&MigrationOutcome> {
        self.last_migration.as_ref()
    }

    /// List every valid peer record in file order.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NotOpen` if the cache is closed, or
    /// `CacheError::Io` if the file cannot be read.
    pub fn peers(&mut self) -> Result<Vec<PeerRecord>> {
        let open = self.open.as_mut().ok_or(CacheError::NotOpen)?;
        let session = open.session;
        let mut peers = Vec::new();
        scan_peers(&mut open.file, |offset, record| {
            peers.push(PeerRecord {
                session,
                offset,
                record,
            });
            false
        })?;
        Ok(peers)
    }

    fn install(&mut self, file: File, path: &Path, own_zid: Zid) {
        let session = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        self.open = Some(OpenCache {
            file,
            path: path.to_path_buf(),
            own_zid,
            session,
        });
    }
}

impl ZidCache for ZidCacheFile {
    /// # Errors
    ///
    /// `AlreadyOpen` if a file is already open, `CreateFailed` or
    /// `WriteFailed` while creating a new cache, `InvalidHeader` if an
    /// existing file does not start with a valid own-ZID record, and
    /// `MigrationAborted` if a legacy file cannot be migrated.
    fn open(&mut self, path: &Path) -> Result<Zid> {
        if self.open.is_some() {
            return Err(CacheError::AlreadyOpen);
        }

        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let (file, own_zid) = create_cache_file(path, &self.config)?;
                self.last_migration = Some(MigrationOutcome::NotNeeded);
                self.install(file, path, own_zid);
                return Ok(own_zid);
            }
            Err(e) => return Err(CacheError::Io(e)),
        };

        let (mut file, outcome) = migration::check_do_migration(file, path, &self.config)?;
        let own_zid = read_header(&mut file)?;
        log::debug!("opened ZID cache {} (own ZID {own_zid})", path.display());

        self.last_migration = Some(outcome);
        self.install(file, path, own_zid);
        Ok(own_zid)
    }

    fn close(&mut self) {
        if let Some(open) = self.open.take() {
            log::debug!("closed ZID cache {}", open.path.display());
        }
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn own_zid(&self) -> Result<Zid> {
        self.open
            .as_ref()
            .map(|o| o.own_zid)
            .ok_or(CacheError::NotOpen)
    }

    /// # Errors
    ///
    /// `NotOpen` if the cache is closed, `Io` if the scan fails, and
    /// `WriteFailed` if a new record cannot be appended.
    fn lookup_or_create(&mut self, zid: &Zid) -> Result<PeerRecord> {
        let sync = self.config.sync;
        let open = self.open.as_mut().ok_or(CacheError::NotOpen)?;

        let mut found = None;
        let end = scan_peers(&mut open.file, |offset, record| {
            if record.zid() == *zid {
                found = Some((offset, record));
                true
            } else {
                false
            }
        })?;

        if let Some((offset, record)) = found {
            return Ok(PeerRecord {
                session: open.session,
                offset,
                record,
            });
        }

        let record = ZidRecord::peer(*zid);
        write_record_at(&mut open.file, end, &record, sync)?;
        log::debug!("appended ZID record {zid} at offset {end}");

        Ok(PeerRecord {
            session: open.session,
            offset: end,
            record,
        })
    }

    /// # Errors
    ///
    /// `NotOpen` if the cache is closed, `ForeignRecord` if `record` was not
    /// returned by this open session, and `WriteFailed` if the write fails.
    fn save(&mut self, record: &PeerRecord) -> Result<()> {
        let sync = self.config.sync;
        let open = self.open.as_mut().ok_or(CacheError::NotOpen)?;
        if record.session != open.session {
            return Err(CacheError::ForeignRecord);
        }

        write_record_at(&mut open.file, record.offset, &record.record, sync)?;
        log::debug!(
            "saved ZID record {} at offset {}",
            record.zid(),
            record.offset
        );
        Ok(())
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Create a brand-new cache at `path` holding only a fresh own-ZID header.
///
/// Any existing file is truncated and missing parent directories are
/// created.
pub(crate) fn create_cache_file(path: &Path, config: &CacheConfig) -> Result<(File, Zid)> {
    let create_failed = |source: io::Error| CacheError::CreateFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(create_failed)?;
    }
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(create_failed)?;

    let own_zid = (config.zid_source)();
    write_record_at(&mut file, 0, &ZidRecord::own(own_zid), config.sync)?;
    log::debug!("created ZID cache {} (own ZID {own_zid})", path.display());

    Ok((file, own_zid))
}

/// Seek to `offset`, write `record`, flush.
pub(crate) fn write_record_at(
    file: &mut File,
    offset: u64,
    record: &ZidRecord,
    sync: bool,
) -> Result<()> {
    let write = |file: &mut File| -> io::Result<()> {
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&record.encode())?;
        file.flush()?;
        if sync {
            file.sync_data()?;
        }
        Ok(())
    };
    write(file).map_err(CacheError::WriteFailed)
}

/// Read and validate the own-ZID header at the start of `file`.
fn read_header(file: &mut File) -> Result<Zid> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; RECORD_LEN];
    let n = crate::record::raw::read_block(file, &mut buf)?;
    if n < RECORD_LEN {
        return Err(CacheError::InvalidHeader(format!(
            "truncated header: {n} of {RECORD_LEN} bytes"
        )));
    }
    if buf[0] != CURRENT_VERSION {
        return Err(CacheError::InvalidHeader(format!(
            "unsupported record version {}",
            buf[0]
        )));
    }

    let header = ZidRecord::decode(&buf);
    if !header.is_own_zid() {
        return Err(CacheError::InvalidHeader(
            "first record is not an own-ZID record".to_string(),
        ));
    }
    Ok(header.zid())
}

/// Walk the valid peer records after the header, calling `visit` with each
/// record's offset until it returns `true`.
///
/// Returns the offset just past the last complete record scanned, which is
/// where a new record is appended. A truncated trailing record is excluded,
/// so the next append overwrites it.
fn scan_peers<F>(file: &mut File, mut visit: F) -> Result<u64>
where
    F: FnMut(u64, ZidRecord) -> bool,
{
    file.seek(SeekFrom::Start(FIRST_PEER_OFFSET))?;
    let mut reader = BufReader::new(&*file);
    let mut offset = FIRST_PEER_OFFSET;

    while let Some(RawRecord::Current(record)) =
        RawRecord::read_from(&mut reader, FileFormat::Current)?
    {
        let at = offset;
        offset += RECORD_LEN as u64;
        if record.is_own_zid() || !record.is_valid() {
            continue;
        }
        if visit(at, record) {
            break;
        }
    }
    Ok(offset)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
