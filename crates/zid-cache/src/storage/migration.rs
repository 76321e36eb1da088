//! Legacy → current cache migration.
//!
//! Run by `open` on every existing file. A current-format file is left
//! untouched. A legacy file is renamed to `<path>.save`, its own identity
//! and valid peer records are rewritten in the current format, and the
//! result replaces `<path>`. The `.save` file stays on disk as a backup.
//!
//! The migrated file is assembled at `<path>.migrating` and renamed into
//! place only once complete. If anything fails after the rename to `.save`,
//! the legacy file is moved back so the next `open` retries.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::cache_file::{create_cache_file, CacheConfig};
use crate::error::{CacheError, Result};
use crate::record::raw::read_block;
use crate::record::{FileFormat, LegacyRecord, RawRecord, ZidRecord};

const BACKUP_SUFFIX: &str = ".save";
const MIGRATING_SUFFIX: &str = ".migrating";

/// Counts from one completed migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Peer records carried into the new file.
    pub migrated: usize,
    /// Additional own-ZID records dropped.
    pub skipped_own: usize,
    /// Records dropped because their validity flag was clear.
    pub skipped_invalid: usize,
}

/// Result of checking a cache file's format at open time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The file was already in the current format (or newly created).
    NotNeeded,
    /// A legacy file was migrated; the original is kept at `backup`.
    Migrated {
        report: MigrationReport,
        backup: PathBuf,
    },
    /// The legacy file could not be set aside and a fresh cache with a new
    /// identity was created in its place.
    Recreated,
}

/// Path of the backup written beside `path` during migration.
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, BACKUP_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Migrate `file` (open on `path`) if it is in the legacy format.
///
/// Returns the file to use as the active cache, positioned arbitrarily,
/// together with what happened.
///
/// # Errors
///
/// `InvalidHeader` if the file is shorter than two bytes,
/// `MigrationAborted` if the legacy file has no readable own record,
/// `WriteFailed`/`CreateFailed` if the new file cannot be written.
pub(crate) fn check_do_migration(
    mut file: File,
    path: &Path,
    config: &CacheConfig,
) -> Result<(File, MigrationOutcome)> {
    file.seek(SeekFrom::Start(0))?;
    let mut lead = [0u8; 2];
    if read_block(&mut file, &mut lead)? < lead.len() {
        return Err(CacheError::InvalidHeader(
            "file too short to hold a header".to_string(),
        ));
    }
    if FileFormat::detect(&lead) == FileFormat::Current {
        return Ok((file, MigrationOutcome::NotNeeded));
    }
    drop(file);

    let backup = backup_path(path);
    if let Err(e) = fs::rename(path, &backup) {
        log::warn!(
            "cannot move legacy ZID cache {} aside ({e}); creating a new cache",
            path.display()
        );
        if let Err(e) = fs::remove_file(path) {
            log::warn!("cannot remove legacy ZID cache {}: {e}", path.display());
        }
        let (file, _) = create_cache_file(path, config)?;
        return Ok((file, MigrationOutcome::Recreated));
    }

    match migrate_from_backup(&backup, path, config.sync) {
        Ok(report) => {
            log::info!(
                "migrated legacy ZID cache {}: {} peer(s) carried, {} invalid and {} extra own record(s) dropped",
                path.display(),
                report.migrated,
                report.skipped_invalid,
                report.skipped_own
            );
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            Ok((file, MigrationOutcome::Migrated { report, backup }))
        }
        Err(e) => {
            if let Err(restore) = fs::rename(&backup, path) {
                log::warn!(
                    "cannot restore legacy ZID cache from {}: {restore}",
                    backup.display()
                );
            }
            Err(e)
        }
    }
}

/// Rebuild `path` in the current format from the legacy file at `backup`.
fn migrate_from_backup(backup: &Path, path: &Path, sync: bool) -> Result<MigrationReport> {
    let legacy = File::open(backup).map_err(|e| {
        CacheError::MigrationAborted(format!("cannot open {}: {e}", backup.display()))
    })?;
    let mut reader = BufReader::new(legacy);

    let own = match RawRecord::read_from(&mut reader, FileFormat::Legacy) {
        Ok(Some(RawRecord::Legacy(rec))) if rec.is_own_zid() => rec,
        Ok(Some(_)) => {
            return Err(CacheError::MigrationAborted(
                "first legacy record is not an own-ZID record".to_string(),
            ))
        }
        Ok(None) => {
            return Err(CacheError::MigrationAborted(
                "legacy file has no complete header record".to_string(),
            ))
        }
        Err(e) => {
            return Err(CacheError::MigrationAborted(format!(
                "cannot read legacy header: {e}"
            )))
        }
    };

    let tmp_path = with_suffix(path, MIGRATING_SUFFIX);
    let result = write_migrated(&mut reader, &own, &tmp_path, sync).and_then(|report| {
        fs::rename(&tmp_path, path).map_err(CacheError::WriteFailed)?;
        Ok(report)
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_migrated(
    reader: &mut BufReader<File>,
    own: &LegacyRecord,
    tmp_path: &Path,
    sync: bool,
) -> Result<MigrationReport> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp_path)
        .map_err(|source| CacheError::CreateFailed {
            path: tmp_path.to_path_buf(),
            source,
        })?;
    let mut writer = BufWriter::new(file);
    let mut report = MigrationReport::default();

    writer
        .write_all(&ZidRecord::header_from_legacy(own).encode())
        .map_err(CacheError::WriteFailed)?;

    while let Some(RawRecord::Legacy(rec)) = RawRecord::read_from(reader, FileFormat::Legacy)? {
        if rec.is_own_zid() {
            report.skipped_own += 1;
            continue;
        }
        if !rec.is_valid() {
            report.skipped_invalid += 1;
            continue;
        }
        writer
            .write_all(&ZidRecord::peer_from_legacy(&rec).encode())
            .map_err(CacheError::WriteFailed)?;
        report.migrated += 1;
    }

    let file = writer
        .into_inner()
        .map_err(|e| CacheError::WriteFailed(e.into_error()))?;
    if sync {
        file.sync_all().map_err(CacheError::WriteFailed)?;
    }
    Ok(report)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
