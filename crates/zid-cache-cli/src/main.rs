//! ZID cache CLI — `zidc` command.
//!
//! Inspects a ZID cache file, marks peers as SAS-verified, and records
//! retained secrets by hand for testing and support work.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use zid_cache::record::current::{VALID_EXPIRED, VALID_FOREVER};
use zid_cache::{
    CacheConfig, MigrationOutcome, PeerRecord, Retention, Zid, ZidCache, ZidCacheFile, RS_LEN,
};

// ── Path helpers ──────────────────────────────────────────────────────────────

fn default_cache_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".zrtp").join("zid.cache")
}

// ── Formatting helpers ────────────────────────────────────────────────────────

fn valid_thru_to_string(valid_thru: i64) -> String {
    match valid_thru {
        VALID_FOREVER => "never".to_string(),
        VALID_EXPIRED => "expired".to_string(),
        secs => chrono::DateTime::from_timestamp(secs, 0)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| secs.to_string()),
    }
}

fn parse_zid(s: &str) -> Result<Zid> {
    s.parse::<Zid>()
        .with_context(|| format!("'{s}' is not a 24-digit hex ZID"))
}

fn parse_secret(s: &str) -> Result<[u8; RS_LEN]> {
    let bytes = hex::decode(s.trim()).context("secret must be hex")?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow!("secret must be {RS_LEN} bytes, got {}", b.len()))
}

/// JSON view of one peer record. Secret bytes are never printed.
#[derive(Debug, Serialize)]
struct PeerSummary {
    zid: String,
    offset: u64,
    sas_verified: bool,
    rs1_valid: bool,
    rs1_expires: String,
    rs2_valid: bool,
    rs2_expires: String,
    mitm_key: bool,
}

impl From<&PeerRecord> for PeerSummary {
    fn from(rec: &PeerRecord) -> Self {
        Self {
            zid: rec.zid().to_string(),
            offset: rec.offset(),
            sas_verified: rec.is_sas_verified(),
            rs1_valid: rec.is_rs1_valid(),
            rs1_expires: valid_thru_to_string(rec.rs1_valid_thru()),
            rs2_valid: rec.is_rs2_valid(),
            rs2_expires: valid_thru_to_string(rec.rs2_valid_thru()),
            mitm_key: rec.mitm_key().is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CacheSummary {
    path: String,
    own_zid: String,
    peers: usize,
    verified: usize,
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// ZID cache CLI — inspect and maintain the peer cache used by the key
/// agreement protocol.
#[derive(Parser, Debug)]
#[command(
    name = "zidc",
    about = "ZID cache CLI",
    version,
    long_about = "zidc — ZID cache CLI\n\nInspect the peer cache, mark peers as SAS-verified,\nand manage retained secrets."
)]
struct Cli {
    /// Cache file (default: ~/.zrtp/zid.cache)
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Skip fsync after each write
    #[arg(long, global = true)]
    no_sync: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the cache (or migrate a legacy one) and print its own ZID
    Init,

    /// Show cache summary
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known peers
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a peer's record, creating it on first contact
    Lookup {
        /// Peer ZID (24 hex digits)
        zid: String,
    },

    /// Mark a peer's SAS as verified
    Verify {
        /// Peer ZID (24 hex digits)
        zid: String,
    },

    /// Clear a peer's SAS-verified flag
    Unverify {
        /// Peer ZID (24 hex digits)
        zid: String,
    },

    /// Store a new retained secret for a peer (RS1 moves to RS2)
    Retain {
        /// Peer ZID (24 hex digits)
        zid: String,

        /// Secret as 64 hex digits
        #[arg(long)]
        secret: String,

        /// Seconds until the secret expires (default: never)
        #[arg(long)]
        expire: Option<u32>,
    },
}

// ── Main entry point ──────────────────────────────────────────────────────────

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let verbose = cli.verbose;
    let path = cli.cache.clone().unwrap_or_else(default_cache_path);
    let config = CacheConfig {
        sync: !cli.no_sync,
        ..CacheConfig::default()
    };
    log::debug!("using ZID cache {}", path.display());

    let result = match cli.command {
        Commands::Init => cmd_init(&path, config, verbose),
        Commands::Show { json } => cmd_show(&path, config, json),
        Commands::List { json } => cmd_list(&path, config, json, verbose),
        Commands::Lookup { zid } => cmd_lookup(&path, config, &zid),
        Commands::Verify { zid } => cmd_set_verified(&path, config, &zid, true),
        Commands::Unverify { zid } => cmd_set_verified(&path, config, &zid, false),
        Commands::Retain {
            zid,
            secret,
            expire,
        } => cmd_retain(&path, config, &zid, &secret, expire),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn open_cache(path: &Path, config: CacheConfig) -> Result<ZidCacheFile> {
    let mut cache = ZidCacheFile::with_config(config);
    cache
        .open(path)
        .with_context(|| format!("failed to open ZID cache {}", path.display()))?;
    Ok(cache)
}

fn open_existing(path: &Path, config: CacheConfig) -> Result<ZidCacheFile> {
    if !path.exists() {
        return Err(anyhow!(
            "no ZID cache at {} (run `zidc init` first)",
            path.display()
        ));
    }
    open_cache(path, config)
}

fn cmd_init(path: &Path, config: CacheConfig, verbose: bool) -> Result<()> {
    let existed = path.exists();
    let cache = open_cache(path, config)?;
    let own = cache.own_zid()?;

    if existed {
        println!("Opened ZID cache");
    } else {
        println!("Created ZID cache");
    }
    println!("  Own ZID: {own}");
    println!("  File:    {}", path.display());

    match cache.last_migration() {
        Some(MigrationOutcome::Migrated { report, backup }) => {
            println!(
                "  Migrated legacy cache: {} peer(s) carried over",
                report.migrated
            );
            println!("  Backup:  {}", backup.display());
            if verbose {
                println!("  Dropped: {} invalid record(s)", report.skipped_invalid);
            }
        }
        Some(MigrationOutcome::Recreated) => {
            println!("  Legacy cache could not be migrated; a new identity was created");
        }
        _ => {}
    }

    Ok(())
}

fn cmd_show(path: &Path, config: CacheConfig, json: bool) -> Result<()> {
    let mut cache = open_existing(path, config)?;
    let peers = cache.peers().context("failed to read peers")?;

    let summary = CacheSummary {
        path: path.display().to_string(),
        own_zid: cache.own_zid()?.to_string(),
        peers: peers.len(),
        verified: peers.iter().filter(|p| p.is_sas_verified()).count(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("ZID cache: {}", summary.path);
    println!("  Own ZID:  {}", summary.own_zid);
    println!("  Peers:    {}", summary.peers);
    println!("  Verified: {}", summary.verified);
    Ok(())
}

fn cmd_list(path: &Path, config: CacheConfig, json: bool, verbose: bool) -> Result<()> {
    let mut cache = open_existing(path, config)?;
    let peers = cache.peers().context("failed to read peers")?;
    let summaries: Vec<PeerSummary> = peers.iter().map(PeerSummary::from).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No peers in {}", path.display());
        return Ok(());
    }

    println!("{:<26} {:<9} {:<5} {:<5} RS1 EXPIRES", "ZID", "VERIFIED", "RS1", "RS2");
    println!("{}", "-".repeat(72));
    for s in &summaries {
        println!(
            "{:<26} {:<9} {:<5} {:<5} {}",
            s.zid,
            if s.sas_verified { "yes" } else { "no" },
            if s.rs1_valid { "yes" } else { "-" },
            if s.rs2_valid { "yes" } else { "-" },
            s.rs1_expires
        );
        if verbose {
            println!("    offset {}, RS2 expires {}", s.offset, s.rs2_expires);
        }
    }
    Ok(())
}

fn print_peer(rec: &PeerRecord) {
    let s = PeerSummary::from(rec);
    println!("Peer: {}", s.zid);
    println!("  Offset:       {}", s.offset);
    println!("  SAS verified: {}", s.sas_verified);
    println!("  RS1:          {} (expires {})", s.rs1_valid, s.rs1_expires);
    println!("  RS2:          {} (expires {})", s.rs2_valid, s.rs2_expires);
    println!("  MitM key:     {}", s.mitm_key);
}

fn cmd_lookup(path: &Path, config: CacheConfig, zid: &str) -> Result<()> {
    let zid = parse_zid(zid)?;
    let mut cache = open_existing(path, config)?;
    let rec = cache.lookup_or_create(&zid)?;
    print_peer(&rec);
    Ok(())
}

fn cmd_set_verified(path: &Path, config: CacheConfig, zid: &str, verified: bool) -> Result<()> {
    let zid = parse_zid(zid)?;
    let mut cache = open_existing(path, config)?;
    let mut rec = cache.lookup_or_create(&zid)?;
    if verified {
        rec.set_sas_verified();
    } else {
        rec.reset_sas_verified();
    }
    cache.save(&rec).context("failed to save peer record")?;

    let state = if verified { "verified" } else { "unverified" };
    println!("Peer {zid} marked {state}");
    Ok(())
}

fn cmd_retain(
    path: &Path,
    config: CacheConfig,
    zid: &str,
    secret: &str,
    expire: Option<u32>,
) -> Result<()> {
    let zid = parse_zid(zid)?;
    let secret = parse_secret(secret)?;
    let retention = expire.map_or(Retention::Forever, Retention::Seconds);

    let mut cache = open_existing(path, config)?;
    let mut rec = cache.lookup_or_create(&zid)?;
    rec.set_new_rs1(&secret, retention);
    cache.save(&rec).context("failed to save peer record")?;

    println!(
        "Stored new RS1 for {zid} (expires {})",
        valid_thru_to_string(rec.rs1_valid_thru())
    );
    Ok(())
}
