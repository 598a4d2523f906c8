//! Workspace bundles: the SQLite file plus a manifest, zipped.
//!
//! Kept free of other crate modules so `tests/backup_zip.rs` can include it
//! by path.

use anyhow::{bail, Context};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const BUNDLE_FORMAT_V1: &str = "rollcall-workspace-v1";
const BARE_SQLITE: &str = "bare-sqlite3";
const DB_NAME: &str = "rollcall.sqlite3";
const IMPORTING_DB_NAME: &str = "rollcall.sqlite3.importing";
const PREVIOUS_DB_NAME: &str = "rollcall.sqlite3.previous";
const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

mod entry {
    pub const MANIFEST: &str = "manifest.json";
    pub const DATABASE: &str = "db/rollcall.sqlite3";
    pub const WORKSPACE_META: &str = "meta/workspace.json";
}

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    format: String,
    #[serde(default)]
    app_version: Option<String>,
    #[serde(default)]
    exported_at: Option<String>,
    #[serde(default)]
    db_sha256: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn put_entry<W: Write + Seek>(zip: &mut ZipWriter<W>, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, opts)
        .with_context(|| format!("start bundle entry {}", name))?;
    zip.write_all(bytes)
        .with_context(|| format!("write bundle entry {}", name))
}

fn take_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    archive
        .by_name(name)
        .with_context(|| format!("bundle has no {}", name))?
        .read_to_end(&mut bytes)
        .with_context(|| format!("read bundle entry {}", name))?;
    Ok(bytes)
}

pub fn export_workspace_bundle(workspace: &Path, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let db_path = workspace.join(DB_NAME);
    if !db_path.is_file() {
        bail!("no workspace database at {}", db_path.display());
    }
    let db = std::fs::read(&db_path).with_context(|| format!("read {}", db_path.display()))?;
    let db_sha256 = sha256_hex(&db);

    let manifest = Manifest {
        format: BUNDLE_FORMAT_V1.to_string(),
        app_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        exported_at: Some(chrono::Utc::now().to_rfc3339()),
        db_sha256: Some(db_sha256.clone()),
    };
    let meta = serde_json::json!({ "sourceWorkspace": workspace.to_string_lossy() });

    if let Some(dir) = out_path.parent() {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let file = File::create(out_path).with_context(|| format!("create {}", out_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let entries: [(&str, Vec<u8>); 3] = [
        (entry::MANIFEST, serde_json::to_vec_pretty(&manifest)?),
        (entry::DATABASE, db),
        (entry::WORKSPACE_META, serde_json::to_vec_pretty(&meta)?),
    ];
    for (name, bytes) in &entries {
        put_entry(&mut zip, name, bytes)?;
    }
    zip.finish().context("finish bundle")?;

    Ok(ExportSummary {
        bundle_format: manifest.format,
        entry_count: entries.len(),
        db_sha256,
    })
}

fn looks_like_zip(path: &Path) -> anyhow::Result<bool> {
    let mut head = [0u8; 4];
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    match file.read_exact(&mut head) {
        Ok(()) => Ok(head == ZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

fn previous_path(workspace: &Path) -> std::path::PathBuf {
    workspace.join(PREVIOUS_DB_NAME)
}

/// Rejects anything that is not a readable SQLite database before it can
/// replace the workspace file.
fn verify_database(path: &Path) -> anyhow::Result<()> {
    let mut head = [0u8; 16];
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    if file.read_exact(&mut head).is_err() || &head != SQLITE_HEADER {
        bail!("not a SQLite database");
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .context("open imported database")?;
    let status: String = conn
        .query_row("PRAGMA quick_check", [], |r| r.get(0))
        .context("check imported database")?;
    if status != "ok" {
        bail!("imported database failed integrity check: {}", status);
    }
    Ok(())
}

/// Swap `bytes` in as the workspace database. The file it replaces is kept
/// as `rollcall.sqlite3.previous` for [`restore_previous`].
fn replace_database(workspace: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dst = workspace.join(DB_NAME);
    let tmp = workspace.join(IMPORTING_DB_NAME);
    {
        let mut out = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        out.write_all(bytes)
            .and_then(|_| out.flush())
            .with_context(|| format!("write {}", tmp.display()))?;
    }
    if let Err(e) = verify_database(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    let previous = previous_path(workspace);
    let had_db = dst.exists();
    if had_db {
        std::fs::rename(&dst, &previous)
            .with_context(|| format!("keep current database as {}", previous.display()))?;
    }
    if let Err(e) = std::fs::rename(&tmp, &dst) {
        if had_db {
            let _ = std::fs::rename(&previous, &dst);
        }
        return Err(e).with_context(|| format!("move database into {}", dst.display()));
    }
    Ok(())
}

/// Put the database replaced by the last import back. Returns false when
/// there is nothing to restore.
pub fn restore_previous(workspace: &Path) -> anyhow::Result<bool> {
    let previous = previous_path(workspace);
    if !previous.is_file() {
        return Ok(false);
    }
    let dst = workspace.join(DB_NAME);
    std::fs::rename(&previous, &dst)
        .with_context(|| format!("restore {}", dst.display()))?;
    Ok(true)
}

pub fn import_workspace_bundle(in_path: &Path, workspace: &Path) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace).with_context(|| format!("create {}", workspace.display()))?;

    if !looks_like_zip(in_path)? {
        let bytes = std::fs::read(in_path).with_context(|| format!("read {}", in_path.display()))?;
        replace_database(workspace, &bytes)?;
        return Ok(ImportSummary {
            bundle_format_detected: BARE_SQLITE.to_string(),
        });
    }

    let file = File::open(in_path).with_context(|| format!("open {}", in_path.display()))?;
    let mut archive = ZipArchive::new(file).context("not a readable zip archive")?;
    let manifest: Manifest = serde_json::from_slice(&take_entry(&mut archive, entry::MANIFEST)?)
        .context("manifest.json is not a valid manifest")?;
    if manifest.format != BUNDLE_FORMAT_V1 {
        bail!("unsupported bundle format: {}", manifest.format);
    }

    let db = take_entry(&mut archive, entry::DATABASE)?;
    if let Some(expected) = manifest.db_sha256.as_deref() {
        let actual = sha256_hex(&db);
        if actual != expected {
            bail!("database checksum mismatch: expected {}, got {}", expected, actual);
        }
    }
    replace_database(workspace, &db)?;

    Ok(ImportSummary {
        bundle_format_detected: manifest.format,
    })
}
