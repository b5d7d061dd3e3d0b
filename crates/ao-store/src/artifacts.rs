use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use ao_domain::error::{Error, Result};

use crate::migration::{run_migrations, Migration};

const DOMAIN: &str = "artifact_store";

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create_artifacts",
    sql: "
        CREATE TABLE artifacts (
            sha256     TEXT PRIMARY KEY,
            byte_len   INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );
    ",
}];

/// The metadata row recorded for one stored artifact alongside its
/// blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub sha256: String,
    pub byte_len: u64,
    pub created_at: DateTime<Utc>,
}

/// Content-addressed blob storage: tool output too large to inline in
/// an event gets written here and referenced by hash from
/// `EventPayload::ToolResult.artifact_refs`.
///
/// Layout: `<root>/<first two hex chars>/<full 64 hex char sha256>`
/// for the blob itself, plus one row per hash in an `artifacts` table
/// (`<root>/metadata.db`) recording its size and when it was first
/// stored. Sharding keeps any one directory from accumulating millions
/// of entries.
pub struct ArtifactStore {
    root: PathBuf,
    db: Mutex<Connection>,
}

fn is_valid_hash(hash: &str) -> bool {
    hash.len() == 64 && hash.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
}

impl ArtifactStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        set_dir_permissions(&root)?;

        let mut conn = Connection::open(root.join("metadata.db")).map_err(|e| Error::Store(e.to_string()))?;
        run_migrations(&mut conn, DOMAIN, MIGRATIONS)?;

        Ok(Self { root, db: Mutex::new(conn) })
    }

    fn shard_dir(&self, hash: &str) -> PathBuf {
        self.root.join(&hash[0..2])
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        self.shard_dir(hash).join(hash)
    }

    /// Hash and persist `bytes`, returning the sha256 hex digest.
    /// Writing an already-present hash is a no-op other than
    /// recomputing the digest.
    pub fn put(&self, bytes: &[u8]) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let hash = hex::encode(hasher.finalize());

        let dir = self.shard_dir(&hash);
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;

        let path = self.path_for(&hash);
        if !path.exists() {
            let tmp_path = dir.join(format!(".{}.tmp", hash));
            {
                let mut tmp = std::fs::File::create(&tmp_path)?;
                tmp.write_all(bytes)?;
                tmp.sync_all()?;
            }
            std::fs::rename(&tmp_path, &path)?;
            set_file_permissions(&path)?;
        }

        let conn = self.db.lock().map_err(|_| Error::Store("poisoned lock".into()))?;
        conn.execute(
            "INSERT OR IGNORE INTO artifacts (sha256, byte_len, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![hash, bytes.len() as i64, Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::Store(e.to_string()))?;

        Ok(hash)
    }

    /// Look up a previously stored artifact's metadata row without
    /// touching the blob itself.
    pub fn metadata(&self, hash: &str) -> Result<Option<ArtifactMetadata>> {
        if !is_valid_hash(hash) {
            return Err(Error::Store(format!("malformed artifact hash: {hash}")));
        }
        let conn = self.db.lock().map_err(|_| Error::Store("poisoned lock".into()))?;
        conn.query_row(
            "SELECT sha256, byte_len, created_at FROM artifacts WHERE sha256 = ?1",
            rusqlite::params![hash],
            |row| {
                let created_at: String = row.get(2)?;
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)))?;
                Ok(ArtifactMetadata { sha256: row.get(0)?, byte_len: row.get::<_, i64>(1)? as u64, created_at })
            },
        )
        .optional()
        .map_err(|e| Error::Store(e.to_string()))
    }

    /// Read back a previously stored artifact. Rejects malformed
    /// hashes before touching the filesystem to prevent path
    /// traversal via a crafted `artifact_refs` entry.
    pub fn get(&self, hash: &str) -> Result<Vec<u8>> {
        if !is_valid_hash(hash) {
            return Err(Error::Store(format!("malformed artifact hash: {hash}")));
        }
        let path = self.path_for(hash);
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::Store(format!("artifact not found: {hash}")),
            _ => Error::Io(e),
        })
    }

    pub fn exists(&self, hash: &str) -> bool {
        is_valid_hash(hash) && self.path_for(hash).exists()
    }

    pub fn byte_len(&self, hash: &str) -> Result<u64> {
        if !is_valid_hash(hash) {
            return Err(Error::Store(format!("malformed artifact hash: {hash}")));
        }
        Ok(std::fs::metadata(self.path_for(hash))?.len())
    }
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let hash = store.put(b"hello world").unwrap();
        assert_eq!(store.get(&hash).unwrap(), b"hello world");
    }

    #[test]
    fn put_is_idempotent_for_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let h1 = store.put(b"same bytes").unwrap();
        let h2 = store.put(b"same bytes").unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_is_sharded_by_first_two_chars() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let hash = store.put(b"shard me").unwrap();
        assert!(dir.path().join(&hash[0..2]).join(&hash).exists());
    }

    #[test]
    fn get_missing_artifact_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let fake = "a".repeat(64);
        assert!(store.get(&fake).is_err());
    }

    #[test]
    fn get_rejects_malformed_hash_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        assert!(store.get("../../etc/passwd").is_err());
        assert!(store.get("not-hex-at-all").is_err());
    }

    #[test]
    fn exists_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let hash = store.put(b"present").unwrap();
        assert!(store.exists(&hash));
        assert!(!store.exists(&"0".repeat(64)));
    }

    #[test]
    fn put_records_metadata_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let hash = store.put(b"hello world").unwrap();

        let meta = store.metadata(&hash).unwrap().expect("metadata row recorded");
        assert_eq!(meta.sha256, hash);
        assert_eq!(meta.byte_len, 11);
    }

    #[test]
    fn metadata_is_none_for_unknown_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        assert!(store.metadata(&"0".repeat(64)).unwrap().is_none());
    }

    #[test]
    fn repeated_put_does_not_duplicate_metadata_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let h1 = store.put(b"same bytes").unwrap();
        let h2 = store.put(b"same bytes").unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.metadata(&h1).unwrap().unwrap().byte_len, 10);
    }

    #[cfg(unix)]
    #[test]
    fn stored_file_has_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let hash = store.put(b"secret-ish").unwrap();
        let mode = std::fs::metadata(dir.path().join(&hash[0..2]).join(&hash)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
