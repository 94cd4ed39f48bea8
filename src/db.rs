use crate::error::SyncError;
use crate::models::SyncRecord;
use rusqlite::{params, Connection, OpenFlags};
use std::collections::HashMap;
use std::path::Path;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sync_state (
    playlist_name  TEXT PRIMARY KEY,
    last_synced_ms INTEGER NOT NULL
);
";

/// In-memory snapshot of playlist name -> last synced modification time (ms).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    records: HashMap<String, i64>,
}

impl SyncState {
    pub fn get(&self, playlist_name: &str) -> Option<i64> {
        self.records.get(playlist_name).copied()
    }

    pub fn set(&mut self, playlist_name: &str, last_synced_ms: i64) {
        self.records.insert(playlist_name.to_string(), last_synced_ms);
    }

    /// True when the playlist was never synced or changed since the last sync.
    pub fn needs_sync(&self, playlist_name: &str, modified_ms: i64) -> bool {
        match self.get(playlist_name) {
            Some(last) => modified_ms > last,
            None => true,
        }
    }

    /// All records, sorted by playlist name.
    pub fn records(&self) -> Vec<SyncRecord> {
        let mut out: Vec<SyncRecord> = self
            .records
            .iter()
            .map(|(name, ms)| SyncRecord { playlist_name: name.clone(), last_synced_ms: *ms })
            .collect();
        out.sort_by(|a, b| a.playlist_name.cmp(&b.playlist_name));
        out
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

/// Load the persisted snapshot. A missing file is an empty state.
pub fn load(path: &Path) -> Result<SyncState, SyncError> {
    if !path.exists() {
        return Ok(SyncState::default());
    }
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt = conn.prepare("SELECT playlist_name, last_synced_ms FROM sync_state")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
    let mut state = SyncState::default();
    for row in rows {
        let (name, ms) = row?;
        state.records.insert(name, ms);
    }
    Ok(state)
}

/// Like [`load`], but an unreadable store degrades to an empty state (full resync).
pub fn load_or_empty(path: &Path) -> SyncState {
    match load(path) {
        Ok(state) => state,
        Err(e) => {
            log::warn!(
                "Sync state at {} unreadable ({}); continuing with a full resync",
                path.display(),
                e
            );
            SyncState::default()
        }
    }
}

/// Replace the persisted snapshot with `state`.
///
/// The snapshot is built in a temporary database next to `path` and renamed
/// over it once committed; if anything fails the old snapshot is left as is.
pub fn save(path: &Path, state: &SyncState) -> Result<(), SyncError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let tmp = tempfile::Builder::new()
        .prefix(".sync-state")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    {
        let mut conn = Connection::open(tmp.path())?;
        run_migrations(&conn)?;
        let tx = conn.transaction()?;
        for (name, ms) in &state.records {
            tx.execute(
                "INSERT INTO sync_state (playlist_name, last_synced_ms) VALUES (?1, ?2)",
                params![name, ms],
            )?;
        }
        tx.commit()?;
        conn.close().map_err(|(_, e)| e)?;
    }
    tmp.persist(path).map_err(|e| SyncError::Io(e.error))?;
    log::debug!("Saved {} sync records to {}", state.len(), path.display());
    Ok(())
}
