use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque remote track identifier (a Spotify track URI for the real provider).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        TrackId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder for a remote entry whose track is gone. It holds its
    /// position but can be neither matched nor removed.
    pub fn unavailable() -> Self {
        TrackId(String::new())
    }

    pub fn is_unavailable(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        TrackId(s.to_string())
    }
}

/// One line of a local playlist reduced to the name used as a search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub display_name: String,
}

/// The three ordered phases that turn the remote sequence into the local one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationPlan {
    /// Delete every occurrence of these ids. First-encounter order, no repeats.
    pub remove_all: Vec<TrackId>,
    /// Insert each id at its index, applied in order.
    pub insert_at: Vec<(TrackId, usize)>,
    /// Delete the entry at each position, relative to the list after insertion.
    pub remove_at_position: Vec<(TrackId, usize)>,
}

impl MutationPlan {
    pub fn is_empty(&self) -> bool {
        self.remove_all.is_empty() && self.insert_at.is_empty() && self.remove_at_position.is_empty()
    }
}

/// Last synchronized modification time (ms since epoch) of one playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub playlist_name: String,
    pub last_synced_ms: i64,
}

/// Remote playlist name -> id, fetched once per run.
#[derive(Debug, Clone, Default)]
pub struct RemotePlaylists {
    by_name: HashMap<String, String>,
}

impl RemotePlaylists {
    /// Build from the provider listing. The first playlist listed under a name wins.
    pub fn from_listing(listing: Vec<(String, String)>) -> Self {
        let mut by_name = HashMap::new();
        for (name, id) in listing {
            by_name.entry(name).or_insert(id);
        }
        Self { by_name }
    }

    pub fn id_for(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Outcome of one playlist in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistOutcome {
    Unchanged,
    Created { tracks: usize },
    Reconciled { removed: usize, inserted: usize, trimmed: usize },
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub reconciled: Vec<String>,
    pub unchanged: Vec<String>,
    pub failed: Vec<String>,
    pub unresolved_entries: usize,
}
