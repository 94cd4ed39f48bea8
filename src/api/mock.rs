use super::{ApiResult, Provider, TrackResolver};
use crate::error::SyncError;
use crate::models::TrackId;
use async_trait::async_trait;
use log::info;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Remote call as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentUser,
    ListPlaylists,
    CreatePlaylist { name: String },
    FetchTracks { playlist_id: String },
    AddTracks { playlist_id: String, tracks: Vec<TrackId>, position: Option<usize> },
    RemoveAll { playlist_id: String, tracks: Vec<TrackId> },
    RemoveAtPositions { playlist_id: String, entries: Vec<(TrackId, usize)> },
    Resolve { query: String },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::CreatePlaylist { .. }
                | Call::AddTracks { .. }
                | Call::RemoveAll { .. }
                | Call::RemoveAtPositions { .. }
        )
    }

    fn op(&self) -> &'static str {
        match self {
            Call::CurrentUser => "current_user",
            Call::ListPlaylists => "list_playlists",
            Call::CreatePlaylist { .. } => "create_playlist",
            Call::FetchTracks { .. } => "fetch_tracks",
            Call::AddTracks { .. } => "add_tracks",
            Call::RemoveAll { .. } => "remove_all_occurrences",
            Call::RemoveAtPositions { .. } => "remove_at_positions",
            Call::Resolve { .. } => "resolve",
        }
    }
}

/// Failure to inject into the next call(s) of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Transient,
    Fatal,
    Rejected,
}

impl Failure {
    fn to_error(self, op: &str) -> SyncError {
        match self {
            Failure::Transient => SyncError::RemoteTransient {
                message: format!("mock {} unavailable", op),
                retry_after: None,
            },
            Failure::Fatal => SyncError::RemoteFatal(format!("mock {} unauthorized", op)),
            Failure::Rejected => SyncError::RemoteRejected { status: 400, body: format!("mock {} rejected", op) },
        }
    }
}

struct MockPlaylist {
    id: String,
    name: String,
    tracks: Vec<TrackId>,
}

#[derive(Default)]
struct MockState {
    playlists: Vec<MockPlaylist>,
    catalog: HashMap<String, TrackId>,
    calls: Vec<Call>,
    failures: HashMap<&'static str, VecDeque<Failure>>,
    next_id: usize,
}

impl MockState {
    fn record(&mut self, call: Call) -> ApiResult<()> {
        let op = call.op();
        self.calls.push(call);
        match self.failures.get_mut(op).and_then(|q| q.pop_front()) {
            Some(f) => Err(f.to_error(op)),
            None => Ok(()),
        }
    }

    fn playlist_mut(&mut self, playlist_id: &str) -> ApiResult<&mut MockPlaylist> {
        self.playlists
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or_else(|| SyncError::RemoteRejected { status: 404, body: format!("no playlist {}", playlist_id) })
    }
}

/// In-memory remote used in tests. Every mutation is applied to the stored
/// playlists the way the real service applies it, and every call is logged.
pub struct MockProvider {
    user: String,
    state: Mutex<MockState>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            user: "mock-user".into(),
            state: Mutex::new(MockState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `query` resolve to `id`.
    pub fn with_track(self, query: &str, id: &str) -> Self {
        self.lock().catalog.insert(query.to_string(), TrackId::from(id));
        self
    }

    /// Seed a remote playlist and return its id.
    pub fn add_playlist(&self, name: &str, tracks: &[&str]) -> String {
        let mut st = self.lock();
        st.next_id += 1;
        let id = format!("mock-playlist-{}", st.next_id);
        st.playlists.push(MockPlaylist {
            id: id.clone(),
            name: name.to_string(),
            tracks: tracks.iter().map(|t| TrackId::from(*t)).collect(),
        });
        id
    }

    /// Fail the next `times` calls of `op` (a `Provider`/`TrackResolver` method name).
    pub fn fail_next(&self, op: &'static str, failure: Failure, times: usize) {
        let mut st = self.lock();
        let q = st.failures.entry(op).or_default();
        for _ in 0..times {
            q.push_back(failure);
        }
    }

    /// Tracks of the first playlist called `name`.
    pub fn tracks_of(&self, name: &str) -> Option<Vec<String>> {
        self.lock()
            .playlists
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.tracks.iter().map(|t| t.0.clone()).collect())
    }

    pub fn playlist_count(&self, name: &str) -> usize {
        self.lock().playlists.iter().filter(|p| p.name == name).count()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.is_mutation()).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait]
impl TrackResolver for MockProvider {
    async fn resolve(&self, query: &str) -> ApiResult<Option<TrackId>> {
        let mut st = self.lock();
        st.record(Call::Resolve { query: query.to_string() })?;
        Ok(st.catalog.get(query).cloned())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn current_user(&self) -> ApiResult<String> {
        self.lock().record(Call::CurrentUser)?;
        Ok(self.user.clone())
    }

    async fn list_playlists(&self, _user: &str) -> ApiResult<Vec<(String, String)>> {
        let mut st = self.lock();
        st.record(Call::ListPlaylists)?;
        Ok(st.playlists.iter().map(|p| (p.name.clone(), p.id.clone())).collect())
    }

    async fn create_playlist(&self, _user: &str, name: &str) -> ApiResult<String> {
        info!("MockProvider: create_playlist {}", name);
        let mut st = self.lock();
        st.record(Call::CreatePlaylist { name: name.to_string() })?;
        st.next_id += 1;
        let id = format!("mock-playlist-{}", st.next_id);
        st.playlists.push(MockPlaylist { id: id.clone(), name: name.to_string(), tracks: Vec::new() });
        Ok(id)
    }

    async fn fetch_tracks(&self, playlist_id: &str) -> ApiResult<Vec<TrackId>> {
        let mut st = self.lock();
        st.record(Call::FetchTracks { playlist_id: playlist_id.to_string() })?;
        Ok(st.playlist_mut(playlist_id)?.tracks.clone())
    }

    async fn add_tracks(&self, playlist_id: &str, tracks: &[TrackId], position: Option<usize>) -> ApiResult<()> {
        let mut st = self.lock();
        st.record(Call::AddTracks {
            playlist_id: playlist_id.to_string(),
            tracks: tracks.to_vec(),
            position,
        })?;
        let pl = st.playlist_mut(playlist_id)?;
        let at = position.unwrap_or(pl.tracks.len());
        if at > pl.tracks.len() {
            return Err(SyncError::RemoteRejected { status: 400, body: format!("position {} out of range", at) });
        }
        for (k, t) in tracks.iter().enumerate() {
            pl.tracks.insert(at + k, t.clone());
        }
        Ok(())
    }

    async fn remove_all_occurrences(&self, playlist_id: &str, tracks: &[TrackId]) -> ApiResult<()> {
        let mut st = self.lock();
        st.record(Call::RemoveAll { playlist_id: playlist_id.to_string(), tracks: tracks.to_vec() })?;
        let pl = st.playlist_mut(playlist_id)?;
        pl.tracks.retain(|t| !tracks.contains(t));
        Ok(())
    }

    async fn remove_at_positions(&self, playlist_id: &str, entries: &[(TrackId, usize)]) -> ApiResult<()> {
        let mut st = self.lock();
        st.record(Call::RemoveAtPositions { playlist_id: playlist_id.to_string(), entries: entries.to_vec() })?;
        let pl = st.playlist_mut(playlist_id)?;
        for (id, pos) in entries {
            if pl.tracks.get(*pos) != Some(id) {
                return Err(SyncError::RemoteRejected {
                    status: 400,
                    body: format!("{} is not at position {}", id, pos),
                });
            }
        }
        let mut positions: Vec<usize> = entries.iter().map(|(_, p)| *p).collect();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();
        for p in positions {
            pl.tracks.remove(p);
        }
        Ok(())
    }
}
