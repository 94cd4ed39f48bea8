pub mod mock;
pub mod spotify;

use crate::error::SyncError;
use crate::models::TrackId;

pub type ApiResult<T> = std::result::Result<T, SyncError>;

/// Free-text lookup of a local entry on the remote service.
#[async_trait::async_trait]
pub trait TrackResolver: Send + Sync {
    /// Return the first match for `query`, or None when nothing matches.
    async fn resolve(&self, query: &str) -> ApiResult<Option<TrackId>>;
}

/// Provider trait: the remote playlist operations the worker needs.
/// Implementations: spotify::SpotifyProvider and mock::MockProvider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Id of the user the credentials belong to.
    async fn current_user(&self) -> ApiResult<String>;

    /// All playlists of `user` as (name, id), following pagination.
    async fn list_playlists(&self, user: &str) -> ApiResult<Vec<(String, String)>>;

    /// Create an empty playlist and return its id.
    async fn create_playlist(&self, user: &str, name: &str) -> ApiResult<String>;

    /// Full ordered track list, duplicates included, following pagination.
    async fn fetch_tracks(&self, playlist_id: &str) -> ApiResult<Vec<TrackId>>;

    /// Add tracks (batching done by caller), appended or starting at `position`.
    async fn add_tracks(&self, playlist_id: &str, tracks: &[TrackId], position: Option<usize>) -> ApiResult<()>;

    /// Remove every occurrence of each track.
    async fn remove_all_occurrences(&self, playlist_id: &str, tracks: &[TrackId]) -> ApiResult<()>;

    /// Remove the entries at the given positions, all relative to the playlist before the call.
    async fn remove_at_positions(&self, playlist_id: &str, entries: &[(TrackId, usize)]) -> ApiResult<()>;

    /// Return the provider's name (for logging)
    fn name(&self) -> &str;
}
