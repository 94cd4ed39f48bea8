use super::{ApiResult, Provider, TrackResolver};
use crate::error::SyncError;
use crate::models::TrackId;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, Response};
use serde_json::{json, Value};

/// Spotify provider backed by the Spotify Web API.
/// Uses a ready-made bearer token; obtaining and refreshing it happens elsewhere.
/// The API base is configurable so tests can point it at a mock server.
pub struct SpotifyProvider {
    client: Client,
    access_token: String,
    api_base: String,
}

impl SpotifyProvider {
    pub fn new(access_token: String, api_base: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn encode_segment(s: &str) -> String {
        url::form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>()
    }

    /// Map a non-2xx response onto the error kinds the worker acts on.
    async fn check(resp: Response, what: &str) -> ApiResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let body = resp.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(SyncError::RemoteFatal(format!("{} failed: {} => {}", what, status, body))),
            429 => Err(SyncError::RemoteTransient {
                message: format!("{} rate limited", what),
                retry_after,
            }),
            _ if status.is_server_error() => Err(SyncError::RemoteTransient {
                message: format!("{} failed: {} => {}", what, status, body),
                retry_after,
            }),
            code => Err(SyncError::RemoteRejected { status: code, body }),
        }
    }

    async fn get_json(&self, url: &str, what: &str) -> ApiResult<Value> {
        let resp = self
            .client
            .get(url)
            .header(AUTHORIZATION, self.bearer())
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let resp = Self::check(resp, what).await?;
        Ok(resp.json().await?)
    }

    async fn delete_tracks(&self, playlist_id: &str, body: Value, what: &str) -> ApiResult<()> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        let resp = self
            .client
            .delete(&url)
            .header(AUTHORIZATION, self.bearer())
            .json(&body)
            .send()
            .await?;
        Self::check(resp, what).await?;
        Ok(())
    }
}

#[async_trait]
impl TrackResolver for SpotifyProvider {
    async fn resolve(&self, query: &str) -> ApiResult<Option<TrackId>> {
        let url = format!(
            "{}/search?q={}&type=track&limit=1",
            self.api_base,
            urlencoding::encode(query)
        );
        let j = self.get_json(&url, "search").await?;
        Ok(j["tracks"]["items"]
            .as_array()
            .and_then(|a| a.first())
            .and_then(|first| first["uri"].as_str())
            .map(TrackId::from))
    }
}

#[async_trait]
impl Provider for SpotifyProvider {
    fn name(&self) -> &str {
        "spotify"
    }

    async fn current_user(&self) -> ApiResult<String> {
        let url = format!("{}/me", self.api_base);
        let j = self.get_json(&url, "fetch /me").await?;
        j["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| SyncError::Other(anyhow::anyhow!("no id in /me response")))
    }

    async fn list_playlists(&self, user: &str) -> ApiResult<Vec<(String, String)>> {
        let mut playlists = Vec::new();
        let mut next_url = Some(format!(
            "{}/users/{}/playlists?limit=50",
            self.api_base,
            Self::encode_segment(user)
        ));
        while let Some(url) = next_url {
            let j = self.get_json(&url, "list playlists").await?;
            if let Some(items) = j["items"].as_array() {
                for pl in items {
                    let name = pl["name"].as_str().unwrap_or("").to_string();
                    let id = pl["id"].as_str().unwrap_or("").to_string();
                    if !id.is_empty() {
                        playlists.push((name, id));
                    }
                }
            }
            next_url = j["next"].as_str().map(|s| s.to_string());
        }
        debug!("Listed {} playlists for {}", playlists.len(), user);
        Ok(playlists)
    }

    async fn create_playlist(&self, user: &str, name: &str) -> ApiResult<String> {
        let url = format!("{}/users/{}/playlists", self.api_base, Self::encode_segment(user));
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer())
            .json(&json!({ "name": name }))
            .send()
            .await?;
        let resp = Self::check(resp, "create playlist").await?;
        let j: Value = resp.json().await?;
        j["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| SyncError::Other(anyhow::anyhow!("no id in create playlist response")))
    }

    async fn fetch_tracks(&self, playlist_id: &str) -> ApiResult<Vec<TrackId>> {
        let mut tracks = Vec::new();
        let mut next: Option<String> = Some(format!(
            "{}/playlists/{}/tracks?fields=items(track(uri)),next&limit=100",
            self.api_base, playlist_id
        ));
        while let Some(url) = next {
            let j = self.get_json(&url, "list playlist tracks").await?;
            if let Some(items) = j["items"].as_array() {
                for it in items {
                    match it["track"]["uri"].as_str() {
                        Some(uri) => tracks.push(TrackId::from(uri)),
                        None => {
                            warn!("Playlist {} has an unavailable entry at position {}", playlist_id, tracks.len());
                            tracks.push(TrackId::unavailable());
                        }
                    }
                }
            }
            next = j["next"].as_str().map(|s| s.to_string());
        }
        Ok(tracks)
    }

    async fn add_tracks(&self, playlist_id: &str, tracks: &[TrackId], position: Option<usize>) -> ApiResult<()> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        let mut body = json!({ "uris": tracks });
        if let Some(p) = position {
            body["position"] = json!(p);
        }
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer())
            .json(&body)
            .send()
            .await?;
        Self::check(resp, "add tracks").await?;
        Ok(())
    }

    async fn remove_all_occurrences(&self, playlist_id: &str, tracks: &[TrackId]) -> ApiResult<()> {
        let entries: Vec<Value> = tracks.iter().map(|t| json!({ "uri": t })).collect();
        self.delete_tracks(playlist_id, json!({ "tracks": entries }), "remove tracks").await
    }

    async fn remove_at_positions(&self, playlist_id: &str, entries: &[(TrackId, usize)]) -> ApiResult<()> {
        let entries: Vec<Value> = entries
            .iter()
            .map(|(t, pos)| json!({ "uri": t, "positions": [pos] }))
            .collect();
        self.delete_tracks(playlist_id, json!({ "tracks": entries }), "remove track positions").await
    }
}
