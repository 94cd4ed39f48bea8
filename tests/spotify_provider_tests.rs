use mockito::{Matcher, Server};
use playlist_upsync::api::spotify::SpotifyProvider;
use playlist_upsync::api::{Provider, TrackResolver};
use playlist_upsync::error::SyncError;
use playlist_upsync::models::TrackId;
use serde_json::json;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

#[test]
fn fetch_tracks_follows_pagination_and_keeps_positions() {
    let mut server = Server::new();
    let base = server.url();

    let _first = server
        .mock("GET", "/playlists/pl1/tracks")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("fields".into(), "items(track(uri)),next".into()),
            Matcher::UrlEncoded("limit".into(), "100".into()),
        ]))
        .match_header("authorization", "Bearer tok")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [
                    { "track": { "uri": "spotify:track:a" } },
                    { "track": null },
                    { "track": { "uri": "spotify:track:b" } }
                ],
                "next": format!("{}/playlists/pl1/tracks?offset=3&limit=100", base)
            })
            .to_string(),
        )
        .create();
    let _second = server
        .mock("GET", "/playlists/pl1/tracks")
        .match_query(Matcher::UrlEncoded("offset".into(), "3".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "items": [ { "track": { "uri": "spotify:track:a" } } ], "next": null }).to_string())
        .create();

    let provider = SpotifyProvider::new("tok".into(), base.clone());
    let tracks = runtime().block_on(provider.fetch_tracks("pl1")).unwrap();
    assert_eq!(
        tracks,
        vec![
            TrackId::from("spotify:track:a"),
            TrackId::unavailable(),
            TrackId::from("spotify:track:b"),
            TrackId::from("spotify:track:a"),
        ]
    );
}

#[test]
fn list_playlists_follows_pagination() {
    let mut server = Server::new();
    let base = server.url();

    let _first = server
        .mock("GET", "/users/someone/playlists")
        .match_query(Matcher::UrlEncoded("limit".into(), "50".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "items": [ { "name": "Road", "id": "p1" } ],
                "next": format!("{}/users/someone/playlists?offset=1&limit=50", base)
            })
            .to_string(),
        )
        .create();
    let _second = server
        .mock("GET", "/users/someone/playlists")
        .match_query(Matcher::UrlEncoded("offset".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "items": [ { "name": "Gym", "id": "p2" } ], "next": null }).to_string())
        .create();

    let provider = SpotifyProvider::new("tok".into(), base.clone());
    let listing = runtime().block_on(provider.list_playlists("someone")).unwrap();
    assert_eq!(
        listing,
        vec![("Road".to_string(), "p1".to_string()), ("Gym".to_string(), "p2".to_string())]
    );
}

#[test]
fn positional_insert_sends_position() {
    let mut server = Server::new();
    let add = server
        .mock("POST", "/playlists/pl1/tracks")
        .match_body(Matcher::Json(json!({ "uris": ["spotify:track:a"], "position": 3 })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(json!({ "snapshot_id": "s1" }).to_string())
        .create();

    let provider = SpotifyProvider::new("tok".into(), server.url());
    runtime()
        .block_on(provider.add_tracks("pl1", &[TrackId::from("spotify:track:a")], Some(3)))
        .unwrap();
    add.assert();
}

#[test]
fn bulk_add_has_no_position() {
    let mut server = Server::new();
    let add = server
        .mock("POST", "/playlists/pl1/tracks")
        .match_body(Matcher::Json(json!({ "uris": ["spotify:track:a", "spotify:track:b"] })))
        .with_status(201)
        .with_body("{}")
        .create();

    let provider = SpotifyProvider::new("tok".into(), server.url());
    let tracks = vec![TrackId::from("spotify:track:a"), TrackId::from("spotify:track:b")];
    runtime().block_on(provider.add_tracks("pl1", &tracks, None)).unwrap();
    add.assert();
}

#[test]
fn removals_send_uris_and_positions() {
    let mut server = Server::new();
    let all = server
        .mock("DELETE", "/playlists/pl1/tracks")
        .match_body(Matcher::Json(json!({ "tracks": [ { "uri": "spotify:track:x" } ] })))
        .with_status(200)
        .with_body("{}")
        .create();
    let positional = server
        .mock("DELETE", "/playlists/pl1/tracks")
        .match_body(Matcher::Json(json!({
            "tracks": [ { "uri": "spotify:track:a", "positions": [4] } ]
        })))
        .with_status(200)
        .with_body("{}")
        .create();

    let provider = SpotifyProvider::new("tok".into(), server.url());
    let rt = runtime();
    rt.block_on(provider.remove_all_occurrences("pl1", &[TrackId::from("spotify:track:x")]))
        .unwrap();
    rt.block_on(provider.remove_at_positions("pl1", &[(TrackId::from("spotify:track:a"), 4)]))
        .unwrap();
    all.assert();
    positional.assert();
}

#[test]
fn create_playlist_returns_id() {
    let mut server = Server::new();
    let _me = server
        .mock("GET", "/me")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "someone" }).to_string())
        .create();
    let _create = server
        .mock("POST", "/users/someone/playlists")
        .match_body(Matcher::Json(json!({ "name": "Road" })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(json!({ "id": "new_id" }).to_string())
        .create();

    let provider = SpotifyProvider::new("tok".into(), server.url());
    let rt = runtime();
    let user = rt.block_on(provider.current_user()).unwrap();
    assert_eq!(user, "someone");
    assert_eq!(rt.block_on(provider.create_playlist(&user, "Road")).unwrap(), "new_id");
}

#[test]
fn search_returns_first_match_or_none() {
    let mut server = Server::new();
    let _hit = server
        .mock("GET", "/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "Artist - Song".into()),
            Matcher::UrlEncoded("type".into(), "track".into()),
            Matcher::UrlEncoded("limit".into(), "1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "tracks": { "items": [ { "uri": "spotify:track:hit" } ] } }).to_string())
        .create();
    let _miss = server
        .mock("GET", "/search")
        .match_query(Matcher::UrlEncoded("q".into(), "nothing".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "tracks": { "items": [] } }).to_string())
        .create();

    let provider = SpotifyProvider::new("tok".into(), server.url());
    let rt = runtime();
    assert_eq!(
        rt.block_on(provider.resolve("Artist - Song")).unwrap(),
        Some(TrackId::from("spotify:track:hit"))
    );
    assert_eq!(rt.block_on(provider.resolve("nothing")).unwrap(), None);
}

#[test]
fn rate_limit_is_transient_with_retry_after() {
    let mut server = Server::new();
    let _m = server
        .mock("POST", "/playlists/pl1/tracks")
        .with_status(429)
        .with_header("retry-after", "7")
        .with_body(r#"{"error":"rate_limited"}"#)
        .create();

    let provider = SpotifyProvider::new("tok".into(), server.url());
    let err = runtime()
        .block_on(provider.add_tracks("pl1", &[TrackId::from("spotify:track:a")], None))
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.retry_after(), Some(7));
}

#[test]
fn status_codes_map_to_error_kinds() {
    let mut server = Server::new();
    let _unauthorized = server.mock("GET", "/me").with_status(401).with_body("expired").create();
    let _server_error = server
        .mock("GET", "/playlists/flaky/tracks")
        .match_query(Matcher::Any)
        .with_status(503)
        .create();
    let _not_found = server
        .mock("GET", "/playlists/gone/tracks")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body("not found")
        .create();

    let provider = SpotifyProvider::new("tok".into(), server.url());
    let rt = runtime();
    assert!(matches!(rt.block_on(provider.current_user()), Err(SyncError::RemoteFatal(_))));
    assert!(rt.block_on(provider.fetch_tracks("flaky")).unwrap_err().is_transient());
    assert!(matches!(
        rt.block_on(provider.fetch_tracks("gone")),
        Err(SyncError::RemoteRejected { status: 404, .. })
    ));
}
