// Spotify Web API metadata provider
//
// Uses the client-credentials flow; the token is cached and refreshed
// transparently when it expires or when the API answers 401.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::downloader::errors::PipelineError;
use crate::downloader::models::{
    CollectionEntry, CollectionKind, CollectionPage, NetworkConfig, PlaylistPage,
    PlaylistSummary, SongRecord,
};
use crate::downloader::traits::MetadataProvider;

pub const API_BASE: &str = "https://api.spotify.com/v1";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

// Refresh a little before the advertised expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpotifyCredentials {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
}

impl SpotifyCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Supplier of bearer tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A valid token; `force_refresh` discards any cached one
    async fn token(&self, force_refresh: bool) -> Result<String, PipelineError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Client-credentials token cache
pub struct ClientCredentialsToken {
    http: reqwest::Client,
    credentials: SpotifyCredentials,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsToken {
    pub fn new(http: reqwest::Client, credentials: SpotifyCredentials) -> Self {
        Self {
            http,
            credentials,
            token_url: TOKEN_URL.to_string(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, PipelineError> {
        debug!("[Spotify] Requesting access token");
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PipelineError::NotFound(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PipelineError::NotFound(format!(
                "Spotify rejected the client credentials ({})",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::NotFound(format!("token response: {}", e)))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_MARGIN);
        Ok(CachedToken {
            value: body.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl TokenSource for ClientCredentialsToken {
    async fn token(&self, force_refresh: bool) -> Result<String, PipelineError> {
        let mut cached = self.cached.lock().await;

        if !force_refresh {
            if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

pub struct SpotifyClient {
    http: reqwest::Client,
    api_base: String,
    tokens: Arc<dyn TokenSource>,
}

impl SpotifyClient {
    pub fn new(http: reqwest::Client, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http,
            api_base: API_BASE.to_string(),
            tokens,
        }
    }

    /// Shared HTTP client honouring the configured proxy
    pub fn build_http(network: &NetworkConfig) -> Result<reqwest::Client, PipelineError> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(proxy_url) = network.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                PipelineError::InvalidInput(format!("invalid proxy {}: {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|e| PipelineError::InvalidInput(format!("HTTP client: {}", e)))
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, PipelineError> {
        let mut force_refresh = false;

        loop {
            let token = self.tokens.token(force_refresh).await?;
            let response = self
                .http
                .get(url)
                .bearer_auth(token)
                .query(query)
                .send()
                .await
                .map_err(|e| PipelineError::NotFound(format!("request to {} failed: {}", url, e)))?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED && !force_refresh {
                warn!("[Spotify] Token rejected, refreshing");
                force_refresh = true;
                continue;
            }
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(PipelineError::NotFound(
                    "Spotify is rate-limiting requests, try again later".to_string(),
                ));
            }
            if !status.is_success() {
                return Err(PipelineError::NotFound(format!("{} returned {}", url, status)));
            }

            return response
                .json()
                .await
                .map_err(|e| PipelineError::NotFound(format!("invalid JSON from {}: {}", url, e)));
        }
    }
}

#[async_trait]
impl MetadataProvider for SpotifyClient {
    fn name(&self) -> &'static str {
        "spotify"
    }

    async fn track(&self, id: &str) -> Result<SongRecord, PipelineError> {
        let url = format!("{}/tracks/{}", self.api_base, id);
        let json = self.get_json(&url, &[]).await?;
        parse_track(&json).ok_or_else(|| PipelineError::NotFound(format!("track {}", id)))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SongRecord>, PipelineError> {
        let url = format!("{}/search", self.api_base);
        let params = [
            ("q", query.to_string()),
            ("type", "track".to_string()),
            ("limit", limit.to_string()),
        ];
        let json = self.get_json(&url, &params).await?;

        let results: Vec<SongRecord> = json["tracks"]["items"]
            .as_array()
            .map(|items| items.iter().filter_map(parse_track).collect())
            .unwrap_or_default();
        info!("[Spotify] {} results for '{}'", results.len(), query);
        Ok(results)
    }

    async fn collection_page(
        &self,
        kind: CollectionKind,
        id: &str,
        cursor: Option<&str>,
    ) -> Result<CollectionPage, PipelineError> {
        if let Some(next) = cursor {
            let json = self.get_json(next, &[]).await?;
            return Ok(parse_collection_page(None, &json));
        }

        let url = match kind {
            CollectionKind::Playlist => format!("{}/playlists/{}", self.api_base, id),
            CollectionKind::Album => format!("{}/albums/{}", self.api_base, id),
            CollectionKind::User => {
                return Err(PipelineError::InvalidInput(
                    "user libraries are listed through user_playlists_page".to_string(),
                ))
            }
        };
        let json = self.get_json(&url, &[]).await?;
        let name = json["name"].as_str().map(str::to_string);
        Ok(parse_collection_page(name, &json["tracks"]))
    }

    async fn user_playlists_page(
        &self,
        user: &str,
        cursor: Option<&str>,
    ) -> Result<PlaylistPage, PipelineError> {
        let json = match cursor {
            Some(next) => self.get_json(next, &[]).await?,
            None => {
                let url = format!("{}/users/{}/playlists", self.api_base, user);
                self.get_json(&url, &[("limit", "50".to_string())]).await?
            }
        };
        Ok(parse_playlist_page(&json))
    }
}

/// Extract the id of a `segment` ("track", "playlist", "album", "user") from an
/// open.spotify.com URL, a `spotify:` URI or a bare id.
pub fn extract_id(raw: &str, segment: &str) -> Option<String> {
    let raw = raw.trim();

    if let Ok(url) = url::Url::parse(raw) {
        if url.scheme() == "spotify" {
            let parts: Vec<&str> = url.path().split(':').collect();
            return id_after(&parts, segment);
        }
        if url.host_str().map_or(false, |h| h.ends_with("spotify.com")) {
            let parts: Vec<&str> = url.path_segments()?.collect();
            return id_after(&parts, segment);
        }
        return None;
    }

    if !raw.is_empty() && raw.chars().all(|c| !c.is_whitespace() && c != '/' && c != ':') {
        return Some(raw.to_string());
    }
    None
}

fn id_after(parts: &[&str], segment: &str) -> Option<String> {
    parts
        .iter()
        .position(|p| *p == segment)
        .and_then(|i| parts.get(i + 1))
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
}

fn parse_track(json: &serde_json::Value) -> Option<SongRecord> {
    let title = json["name"].as_str()?.to_string();
    let album = &json["album"];
    let year = album["release_date"]
        .as_str()
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok());

    Some(SongRecord {
        title,
        artist: json["artists"][0]["name"].as_str().map(str::to_string),
        album: album["name"].as_str().map(str::to_string),
        album_artist: album["artists"][0]["name"].as_str().map(str::to_string),
        duration_secs: (json["duration_ms"].as_u64().unwrap_or(0) + 500) / 1000,
        track_number: json["track_number"].as_u64().map(|n| n as u32),
        total_tracks: album["total_tracks"].as_u64().map(|n| n as u32),
        disc_number: json["disc_number"].as_u64().map(|n| n as u32),
        year,
        position: None,
        cover_url: album["images"][0]["url"].as_str().map(str::to_string),
        provider_url: json["external_urls"]["spotify"].as_str().map(str::to_string),
        video_url: None,
    })
}

// Playlist items wrap the track in {"track": ...}; album items are the track itself
fn parse_collection_page(name: Option<String>, paging: &serde_json::Value) -> CollectionPage {
    let entries = paging["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let track = match item.get("track") {
                        Some(track) if track.is_null() => return None,
                        Some(track) => track,
                        None => item,
                    };
                    Some(CollectionEntry {
                        title: track["name"].as_str()?.to_string(),
                        artist: track["artists"][0]["name"].as_str().map(str::to_string),
                        link: track["external_urls"]["spotify"].as_str().map(str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    CollectionPage {
        name,
        entries,
        next: paging["next"].as_str().map(str::to_string),
    }
}

fn parse_playlist_page(json: &serde_json::Value) -> PlaylistPage {
    let playlists = json["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|p| {
                    Some(PlaylistSummary {
                        id: p["id"].as_str()?.to_string(),
                        name: p["name"].as_str().unwrap_or("Untitled").to_string(),
                        total_tracks: p["tracks"]["total"].as_u64().unwrap_or(0) as u32,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    PlaylistPage {
        playlists,
        next: json["next"].as_str().map(str::to_string),
    }
}
