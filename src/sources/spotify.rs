use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{path_segment_after, CatalogService, CatalogTrack};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";
const UNKNOWN_TITLE: &str = "Título desconocido";

/// Cliente del catálogo de Spotify con credenciales de cliente
pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: Option<String>,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistTracksPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

impl PlaylistTracksPage {
    /// Un slot por item; los items sin track conservan su posición como `None`
    fn into_slots(self) -> Vec<Option<CatalogTrack>> {
        self.items
            .into_iter()
            .map(|item| item.track.map(CatalogTrack::from))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistInfo {
    name: Option<String>,
}

impl From<SpotifyTrack> for CatalogTrack {
    fn from(track: SpotifyTrack) -> Self {
        let artist = track
            .artists
            .into_iter()
            .next()
            .and_then(|a| a.name)
            .unwrap_or_default();
        CatalogTrack::new(track.name.unwrap_or_else(|| UNKNOWN_TITLE.to_string()), artist)
    }
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            client_id,
            client_secret,
            token: RwLock::new(None),
        })
    }

    /// Token vigente; se renueva un minuto antes de expirar
    async fn access_token(&self) -> Result<String> {
        let cached = self.token.read().clone();
        if let Some(token) = cached {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token);
            }
        }

        debug!("🔑 Solicitando token de Spotify");
        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", credentials))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body("grant_type=client_credentials")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Respuesta de token de Spotify no válida")?;

        let expires_at = Utc::now() + ChronoDuration::seconds((response.expires_in - 60).max(0));
        *self.token.write() = Some(CachedToken {
            access_token: response.access_token.clone(),
            expires_at,
        });

        info!("✅ Token de Spotify renovado");
        Ok(response.access_token)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let token = self.access_token().await?;
        let value = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl CatalogService for SpotifyClient {
    async fn get_track(&self, link: &str) -> Result<CatalogTrack> {
        let id = path_segment_after(link, "track")
            .ok_or_else(|| anyhow::anyhow!("enlace de track sin identificador: {}", link))?;

        let track: SpotifyTrack = self
            .get_json(&format!("{}/tracks/{}", API_BASE, id), &[])
            .await?;
        Ok(track.into())
    }

    async fn get_playlist_name(&self, playlist_id: &str) -> Result<String> {
        let info: PlaylistInfo = self
            .get_json(
                &format!("{}/playlists/{}", API_BASE, playlist_id),
                &[("fields", "name".to_string())],
            )
            .await?;
        info.name
            .ok_or_else(|| anyhow::anyhow!("playlist {} sin nombre", playlist_id))
    }

    async fn get_playlist_page(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Option<CatalogTrack>>> {
        let page: PlaylistTracksPage = self
            .get_json(
                &format!("{}/playlists/{}/tracks", API_BASE, playlist_id),
                &[
                    ("fields", "items(track(name,artists(name)))".to_string()),
                    ("offset", offset.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        Ok(page.into_slots())
    }
}
