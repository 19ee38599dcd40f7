pub mod catalog;
pub mod spotify;
pub mod stream;
pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use crate::error::{PlaybackError, ResolutionError};

pub use catalog::{CatalogBridge, UnconfiguredCatalog};
pub use spotify::SpotifyClient;
pub use stream::StreamResolver;
pub use youtube::YtDlpClient;

/// Metadata de un track del catálogo (sin audio reproducible)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub title: String,
    pub artist: String,
}

impl CatalogTrack {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }

    /// Texto de búsqueda para el catálogo de streaming: "<título> <artista>"
    pub fn search_query(&self) -> String {
        format!("{} {}", self.title, self.artist).trim().to_string()
    }
}

/// Stream extraído de un enlace directo: la única fuente de audio decodificable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedStream {
    pub title: String,
    pub stream_url: String,
}

/// Entrada de un listado plano de playlist (sin resolver audio)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub entry_type: Option<String>,
}

/// Servicio de metadata (Spotify o similar)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Obtiene título y artista de un enlace de track
    async fn get_track(&self, link: &str) -> Result<CatalogTrack>;

    /// Nombre visible de una playlist
    async fn get_playlist_name(&self, playlist_id: &str) -> Result<String>;

    /// Página de una playlist, en orden del catálogo. Las posiciones sin
    /// track reproducible (archivos locales, eliminados) vienen como `None`.
    async fn get_playlist_page(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Option<CatalogTrack>>>;
}

/// Cliente del sitio de streaming (YouTube vía yt-dlp)
#[async_trait]
pub trait StreamingSiteClient: Send + Sync {
    /// Extracción completa: título y URL de audio directa
    async fn extract_full(&self, link: &str) -> std::result::Result<ExtractedStream, ResolutionError>;

    /// Listado plano de los miembros de una playlist
    async fn extract_flat(&self, playlist_link: &str) -> Result<Vec<FlatEntry>>;

    /// HTML crudo de la página pública de resultados de búsqueda
    async fn fetch_search_page(&self, query: &str) -> Result<String>;
}

/// Forma de un enlace recibido en /play
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    StreamingVideo(String),
    StreamingPlaylist(String),
    CatalogTrack(String),
    /// Id de la playlist en el catálogo
    CatalogPlaylist(String),
}

/// Clasifica un enlace inspeccionando su URL
pub fn classify_link(link: &str, streaming_base: &str) -> std::result::Result<LinkKind, PlaybackError> {
    let link = link.trim();
    if link.is_empty() {
        return Err(PlaybackError::InvalidLink("falta el enlace".to_string()));
    }

    let lower = link.to_lowercase();
    if lower.contains("open.spotify.com") {
        if lower.contains("/track/") {
            return Ok(LinkKind::CatalogTrack(link.to_string()));
        }
        if lower.contains("/playlist/") {
            let id = path_segment_after(link, "playlist").ok_or_else(|| {
                PlaybackError::InvalidLink("playlist de Spotify sin identificador".to_string())
            })?;
            return Ok(LinkKind::CatalogPlaylist(id));
        }
        return Err(PlaybackError::InvalidLink(
            "indica un enlace de Spotify válido".to_string(),
        ));
    }

    if link.contains("list=") {
        return Ok(LinkKind::StreamingPlaylist(normalize_playlist_link(
            link,
            streaming_base,
        )));
    }

    Ok(LinkKind::StreamingVideo(link.to_string()))
}

/// Reescribe cualquier enlace con `list=` a la forma canónica `<base>playlist?list=<id>`
pub fn normalize_playlist_link(link: &str, streaming_base: &str) -> String {
    let Ok(parsed) = Url::parse(link) else {
        return link.to_string();
    };

    match parsed.query_pairs().find(|(key, _)| key == "list") {
        Some((_, id)) if !id.is_empty() => format!("{}playlist?list={}", streaming_base, id),
        _ => link.to_string(),
    }
}

/// Segmento de ruta que sigue a `marker` (p. ej. el id tras `/playlist/`)
pub(crate) fn path_segment_after(link: &str, marker: &str) -> Option<String> {
    let parsed = Url::parse(link).ok()?;
    let mut segments = parsed.path_segments()?;
    segments.find(|segment| *segment == marker)?;
    segments
        .next()
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
}
