use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{CatalogService, CatalogTrack};
use crate::{
    audio::queue::PlaylistCursor,
    error::{PlaybackError, Result},
};

/// Nombre usado cuando el catálogo no devuelve el de la playlist
pub const UNKNOWN_PLAYLIST_NAME: &str = "Playlist desconocida";

/// Catálogo usado cuando faltan credenciales: toda consulta falla y el error
/// llega al usuario como `CatalogUnavailable`.
pub struct UnconfiguredCatalog;

#[async_trait]
impl CatalogService for UnconfiguredCatalog {
    async fn get_track(&self, _link: &str) -> anyhow::Result<CatalogTrack> {
        anyhow::bail!("credenciales de Spotify no configuradas")
    }

    async fn get_playlist_name(&self, _playlist_id: &str) -> anyhow::Result<String> {
        anyhow::bail!("credenciales de Spotify no configuradas")
    }

    async fn get_playlist_page(
        &self,
        _playlist_id: &str,
        _offset: usize,
        _limit: usize,
    ) -> anyhow::Result<Vec<Option<CatalogTrack>>> {
        anyhow::bail!("credenciales de Spotify no configuradas")
    }
}

/// Playlist del catálogo expandida a metadata, un slot por posición
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedPlaylist {
    pub display_name: String,
    pub tracks: Vec<Option<CatalogTrack>>,
}

impl ExpandedPlaylist {
    /// Tracks que se pueden buscar (sin contar archivos locales ni eliminados)
    pub fn playable(&self) -> usize {
        self.tracks.iter().flatten().count()
    }
}

/// Track leído de un cursor: título visible y texto de búsqueda
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorItem {
    pub title: String,
    pub query: String,
}

impl From<CatalogTrack> for CursorItem {
    fn from(track: CatalogTrack) -> Self {
        Self {
            query: track.search_query(),
            title: track.title,
        }
    }
}

/// Puente hacia el catálogo de metadata.
///
/// No hay caché: cada `peek_or_advance` es una llamada remota en vivo. Quien
/// necesite previsualizar varias veces debe cachear dentro de un mismo comando.
pub struct CatalogBridge {
    service: Arc<dyn CatalogService>,
    page_size: usize,
}

impl CatalogBridge {
    pub fn new(service: Arc<dyn CatalogService>, page_size: usize) -> Self {
        Self {
            service,
            page_size: page_size.max(1),
        }
    }

    pub async fn resolve_track(&self, link: &str) -> Result<CatalogTrack> {
        debug!("🎧 Resolviendo track del catálogo: {}", link);
        self.service
            .get_track(link)
            .await
            .map_err(|e| PlaybackError::CatalogUnavailable(e.to_string()))
    }

    /// Recorre la playlist en lotes de `page_size` hasta recibir un lote vacío.
    /// Cualquier fallo de página aborta la expansión completa.
    pub async fn expand_playlist(&self, playlist_id: &str) -> Result<ExpandedPlaylist> {
        let display_name = match self.service.get_playlist_name(playlist_id).await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => UNKNOWN_PLAYLIST_NAME.to_string(),
            Err(e) => {
                warn!("⚠️ No se pudo obtener el nombre de la playlist {}: {}", playlist_id, e);
                UNKNOWN_PLAYLIST_NAME.to_string()
            }
        };

        let mut tracks = Vec::new();
        let mut offset = 0;
        loop {
            let batch = self
                .service
                .get_playlist_page(playlist_id, offset, self.page_size)
                .await
                .map_err(|e| PlaybackError::CatalogUnavailable(e.to_string()))?;

            if batch.is_empty() {
                break;
            }
            offset += batch.len();
            tracks.extend(batch);
        }

        let playlist = ExpandedPlaylist {
            display_name,
            tracks,
        };
        info!(
            "📋 Playlist '{}' expandida: {} tracks ({} reproducibles)",
            playlist.display_name,
            playlist.tracks.len(),
            playlist.playable()
        );
        Ok(playlist)
    }

    /// Lee el próximo track reproducible desde `cursor.current_index()`. Los
    /// slots vacíos se saltan sin buscarlos. Con `advance`, el cursor queda
    /// después del track leído, o agotado si no quedaba ninguno. `None`
    /// significa cursor agotado.
    pub async fn peek_or_advance(
        &self,
        cursor: &mut PlaylistCursor,
        advance: bool,
    ) -> Result<Option<CursorItem>> {
        let found = self.next_from(cursor).await?;
        if advance {
            match &found {
                Some((index, _)) => cursor.advance_past(*index),
                None => cursor.exhaust(),
            }
        }
        Ok(found.map(|(_, item)| item))
    }

    /// Igual que `peek_or_advance` sin avanzar
    pub async fn peek(&self, cursor: &PlaylistCursor) -> Result<Option<CursorItem>> {
        Ok(self.next_from(cursor).await?.map(|(_, item)| item))
    }

    async fn next_from(&self, cursor: &PlaylistCursor) -> Result<Option<(usize, CursorItem)>> {
        for index in cursor.current_index()..cursor.track_list.len() {
            let page = self
                .service
                .get_playlist_page(&cursor.catalog_playlist_id, index, 1)
                .await
                .map_err(|e| PlaybackError::CatalogUnavailable(e.to_string()))?;

            match page.into_iter().next() {
                Some(Some(track)) => return Ok(Some((index, CursorItem::from(track)))),
                Some(None) => {
                    debug!("Slot {} de '{}' sin track, se salta", index + 1, cursor.display_name)
                }
                // La playlist remota es más corta que la guardada
                None => return Ok(None),
            }
        }
        Ok(None)
    }
}
