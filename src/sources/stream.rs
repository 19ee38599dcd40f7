use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

use super::{ExtractedStream, FlatEntry, StreamingSiteClient};
use crate::{audio::queue::DirectTrack, error::Result};

/// Identificador de video en el HTML de resultados: `/watch?v=<11 caracteres>`
fn watch_id_regex() -> &'static Regex {
    static WATCH_ID: OnceLock<Regex> = OnceLock::new();
    WATCH_ID.get_or_init(|| Regex::new(r"/watch\?v=(.{11})").expect("regex válida"))
}

/// Primer identificador de video encontrado en una página de resultados
pub fn first_watch_id(html: &str) -> Option<&str> {
    watch_id_regex()
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Resuelve búsquedas y enlaces contra el catálogo de streaming
pub struct StreamResolver {
    client: Arc<dyn StreamingSiteClient>,
    base_url: String,
}

impl StreamResolver {
    pub fn new(client: Arc<dyn StreamingSiteClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn watch_url(&self, video_id: &str) -> String {
        format!("{}watch?v={}", self.base_url, video_id)
    }

    /// Busca `text` y devuelve el enlace canónico del primer resultado.
    ///
    /// `None` significa "track no disponible", no un fallo que haya que reintentar.
    /// Un error de red se trata igual y solo se registra.
    pub async fn search_by_query(&self, text: &str) -> Option<String> {
        let html = match self.client.fetch_search_page(text).await {
            Ok(html) => html,
            Err(e) => {
                warn!("⚠️ Búsqueda fallida para '{}': {}", text, e);
                return None;
            }
        };

        match first_watch_id(&html) {
            Some(id) => {
                let link = self.watch_url(id);
                debug!("🔍 '{}' → {}", text, link);
                Some(link)
            }
            None => {
                info!("🔍 Sin resultados para '{}'", text);
                None
            }
        }
    }

    /// Extracción completa de metadata y URL de audio de un enlace conocido
    pub async fn resolve_direct_link(&self, link: &str) -> Result<ExtractedStream> {
        Ok(self.client.extract_full(link).await?)
    }

    /// Listado superficial de una playlist: omite entradas sin id estable o
    /// marcadas como privadas y conserva el orden de origen.
    pub async fn expand_streaming_playlist(&self, link: &str) -> anyhow::Result<Vec<DirectTrack>> {
        let entries = self.client.extract_flat(link).await?;
        Ok(self.playable_entries(entries))
    }

    fn playable_entries(&self, entries: Vec<FlatEntry>) -> Vec<DirectTrack> {
        entries
            .into_iter()
            .filter(|entry| {
                matches!(entry.entry_type.as_deref(), None | Some("url") | Some("video"))
            })
            .filter_map(|entry| {
                let id = entry.id.filter(|id| !id.is_empty())?;
                let title = entry.title.unwrap_or_else(|| "Título desconocido".to_string());
                if title.to_lowercase().contains("private") {
                    return None;
                }
                Some(DirectTrack::new(title, self.watch_url(&id)))
            })
            .collect()
    }
}
