use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::GuildId;
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, info};

use crate::sources::CatalogTrack;

/// Track listo para reproducir: título y enlace resoluble
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectTrack {
    pub title: String,
    pub playable_ref: String,
}

impl DirectTrack {
    pub fn new(title: impl Into<String>, playable_ref: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            playable_ref: playable_ref.into(),
        }
    }
}

/// Playlist del catálogo sin expandir; avanza de a un track bajo demanda.
///
/// `track_list` guarda un slot por posición del catálogo; los `None` son
/// posiciones sin track reproducible y nunca se buscan.
///
/// Invariante: `current_index <= track_list.len()`. Un cursor agotado se
/// descarta y nunca vuelve a la cola.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistCursor {
    pub catalog_playlist_id: String,
    pub display_name: String,
    pub track_list: Vec<Option<CatalogTrack>>,
    current_index: usize,
}

impl PlaylistCursor {
    pub fn new(
        catalog_playlist_id: impl Into<String>,
        display_name: impl Into<String>,
        track_list: Vec<Option<CatalogTrack>>,
    ) -> Self {
        Self {
            catalog_playlist_id: catalog_playlist_id.into(),
            display_name: display_name.into(),
            track_list,
            current_index: 0,
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.track_list.len()
    }

    /// Deja el cursor justo después de `index`, sin superar el final
    pub(crate) fn advance_past(&mut self, index: usize) {
        self.current_index = index.saturating_add(1).min(self.track_list.len()).max(self.current_index);
    }

    /// Marca el cursor como agotado
    pub(crate) fn exhaust(&mut self) {
        self.current_index = self.track_list.len();
    }

    /// Próximos `limit` tracks reproducibles desde el índice actual, con su
    /// posición en la playlist (base 1)
    pub fn upcoming(&self, limit: usize) -> impl Iterator<Item = (usize, &CatalogTrack)> {
        self.track_list
            .iter()
            .enumerate()
            .skip(self.current_index)
            .filter_map(|(index, slot)| slot.as_ref().map(|track| (index + 1, track)))
            .take(limit)
    }
}

/// Entrada de la cola de un guild
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEntry {
    Direct(DirectTrack),
    Playlist(PlaylistCursor),
}

impl QueueEntry {
    pub fn label(&self) -> &str {
        match self {
            QueueEntry::Direct(track) => &track.title,
            QueueEntry::Playlist(cursor) => &cursor.display_name,
        }
    }
}

impl From<DirectTrack> for QueueEntry {
    fn from(track: DirectTrack) -> Self {
        QueueEntry::Direct(track)
    }
}

impl From<PlaylistCursor> for QueueEntry {
    fn from(cursor: PlaylistCursor) -> Self {
        QueueEntry::Playlist(cursor)
    }
}

type GuildQueue = Arc<Mutex<VecDeque<QueueEntry>>>;

/// Colas FIFO por guild. Se crean al primer uso y viven lo que dure el proceso.
#[derive(Debug, Default)]
pub struct QueueStore {
    queues: DashMap<GuildId, GuildQueue>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copia de la cola actual (vacía si el guild no tiene cola)
    pub fn get(&self, guild_id: GuildId) -> Vec<QueueEntry> {
        match self.queues.get(&guild_id) {
            Some(queue) => queue.lock().iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Agrega al final. Se permiten duplicados.
    pub fn append(&self, guild_id: GuildId, entry: impl Into<QueueEntry>) {
        let entry = entry.into();
        debug!("➕ Agregado a la cola de {}: {}", guild_id, entry.label());
        self.queue(guild_id).lock().push_back(entry);
    }

    /// Agrega varias entradas al final en una sola operación
    pub fn extend(&self, guild_id: GuildId, entries: impl IntoIterator<Item = QueueEntry>) {
        self.queue(guild_id).lock().extend(entries);
    }

    /// Reinserta en la cabeza (cursores de playlist que siguen vivos)
    pub fn push_front(&self, guild_id: GuildId, entry: impl Into<QueueEntry>) {
        self.queue(guild_id).lock().push_front(entry.into());
    }

    /// Extrae la cabeza de forma atómica
    pub fn pop_head(&self, guild_id: GuildId) -> Option<QueueEntry> {
        let queue = self.queues.get(&guild_id)?.clone();
        let entry = queue.lock().pop_front();
        entry
    }

    /// Vacía la cola y devuelve cuántas entradas tenía. Idempotente.
    pub fn clear(&self, guild_id: GuildId) -> usize {
        let Some(queue) = self.queues.get(&guild_id).map(|q| q.clone()) else {
            return 0;
        };
        let mut queue = queue.lock();
        let removed = queue.len();
        queue.clear();
        if removed > 0 {
            info!("🗑️ Cola limpiada en guild {} ({} entradas)", guild_id, removed);
        }
        removed
    }

    fn queue(&self, guild_id: GuildId) -> GuildQueue {
        self.queues
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }
}
