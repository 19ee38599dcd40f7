//! Fakes para probar el núcleo de reproducción sin Discord ni red.

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::sync::Notify;

use crate::{
    audio::transport::{CompletionNotifier, VoiceConnection, VoiceTransport},
    error::{PlaybackError, ResolutionError},
    sources::{CatalogService, CatalogTrack, ExtractedStream, FlatEntry, StreamingSiteClient},
};

/// Punto de pausa de un solo uso para intercalar comandos con un avance en
/// curso: la primera llamada remota tras `arm()` avisa en `entered()` y espera
/// a `release()`.
#[derive(Default)]
pub struct Gate {
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

/// Conexión que registra lo reproducido. `stop()` dispara el callback de fin
/// igual que songbird al detener un track.
#[derive(Default)]
pub struct FakeConnection {
    plays: Mutex<Vec<String>>,
    notifiers: Mutex<Vec<CompletionNotifier>>,
    moves: Mutex<Vec<ChannelId>>,
    paused: AtomicBool,
    disconnected: AtomicBool,
    fail_next_play: AtomicBool,
}

impl FakeConnection {
    /// Simula el fin natural del track actual
    pub fn finish_current(&self) {
        if let Some(notifier) = self.notifiers.lock().last() {
            notifier.fire();
        }
    }

    pub fn plays(&self) -> Vec<String> {
        self.plays.lock().clone()
    }

    pub fn moves(&self) -> Vec<ChannelId> {
        self.moves.lock().clone()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn fail_next_play(&self) {
        self.fail_next_play.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn move_to(&self, channel_id: ChannelId) -> crate::error::Result<()> {
        self.moves.lock().push(channel_id);
        Ok(())
    }

    async fn play(
        &self,
        stream: &ExtractedStream,
        on_complete: CompletionNotifier,
    ) -> crate::error::Result<()> {
        if self.fail_next_play.swap(false, Ordering::SeqCst) {
            return Err(PlaybackError::Encoding("decoder rejected stream".into()));
        }
        self.plays.lock().push(stream.stream_url.clone());
        self.notifiers.lock().push(on_complete);
        Ok(())
    }

    fn stop(&self) {
        self.finish_current();
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    async fn disconnect(&self) -> crate::error::Result<()> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Transporte que siempre entrega la misma conexión fake
#[derive(Default)]
pub struct FakeTransport {
    connection: Arc<FakeConnection>,
    connects: AtomicUsize,
    fail_next_connect: AtomicBool,
}

impl FakeTransport {
    pub fn connection(&self) -> Arc<FakeConnection> {
        self.connection.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn connect(
        &self,
        _guild_id: GuildId,
        _channel_id: ChannelId,
    ) -> crate::error::Result<Arc<dyn VoiceConnection>> {
        if self.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err(PlaybackError::Transport("missing permissions".into()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connection.disconnected.store(false, Ordering::SeqCst);
        Ok(self.connection.clone())
    }
}

/// Sitio de streaming en memoria
#[derive(Default)]
pub struct FakeSite {
    titles: HashMap<String, String>,
    private: Mutex<HashSet<String>>,
    search: HashMap<String, String>,
    playlists: HashMap<String, Vec<FlatEntry>>,
    gate: Arc<Gate>,
}

impl FakeSite {
    pub fn with_video(mut self, link: &str, title: &str) -> Self {
        self.titles.insert(link.to_string(), title.to_string());
        self
    }

    /// Asocia una búsqueda al id (11 caracteres) de un video conocido
    pub fn with_search(mut self, query: &str, video_id: &str, title: &str) -> Self {
        self.search.insert(query.to_string(), video_id.to_string());
        self.with_video(&watch(video_id), title)
    }

    pub fn with_playlist(mut self, link: &str, entries: Vec<FlatEntry>) -> Self {
        self.playlists.insert(link.to_string(), entries);
        self
    }

    pub fn make_private(&self, link: &str) {
        self.private.lock().insert(link.to_string());
    }

    /// Gate de la extracción completa
    pub fn gate(&self) -> Arc<Gate> {
        self.gate.clone()
    }
}

pub fn watch(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn stream_of(link: &str) -> String {
    format!("stream:{}", link)
}

#[async_trait]
impl StreamingSiteClient for FakeSite {
    async fn extract_full(&self, link: &str) -> std::result::Result<ExtractedStream, ResolutionError> {
        self.gate.pass().await;
        if self.private.lock().contains(link) {
            return Err(ResolutionError::Unavailable(format!("{}: Private video", link)));
        }
        match self.titles.get(link) {
            Some(title) => Ok(ExtractedStream {
                title: title.clone(),
                stream_url: stream_of(link),
            }),
            None => Err(ResolutionError::Failed(format!("unknown link {}", link))),
        }
    }

    async fn extract_flat(&self, playlist_link: &str) -> Result<Vec<FlatEntry>> {
        self.playlists
            .get(playlist_link)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("playlist does not exist"))
    }

    async fn fetch_search_page(&self, query: &str) -> Result<String> {
        Ok(match self.search.get(query) {
            Some(id) => format!(r#"<a href="/watch?v={}">result</a>"#, id),
            None => "<html>no results</html>".to_string(),
        })
    }
}

/// Catálogo de metadata en memoria
#[derive(Default)]
pub struct FakeCatalog {
    tracks: HashMap<String, CatalogTrack>,
    playlists: HashMap<String, (String, Vec<Option<CatalogTrack>>)>,
    gate: Arc<Gate>,
}

impl FakeCatalog {
    pub fn with_track(mut self, link: &str, title: &str, artist: &str) -> Self {
        self.tracks
            .insert(link.to_string(), CatalogTrack::new(title, artist));
        self
    }

    pub fn with_playlist(mut self, id: &str, name: &str, tracks: &[(&str, &str)]) -> Self {
        let tracks = tracks
            .iter()
            .map(|(title, artist)| Some(CatalogTrack::new(*title, *artist)))
            .collect();
        self.playlists.insert(id.to_string(), (name.to_string(), tracks));
        self
    }

    /// Vacía el slot `index` de una playlist ya registrada (archivo local)
    pub fn with_missing_slot(mut self, id: &str, index: usize) -> Self {
        if let Some(slot) = self
            .playlists
            .get_mut(id)
            .and_then(|(_, tracks)| tracks.get_mut(index))
        {
            *slot = None;
        }
        self
    }

    /// Gate de las lecturas de a un track (avance de cursores)
    pub fn gate(&self) -> Arc<Gate> {
        self.gate.clone()
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn get_track(&self, link: &str) -> Result<CatalogTrack> {
        self.tracks
            .get(link)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 Not Found"))
    }

    async fn get_playlist_name(&self, playlist_id: &str) -> Result<String> {
        self.playlists
            .get(playlist_id)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| anyhow::anyhow!("404 Not Found"))
    }

    async fn get_playlist_page(
        &self,
        playlist_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Option<CatalogTrack>>> {
        if limit == 1 {
            self.gate.pass().await;
        }
        let (_, tracks) = self
            .playlists
            .get(playlist_id)
            .ok_or_else(|| anyhow::anyhow!("404 Not Found"))?;
        Ok(tracks.iter().skip(offset).take(limit).cloned().collect())
    }
}
