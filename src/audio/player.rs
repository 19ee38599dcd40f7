use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        queue::{DirectTrack, PlaylistCursor, QueueEntry, QueueStore},
        session::{NowPlaying, PlaybackSession},
        transport::{AdvanceReceiver, AdvanceRequest, AdvanceSender, VoiceTransport},
    },
    error::{PlaybackError, ResolutionError, Result},
    sources::{classify_link, CatalogBridge, LinkKind, StreamResolver},
};

/// Parámetros de presentación y límites del reproductor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSettings {
    pub queue_preview_entries: usize,
    pub playlist_preview_tracks: usize,
    pub max_skip: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            queue_preview_entries: 5,
            playlist_preview_tracks: 5,
            max_skip: 100,
        }
    }
}

/// Resultado de agregar un enlace a la cola
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Un video (directo o encontrado a partir de un track del catálogo)
    Track(DirectTrack),
    /// Playlist del sitio de streaming; `added` puede ser 0
    StreamingPlaylist { added: usize },
    /// Playlist del catálogo; con 0 tracks no se agrega nada
    CatalogPlaylist { name: String, tracks: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayReport {
    pub enqueued: EnqueueOutcome,
    /// Canción que empezó a sonar a raíz de este comando
    pub started: Option<NowPlaying>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipReport {
    pub skipped: Vec<String>,
    pub next: Option<String>,
}

/// Fila de la vista de cola
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRow {
    /// Posición de la entrada en la cola; los tracks de una playlist
    /// comparten la de su cursor
    pub position: usize,
    /// Número del track dentro de su playlist
    pub track_number: Option<usize>,
    pub title: String,
    pub artist: Option<String>,
    pub link: Option<String>,
    pub playlist: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueView {
    pub now_playing: Option<NowPlaying>,
    pub rows: Vec<QueueRow>,
    pub total_entries: usize,
}

impl QueueView {
    pub fn is_empty(&self) -> bool {
        self.now_playing.is_none() && self.rows.is_empty()
    }
}

/// Orquestador de reproducción: une colas, sesiones de voz y resolución de
/// fuentes.
///
/// El avance de un guild (`play_next`, `skip`) se serializa con un lock por
/// guild; guilds distintos nunca se bloquean entre sí. Pausa, reanudación y
/// vista de cola solo toman el lock de la sesión.
pub struct PlaybackOrchestrator {
    queues: QueueStore,
    sessions: DashMap<GuildId, Arc<Mutex<PlaybackSession>>>,
    advance_locks: DashMap<GuildId, Arc<Mutex<()>>>,
    /// Desconexiones pedidas por nosotros cuyo eco del gateway aún no llegó
    expected_disconnects: DashMap<GuildId, usize>,
    catalog: CatalogBridge,
    resolver: StreamResolver,
    transport: Arc<dyn VoiceTransport>,
    advance_tx: AdvanceSender,
    settings: PlayerSettings,
}

impl PlaybackOrchestrator {
    pub fn new(
        catalog: CatalogBridge,
        resolver: StreamResolver,
        transport: Arc<dyn VoiceTransport>,
        settings: PlayerSettings,
    ) -> (Self, AdvanceReceiver) {
        let (advance_tx, advance_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            queues: QueueStore::new(),
            sessions: DashMap::new(),
            advance_locks: DashMap::new(),
            expected_disconnects: DashMap::new(),
            catalog,
            resolver,
            transport,
            advance_tx,
            settings,
        };
        (orchestrator, advance_rx)
    }

    /// Consume las notificaciones de fin; cada una avanza en su propia tarea
    pub async fn run_advance_loop(self: Arc<Self>, mut advance_rx: AdvanceReceiver) {
        info!("🔁 Bucle de avance iniciado");
        while let Some(request) = advance_rx.recv().await {
            let orchestrator = self.clone();
            tokio::spawn(async move {
                orchestrator.handle_completion(request).await;
            });
        }
        info!("🔁 Bucle de avance terminado");
    }

    /// Aplica una notificación de fin y avanza si sigue vigente
    pub async fn handle_completion(&self, request: AdvanceRequest) -> Option<NowPlaying> {
        let session = self.session(request.guild_id);
        if !session.lock().await.complete(request.generation) {
            return None;
        }
        self.play_next(request.guild_id).await
    }

    /// `/play`: se asegura de estar conectado, agrega el enlace y arranca la
    /// reproducción si no había nada sonando. Si la conexión falla la cola no
    /// se toca.
    pub async fn play(
        &self,
        guild_id: GuildId,
        voice_channel: Option<ChannelId>,
        link: &str,
    ) -> Result<PlayReport> {
        let channel_id = voice_channel.ok_or(PlaybackError::NoVoiceChannel)?;
        // Un enlace inválido se rechaza sin entrar al canal
        classify_link(link, self.resolver.base_url())?;

        let session = self.session(guild_id);
        let playing = {
            let mut session = session.lock().await;
            if !session.is_playing() {
                session.connect(self.transport.as_ref(), channel_id).await?;
            }
            session.is_playing()
        };

        let enqueued = self.enqueue(guild_id, Some(channel_id), link).await?;
        let started = if playing {
            None
        } else {
            self.play_next(guild_id).await
        };

        Ok(PlayReport { enqueued, started })
    }

    /// Clasifica el enlace y agrega lo que corresponda a la cola del guild.
    /// Los errores de validación ocurren antes de modificar la cola.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        voice_channel: Option<ChannelId>,
        link: &str,
    ) -> Result<EnqueueOutcome> {
        if voice_channel.is_none() {
            return Err(PlaybackError::NoVoiceChannel);
        }

        match classify_link(link, self.resolver.base_url())? {
            LinkKind::StreamingVideo(link) => self.enqueue_video(guild_id, link).await,
            LinkKind::StreamingPlaylist(playlist_link) => {
                let listed = self.resolver.expand_streaming_playlist(&playlist_link).await;
                match listed {
                    Ok(tracks) if !tracks.is_empty() => {
                        let added = tracks.len();
                        self.queues
                            .extend(guild_id, tracks.into_iter().map(QueueEntry::from));
                        info!("📋 {} videos agregados a la cola de {}", added, guild_id);
                        Ok(EnqueueOutcome::StreamingPlaylist { added })
                    }
                    // Mix o playlist ilegible dentro de un enlace de video: se toma el video
                    _ if has_video_id(link) => {
                        debug!("Playlist sin entradas, se agrega el video: {}", link);
                        self.enqueue_video(guild_id, link.trim().to_string()).await
                    }
                    Ok(_) => Ok(EnqueueOutcome::StreamingPlaylist { added: 0 }),
                    Err(e) => Err(ResolutionError::Failed(e.to_string()).into()),
                }
            }
            LinkKind::CatalogTrack(link) => {
                let metadata = self.catalog.resolve_track(&link).await?;
                let query = metadata.search_query();
                let found = self
                    .resolver
                    .search_by_query(&query)
                    .await
                    .ok_or(PlaybackError::NoResult(query))?;
                let stream = self.resolver.resolve_direct_link(&found).await?;
                let track = DirectTrack::new(stream.title, found);
                self.queues.append(guild_id, track.clone());
                Ok(EnqueueOutcome::Track(track))
            }
            LinkKind::CatalogPlaylist(id) => {
                let playlist = self.catalog.expand_playlist(&id).await?;
                let tracks = playlist.playable();
                if tracks > 0 {
                    self.queues.append(
                        guild_id,
                        PlaylistCursor::new(id, playlist.display_name.clone(), playlist.tracks),
                    );
                }
                Ok(EnqueueOutcome::CatalogPlaylist {
                    name: playlist.display_name,
                    tracks,
                })
            }
        }
    }

    async fn enqueue_video(&self, guild_id: GuildId, link: String) -> Result<EnqueueOutcome> {
        let stream = self.resolver.resolve_direct_link(&link).await?;
        let track = DirectTrack::new(stream.title, link);
        self.queues.append(guild_id, track.clone());
        Ok(EnqueueOutcome::Track(track))
    }

    /// Saca entradas de la cola hasta lograr reproducir una. Los tracks sin
    /// resultado, privados o que fallan al reproducirse se descartan en
    /// silencio. No hace nada si ya hay algo sonando o no hay conexión.
    ///
    /// `epoch` es la generación de la sesión al empezar; si un `/stop` la
    /// cambia, el avance se abandona sin tocar la cola ya vaciada.
    pub async fn play_next(&self, guild_id: GuildId) -> Option<NowPlaying> {
        let advance_lock = self.advance_lock(guild_id);
        let _advancing = advance_lock.lock().await;

        let session = self.session(guild_id);
        let mut epoch = {
            let session = session.lock().await;
            if session.is_playing() {
                return None;
            }
            if !session.is_connected() {
                debug!("Guild {} sin conexión de voz, no se avanza", guild_id);
                return None;
            }
            session.generation()
        };

        loop {
            // Se extrae bajo el lock de la sesión para no cruzarse con `stop`
            let entry = {
                let session = session.lock().await;
                if session.generation() != epoch {
                    info!("⏹️ Sesión detenida durante el avance en guild {}", guild_id);
                    return None;
                }
                self.queues.pop_head(guild_id)
            };
            let Some(entry) = entry else {
                break;
            };
            let Some(track) = self.next_playable(guild_id, entry, epoch).await else {
                continue;
            };

            let stream = match self.resolver.resolve_direct_link(&track.playable_ref).await {
                Ok(stream) => stream,
                Err(e) if e.is_unavailable() => {
                    info!("⏭️ Track no disponible, se omite: {}", track.title);
                    continue;
                }
                Err(e) => {
                    warn!("⚠️ No se pudo resolver '{}': {}", track.title, e);
                    continue;
                }
            };

            let mut session = session.lock().await;
            if session.generation() != epoch {
                info!("⏹️ Sesión detenida durante el avance en guild {}", guild_id);
                return None;
            }

            let now = NowPlaying {
                title: track.title,
                playable_ref: track.playable_ref,
            };
            match session.start_playback(now.clone(), &stream, &self.advance_tx).await {
                Ok(()) => return Some(now),
                Err(PlaybackError::NotConnected) => return None,
                Err(e) => {
                    error!("❌ Error al reproducir '{}': {}", now.title, e);
                    epoch = session.generation();
                }
            }
        }

        debug!("Cola vacía para guild {}", guild_id);
        None
    }

    /// Convierte la entrada extraída en un track directo. Un cursor que sigue
    /// vivo vuelve a la cabeza antes de buscar.
    async fn next_playable(
        &self,
        guild_id: GuildId,
        entry: QueueEntry,
        epoch: u64,
    ) -> Option<DirectTrack> {
        let mut cursor = match entry {
            QueueEntry::Direct(track) => return Some(track),
            QueueEntry::Playlist(cursor) => cursor,
        };

        let item = match self.catalog.peek_or_advance(&mut cursor, true).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                debug!("📋 Playlist '{}' terminada", cursor.display_name);
                return None;
            }
            Err(e) => {
                warn!("⚠️ Se descarta la playlist '{}': {}", cursor.display_name, e);
                return None;
            }
        };

        if !cursor.is_exhausted() && !self.requeue_cursor(guild_id, cursor, epoch).await {
            return None;
        }

        match self.resolver.search_by_query(&item.query).await {
            Some(link) => Some(DirectTrack::new(item.title, link)),
            None => {
                info!("⏭️ Sin resultado para '{}', se omite", item.title);
                None
            }
        }
    }

    /// Devuelve un cursor vivo a la cabeza, salvo que la sesión se haya
    /// detenido desde `epoch`. La comprobación y la inserción ocurren bajo el
    /// lock de la sesión, el mismo que toma `stop` para vaciar la cola.
    async fn requeue_cursor(&self, guild_id: GuildId, cursor: PlaylistCursor, epoch: u64) -> bool {
        let session = self.session(guild_id);
        let session = session.lock().await;
        if session.generation() != epoch {
            debug!("Sesión detenida, se descarta la playlist '{}'", cursor.display_name);
            return false;
        }
        self.queues.push_front(guild_id, cursor);
        true
    }

    /// Descarta `amount - 1` entradas y corta la canción actual; el callback
    /// de fin reproduce la siguiente.
    pub async fn skip(&self, guild_id: GuildId, amount: i64) -> Result<SkipReport> {
        if amount < 1 {
            return Err(PlaybackError::InvalidAmount(amount));
        }
        let amount = usize::try_from(amount)
            .unwrap_or(usize::MAX)
            .min(self.settings.max_skip.max(1));

        let advance_lock = self.advance_lock(guild_id);
        let advancing = advance_lock.lock().await;

        let session = self.session(guild_id);
        let epoch = {
            let session = session.lock().await;
            if !session.is_playing() {
                return Err(PlaybackError::NothingPlaying);
            }
            session.generation()
        };

        let mut skipped = Vec::new();
        while skipped.len() < amount - 1 {
            let entry = {
                let session = session.lock().await;
                if session.generation() != epoch {
                    info!("⏹️ Sesión detenida durante el skip en guild {}", guild_id);
                    break;
                }
                self.queues.pop_head(guild_id)
            };
            let Some(entry) = entry else {
                break;
            };
            match entry {
                QueueEntry::Direct(track) => skipped.push(track.title),
                QueueEntry::Playlist(mut cursor) => {
                    match self.catalog.peek_or_advance(&mut cursor, true).await {
                        Ok(Some(item)) => {
                            skipped.push(item.title);
                            if !cursor.is_exhausted() {
                                self.requeue_cursor(guild_id, cursor, epoch).await;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!("⚠️ Se descarta la playlist '{}': {}", cursor.display_name, e);
                        }
                    }
                }
            }
        }

        let next = self.peek_next_title(guild_id).await;
        drop(advancing);

        session.lock().await.halt();
        info!("⏭️ Skip en guild {}: {} descartadas", guild_id, skipped.len());
        Ok(SkipReport { skipped, next })
    }

    /// Título de lo próximo que sonaría, sin avanzar ningún cursor
    async fn peek_next_title(&self, guild_id: GuildId) -> Option<String> {
        match self.queues.get(guild_id).into_iter().next()? {
            QueueEntry::Direct(track) => Some(track.title),
            QueueEntry::Playlist(cursor) => match self.catalog.peek(&cursor).await {
                Ok(item) => item.map(|item| item.title),
                Err(e) => {
                    warn!("⚠️ No se pudo consultar la playlist '{}': {}", cursor.display_name, e);
                    None
                }
            },
        }
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<()> {
        self.session(guild_id).lock().await.pause()
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<()> {
        self.session(guild_id).lock().await.resume()
    }

    /// Vacía la cola, corta la reproducción y desconecta. Devuelve si había
    /// algo que detener.
    pub async fn stop(&self, guild_id: GuildId) -> bool {
        self.shut_down(guild_id, true).await
    }

    /// El gateway informa que el bot quedó fuera del canal de voz. Los ecos
    /// de desconexiones propias se descartan; cualquier otra salida (expulsión,
    /// canal borrado) limpia la sesión igual que `/stop`.
    pub async fn handle_voice_disconnect(&self, guild_id: GuildId) -> bool {
        if let Some(mut pending) = self.expected_disconnects.get_mut(&guild_id) {
            if *pending > 0 {
                *pending -= 1;
                debug!("Eco de desconexión propia en guild {}, se ignora", guild_id);
                return false;
            }
        }
        self.shut_down(guild_id, false).await
    }

    async fn shut_down(&self, guild_id: GuildId, requested: bool) -> bool {
        let session = self.session(guild_id);
        let mut session = session.lock().await;
        let cleared = self.queues.clear(guild_id);
        let was_connected = session.stop().await;
        if was_connected && requested {
            *self.expected_disconnects.entry(guild_id).or_insert(0) += 1;
        }
        was_connected || cleared > 0
    }

    /// Vacía la cola sin tocar la canción actual
    pub async fn clear_queue(&self, guild_id: GuildId) -> Result<usize> {
        match self.queues.clear(guild_id) {
            0 => Err(PlaybackError::NothingQueued),
            removed => Ok(removed),
        }
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<NowPlaying> {
        self.session(guild_id).lock().await.now_playing().cloned()
    }

    /// Vista de la cola sin llamadas remotas: los tracks de playlist salen de
    /// la lista guardada en el cursor.
    pub async fn queue_view(&self, guild_id: GuildId) -> QueueView {
        let now_playing = self.now_playing(guild_id).await;
        let entries = self.queues.get(guild_id);

        let mut rows = Vec::new();
        for (index, entry) in entries
            .iter()
            .take(self.settings.queue_preview_entries)
            .enumerate()
        {
            let position = index + 1;
            match entry {
                QueueEntry::Direct(track) => rows.push(QueueRow {
                    position,
                    track_number: None,
                    title: track.title.clone(),
                    artist: None,
                    link: Some(track.playable_ref.clone()),
                    playlist: None,
                }),
                QueueEntry::Playlist(cursor) => {
                    rows.extend(cursor.upcoming(self.settings.playlist_preview_tracks).map(
                        |(track_number, track)| QueueRow {
                            position,
                            track_number: Some(track_number),
                            title: track.title.clone(),
                            artist: Some(track.artist.clone()),
                            link: None,
                            playlist: Some(cursor.display_name.clone()),
                        },
                    ))
                }
            }
        }

        QueueView {
            now_playing,
            rows,
            total_entries: entries.len(),
        }
    }

    fn session(&self, guild_id: GuildId) -> Arc<Mutex<PlaybackSession>> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(PlaybackSession::new(guild_id))))
            .clone()
    }

    fn advance_lock(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.advance_locks
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn has_video_id(link: &str) -> bool {
    url::Url::parse(link.trim())
        .map(|parsed| parsed.query_pairs().any(|(key, value)| key == "v" && !value.is_empty()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            session::SessionState,
            testing::{stream_of, watch, FakeCatalog, FakeSite, FakeTransport},
        },
        sources::FlatEntry,
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const GUILD: GuildId = GuildId::new(1);
    const CHANNEL: ChannelId = ChannelId::new(10);
    const BASE: &str = "https://www.youtube.com/";

    struct Harness {
        player: PlaybackOrchestrator,
        advance_rx: AdvanceReceiver,
        transport: Arc<FakeTransport>,
    }

    impl Harness {
        fn new(catalog: FakeCatalog, site: FakeSite) -> Self {
            Self::with_settings(catalog, site, PlayerSettings::default())
        }

        fn with_settings(catalog: FakeCatalog, site: FakeSite, settings: PlayerSettings) -> Self {
            let transport = Arc::new(FakeTransport::default());
            let (player, advance_rx) = PlaybackOrchestrator::new(
                CatalogBridge::new(Arc::new(catalog), 10),
                StreamResolver::new(Arc::new(site), BASE),
                transport.clone(),
                settings,
            );
            Self {
                player,
                advance_rx,
                transport,
            }
        }

        /// Simula el fin de la canción y procesa la notificación resultante
        async fn finish_current(&mut self) -> Option<NowPlaying> {
            self.transport.connection().finish_current();
            let request = self.advance_rx.try_recv().expect("completion request");
            self.player.handle_completion(request).await
        }

        async fn state(&self) -> SessionState {
            self.player.session(GUILD).lock().await.state()
        }

        fn titles(&self) -> Vec<String> {
            self.player
                .queues
                .get(GUILD)
                .iter()
                .map(|entry| entry.label().to_string())
                .collect()
        }
    }

    fn videos(names: &[&str]) -> FakeSite {
        names.iter().fold(FakeSite::default(), |site, name| {
            site.with_video(&video_link(name), name)
        })
    }

    fn video_link(name: &str) -> String {
        watch(&format!("{:_<11}", name))
    }

    #[tokio::test]
    async fn play_starts_first_track_and_queues_the_rest() {
        let harness = Harness::new(FakeCatalog::default(), videos(&["A", "B"]));

        let first = harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("A"))
            .await
            .unwrap();
        let second = harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("B"))
            .await
            .unwrap();

        assert_eq!(first.started.map(|now| now.title), Some("A".to_string()));
        assert_eq!(second.started, None);
        assert_eq!(
            second.enqueued,
            EnqueueOutcome::Track(DirectTrack::new("B", video_link("B")))
        );
        assert_eq!(harness.titles(), vec!["B"]);
        assert_eq!(
            harness.transport.connection().plays(),
            vec![stream_of(&video_link("A"))]
        );
    }

    #[tokio::test]
    async fn enqueue_without_voice_channel_leaves_queue_untouched() {
        let harness = Harness::new(FakeCatalog::default(), videos(&["A"]));

        let err = harness
            .player
            .play(GUILD, None, &video_link("A"))
            .await
            .unwrap_err();

        assert_eq!(err, PlaybackError::NoVoiceChannel);
        assert!(harness.titles().is_empty());
        assert_eq!(harness.transport.connect_count(), 0);
    }

    #[tokio::test]
    async fn catalog_track_without_match_reports_no_result() {
        let catalog = FakeCatalog::default().with_track(
            "https://open.spotify.com/track/t1",
            "Ghost",
            "Nobody",
        );
        let harness = Harness::new(catalog, FakeSite::default());

        let err = harness
            .player
            .enqueue(GUILD, Some(CHANNEL), "https://open.spotify.com/track/t1")
            .await
            .unwrap_err();

        assert_eq!(err, PlaybackError::NoResult("Ghost Nobody".to_string()));
        assert!(harness.titles().is_empty());
    }

    #[tokio::test]
    async fn catalog_track_is_queued_under_the_found_video() {
        let catalog = FakeCatalog::default().with_track(
            "https://open.spotify.com/track/t1",
            "Song1",
            "ArtistX",
        );
        let site = FakeSite::default().with_search("Song1 ArtistX", "song1______", "Song1 (Official)");
        let harness = Harness::new(catalog, site);

        let outcome = harness
            .player
            .enqueue(GUILD, Some(CHANNEL), "https://open.spotify.com/track/t1")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EnqueueOutcome::Track(DirectTrack::new("Song1 (Official)", watch("song1______")))
        );
    }

    #[tokio::test]
    async fn queue_view_lists_entries_in_fifo_order() {
        let catalog = FakeCatalog::default().with_playlist(
            "pl1",
            "Road Trip",
            &[("S1", "X"), ("S2", "Y"), ("S3", "Z")],
        );
        let harness = Harness::new(catalog, videos(&["A", "B"]));

        for link in [
            video_link("A"),
            "https://open.spotify.com/playlist/pl1".to_string(),
            video_link("B"),
        ] {
            harness.player.enqueue(GUILD, Some(CHANNEL), &link).await.unwrap();
        }

        let view = harness.player.queue_view(GUILD).await;
        let rows: Vec<_> = view
            .rows
            .iter()
            .map(|row| (row.position, row.track_number, row.title.as_str(), row.playlist.as_deref()))
            .collect();

        assert_eq!(view.now_playing, None);
        assert_eq!(view.total_entries, 3);
        assert_eq!(
            rows,
            vec![
                (1, None, "A", None),
                (2, Some(1), "S1", Some("Road Trip")),
                (2, Some(2), "S2", Some("Road Trip")),
                (2, Some(3), "S3", Some("Road Trip")),
                (3, None, "B", None),
            ]
        );
        // La vista no avanza el cursor
        assert_eq!(harness.player.queue_view(GUILD).await, view);
    }

    #[tokio::test]
    async fn skip_drops_entries_and_reports_next() {
        let mut harness = Harness::new(FakeCatalog::default(), videos(&["A", "B", "C", "D"]));
        for name in ["A", "B", "C", "D"] {
            harness
                .player
                .play(GUILD, Some(CHANNEL), &video_link(name))
                .await
                .unwrap();
        }

        let report = harness.player.skip(GUILD, 3).await.unwrap();

        assert_eq!(
            report,
            SkipReport {
                skipped: vec!["B".to_string(), "C".to_string()],
                next: Some("D".to_string()),
            }
        );
        assert_eq!(harness.titles(), vec!["D"]);

        // El corte dispara la notificación de fin y suena D
        let request = harness.advance_rx.try_recv().unwrap();
        let next = harness.player.handle_completion(request).await;
        assert_eq!(next.map(|now| now.title), Some("D".to_string()));
    }

    #[tokio::test]
    async fn skip_rejects_bad_amounts_and_idle_sessions() {
        let harness = Harness::new(FakeCatalog::default(), videos(&["A"]));

        assert_eq!(
            harness.player.skip(GUILD, 0).await,
            Err(PlaybackError::InvalidAmount(0))
        );
        assert_eq!(
            harness.player.skip(GUILD, 1).await,
            Err(PlaybackError::NothingPlaying)
        );
    }

    #[tokio::test]
    async fn skip_consumes_tracks_inside_a_playlist() {
        let catalog = FakeCatalog::default().with_playlist(
            "pl1",
            "Mix",
            &[("S1", "X"), ("S2", "X"), ("S3", "X")],
        );
        let harness = Harness::new(catalog, videos(&["A"]));
        harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("A"))
            .await
            .unwrap();
        harness
            .player
            .enqueue(GUILD, Some(CHANNEL), "https://open.spotify.com/playlist/pl1")
            .await
            .unwrap();

        let report = harness.player.skip(GUILD, 3).await.unwrap();

        assert_eq!(report.skipped, vec!["S1", "S2"]);
        assert_eq!(report.next, Some("S3".to_string()));
        match harness.player.queues.get(GUILD).first() {
            Some(QueueEntry::Playlist(cursor)) => assert_eq!(cursor.current_index(), 2),
            other => panic!("expected cursor at head, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn playlist_track_without_match_is_skipped_silently() {
        let catalog =
            FakeCatalog::default().with_playlist("pl1", "Mix", &[("Song1", "ArtistX"), ("Song2", "ArtistX")]);
        let site = FakeSite::default().with_search("Song1 ArtistX", "song1______", "Song1");
        let mut harness = Harness::new(catalog, site);

        let report = harness
            .player
            .play(GUILD, Some(CHANNEL), "https://open.spotify.com/playlist/pl1")
            .await
            .unwrap();
        assert_eq!(
            report.enqueued,
            EnqueueOutcome::CatalogPlaylist {
                name: "Mix".to_string(),
                tracks: 2
            }
        );
        assert_eq!(report.started.map(|now| now.title), Some("Song1".to_string()));

        assert_eq!(harness.finish_current().await, None);
        assert!(harness.titles().is_empty());
        assert_eq!(
            harness.state().await,
            SessionState::ConnectedIdle
        );
        assert_eq!(harness.transport.connection().plays().len(), 1);
    }

    #[tokio::test]
    async fn empty_catalog_playlist_adds_nothing() {
        let catalog = FakeCatalog::default().with_playlist("pl1", "Empty", &[]);
        let harness = Harness::new(catalog, FakeSite::default());

        let outcome = harness
            .player
            .enqueue(GUILD, Some(CHANNEL), "https://open.spotify.com/playlist/pl1")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EnqueueOutcome::CatalogPlaylist {
                name: "Empty".to_string(),
                tracks: 0
            }
        );
        assert!(harness.titles().is_empty());
    }

    #[tokio::test]
    async fn all_private_queue_terminates_empty() {
        let entries = ["p1", "p2", "p3"]
            .iter()
            .map(|id| FlatEntry {
                id: Some(format!("{:_<11}", id)),
                title: Some(id.to_string()),
                entry_type: Some("url".to_string()),
            })
            .collect();
        let site = FakeSite::default().with_playlist("https://www.youtube.com/playlist?list=PL1", entries);
        for id in ["p1", "p2", "p3"] {
            site.make_private(&video_link(id));
        }
        let harness = Harness::new(FakeCatalog::default(), site);

        let report = harness
            .player
            .play(GUILD, Some(CHANNEL), "https://www.youtube.com/watch?v=x&list=PL1")
            .await
            .unwrap();

        assert_eq!(report.enqueued, EnqueueOutcome::StreamingPlaylist { added: 3 });
        assert_eq!(report.started, None);
        assert!(harness.titles().is_empty());
        assert_eq!(
            harness.state().await,
            SessionState::ConnectedIdle
        );
    }

    #[tokio::test]
    async fn unlisted_mix_falls_back_to_the_video() {
        let link = format!("{}&list=RDmix", video_link("A"));
        let site = FakeSite::default()
            .with_video(&link, "A")
            .with_playlist("https://www.youtube.com/playlist?list=RDmix", vec![]);
        let harness = Harness::new(FakeCatalog::default(), site);

        let outcome = harness.player.enqueue(GUILD, Some(CHANNEL), &link).await.unwrap();

        assert_eq!(outcome, EnqueueOutcome::Track(DirectTrack::new("A", link)));
    }

    #[tokio::test]
    async fn track_that_fails_to_play_is_skipped() {
        let harness = Harness::new(FakeCatalog::default(), videos(&["A", "B"]));
        harness
            .player
            .enqueue(GUILD, Some(CHANNEL), &video_link("A"))
            .await
            .unwrap();
        harness.transport.connection().fail_next_play();

        let report = harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("B"))
            .await
            .unwrap();

        assert_eq!(report.started.map(|now| now.title), Some("B".to_string()));
        assert_eq!(
            harness.transport.connection().plays(),
            vec![stream_of(&video_link("B"))]
        );
    }

    #[tokio::test]
    async fn stop_clears_everything_and_allows_a_fresh_start() {
        let mut harness = Harness::new(FakeCatalog::default(), videos(&["A", "B", "C"]));
        for name in ["A", "B"] {
            harness
                .player
                .play(GUILD, Some(CHANNEL), &video_link(name))
                .await
                .unwrap();
        }

        assert!(harness.player.stop(GUILD).await);

        assert_eq!(harness.player.queue_view(GUILD).await, QueueView::default());
        assert_eq!(harness.state().await, SessionState::Idle);
        assert!(harness.transport.connection().is_disconnected());

        // La notificación que dispara el corte ya no avanza nada
        let stale = harness.advance_rx.try_recv().unwrap();
        assert_eq!(harness.player.handle_completion(stale).await, None);

        let report = harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("C"))
            .await
            .unwrap();
        assert_eq!(report.started.map(|now| now.title), Some("C".to_string()));
        assert_eq!(harness.transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn clear_queue_keeps_current_song() {
        let harness = Harness::new(FakeCatalog::default(), videos(&["A", "B"]));
        assert_eq!(
            harness.player.clear_queue(GUILD).await,
            Err(PlaybackError::NothingQueued)
        );

        for name in ["A", "B"] {
            harness
                .player
                .play(GUILD, Some(CHANNEL), &video_link(name))
                .await
                .unwrap();
        }

        assert_eq!(harness.player.clear_queue(GUILD).await, Ok(1));
        assert_eq!(
            harness.player.now_playing(GUILD).await.map(|now| now.title),
            Some("A".to_string())
        );
    }

    #[tokio::test]
    async fn pause_and_resume_reach_the_connection() {
        let harness = Harness::new(FakeCatalog::default(), videos(&["A"]));
        assert_eq!(
            harness.player.pause(GUILD).await,
            Err(PlaybackError::NothingPlaying)
        );

        harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("A"))
            .await
            .unwrap();
        harness.player.pause(GUILD).await.unwrap();
        assert!(harness.transport.connection().is_paused());
        assert_eq!(
            harness.state().await,
            SessionState::Playing { paused: true }
        );

        harness.player.resume(GUILD).await.unwrap();
        assert!(!harness.transport.connection().is_paused());
    }

    #[tokio::test]
    async fn natural_end_advances_through_the_queue() {
        let mut harness = Harness::new(FakeCatalog::default(), videos(&["A", "B"]));
        for name in ["A", "B"] {
            harness
                .player
                .play(GUILD, Some(CHANNEL), &video_link(name))
                .await
                .unwrap();
        }

        let next = harness.finish_current().await;
        assert_eq!(next.map(|now| now.title), Some("B".to_string()));
        assert_eq!(harness.finish_current().await, None);
        assert_eq!(
            harness.state().await,
            SessionState::ConnectedIdle
        );
    }

    #[tokio::test]
    async fn skip_amount_is_capped() {
        let settings = PlayerSettings {
            max_skip: 2,
            ..PlayerSettings::default()
        };
        let harness = Harness::with_settings(FakeCatalog::default(), videos(&["A", "B", "C", "D"]), settings);
        for name in ["A", "B", "C", "D"] {
            harness
                .player
                .play(GUILD, Some(CHANNEL), &video_link(name))
                .await
                .unwrap();
        }

        let report = harness.player.skip(GUILD, 50).await.unwrap();

        assert_eq!(report.skipped, vec!["B"]);
        assert_eq!(harness.titles(), vec!["C", "D"]);
    }

    #[tokio::test]
    async fn playlist_slots_without_track_are_never_searched() {
        let catalog = FakeCatalog::default()
            .with_playlist("pl1", "Mix", &[("S1", "X"), ("Local", ""), ("S3", "X")])
            .with_missing_slot("pl1", 1);
        let site = FakeSite::default()
            .with_search("S1 X", "s1_________", "S1")
            .with_search("S3 X", "s3_________", "S3");
        let mut harness = Harness::new(catalog, site);

        let report = harness
            .player
            .play(GUILD, Some(CHANNEL), "https://open.spotify.com/playlist/pl1")
            .await
            .unwrap();
        assert_eq!(
            report.enqueued,
            EnqueueOutcome::CatalogPlaylist {
                name: "Mix".to_string(),
                tracks: 2
            }
        );

        let titles: Vec<_> = harness
            .player
            .queue_view(GUILD)
            .await
            .rows
            .into_iter()
            .map(|row| row.title)
            .collect();
        assert_eq!(titles, vec!["S3"]);

        let next = harness.finish_current().await;
        assert_eq!(next.map(|now| now.title), Some("S3".to_string()));
        assert_eq!(
            harness.transport.connection().plays(),
            vec![stream_of(&watch("s1_________")), stream_of(&watch("s3_________"))]
        );
        assert!(harness.titles().is_empty());
    }

    #[tokio::test]
    async fn failed_connect_leaves_queue_untouched() {
        let harness = Harness::new(FakeCatalog::default(), videos(&["A"]));
        harness.transport.fail_next_connect();

        let err = harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("A"))
            .await
            .unwrap_err();

        assert!(matches!(err, PlaybackError::Transport(_)));
        assert!(harness.titles().is_empty());
        assert_eq!(harness.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn invalid_link_does_not_join_the_channel() {
        let harness = Harness::new(FakeCatalog::default(), FakeSite::default());

        let err = harness
            .player
            .play(GUILD, Some(CHANNEL), "https://open.spotify.com/album/x")
            .await
            .unwrap_err();

        assert!(matches!(err, PlaybackError::InvalidLink(_)));
        assert_eq!(harness.transport.connect_count(), 0);
    }

    fn three_song_mix() -> (FakeCatalog, FakeSite) {
        let catalog = FakeCatalog::default().with_playlist(
            "pl1",
            "Mix",
            &[("S1", "X"), ("S2", "X"), ("S3", "X")],
        );
        let site = FakeSite::default()
            .with_search("S1 X", "s1_________", "S1")
            .with_search("S2 X", "s2_________", "S2")
            .with_search("S3 X", "s3_________", "S3")
            .with_video(&video_link("A"), "A");
        (catalog, site)
    }

    #[tokio::test]
    async fn stop_during_cursor_advance_leaves_queue_empty() {
        let (catalog, site) = three_song_mix();
        let gate = catalog.gate();
        let mut harness = Harness::new(catalog, site);
        harness
            .player
            .play(GUILD, Some(CHANNEL), "https://open.spotify.com/playlist/pl1")
            .await
            .unwrap();

        gate.arm();
        harness.transport.connection().finish_current();
        let request = harness.advance_rx.try_recv().unwrap();

        let (next, stopped) = tokio::join!(harness.player.handle_completion(request), async {
            gate.entered().await;
            let stopped = harness.player.stop(GUILD).await;
            gate.release();
            stopped
        });

        assert_eq!(next, None);
        assert!(stopped);
        assert!(harness.titles().is_empty());
        assert_eq!(harness.state().await, SessionState::Idle);
        assert_eq!(harness.transport.connection().plays().len(), 1);

        // Arranca de cero: suena lo nuevo, no el resto de la playlist
        let report = harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("A"))
            .await
            .unwrap();
        assert_eq!(report.started.map(|now| now.title), Some("A".to_string()));
        assert!(harness.titles().is_empty());
    }

    #[tokio::test]
    async fn stop_during_skip_leaves_queue_empty() {
        let (catalog, site) = three_song_mix();
        let gate = catalog.gate();
        let harness = Harness::new(catalog, site);
        harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("A"))
            .await
            .unwrap();
        harness
            .player
            .enqueue(GUILD, Some(CHANNEL), "https://open.spotify.com/playlist/pl1")
            .await
            .unwrap();

        gate.arm();
        let (report, stopped) = tokio::join!(harness.player.skip(GUILD, 3), async {
            gate.entered().await;
            let stopped = harness.player.stop(GUILD).await;
            gate.release();
            stopped
        });

        assert!(stopped);
        assert_eq!(
            report,
            Ok(SkipReport {
                skipped: vec!["S1".to_string()],
                next: None,
            })
        );
        assert!(harness.titles().is_empty());
        assert_eq!(harness.state().await, SessionState::Idle);
    }

    #[tokio::test]
    async fn play_during_completion_starts_a_single_track() {
        let site = videos(&["A", "B", "C"]);
        let gate = site.gate();
        let mut harness = Harness::new(FakeCatalog::default(), site);
        for name in ["A", "B"] {
            harness
                .player
                .play(GUILD, Some(CHANNEL), &video_link(name))
                .await
                .unwrap();
        }

        gate.arm();
        harness.transport.connection().finish_current();
        let request = harness.advance_rx.try_recv().unwrap();

        let (next, report) = tokio::join!(harness.player.handle_completion(request), async {
            gate.entered().await;
            let link_c = video_link("C");
            let play = harness.player.play(GUILD, Some(CHANNEL), &link_c);
            tokio::pin!(play);
            // `/play` queda esperando el avance en curso
            let waiting = tokio::time::timeout(Duration::from_millis(50), &mut play).await;
            gate.release();
            (waiting.is_err(), play.await)
        });

        let (waited, report) = report;
        assert!(waited);
        assert_eq!(next.map(|now| now.title), Some("B".to_string()));
        assert_eq!(report.unwrap().started, None);
        assert_eq!(
            harness.transport.connection().plays(),
            vec![stream_of(&video_link("A")), stream_of(&video_link("B"))]
        );
        assert_eq!(harness.titles(), vec!["C"]);
    }

    #[tokio::test]
    async fn skip_racing_natural_end_advances_once() {
        let mut harness = Harness::new(FakeCatalog::default(), videos(&["A", "B", "C"]));
        for name in ["A", "B", "C"] {
            harness
                .player
                .play(GUILD, Some(CHANNEL), &video_link(name))
                .await
                .unwrap();
        }

        // A termina sola y el skip llega antes de procesar el fin
        harness.transport.connection().finish_current();
        let report = harness.player.skip(GUILD, 1).await.unwrap();
        assert_eq!(report.next, Some("B".to_string()));

        let request = harness.advance_rx.try_recv().unwrap();
        assert!(harness.advance_rx.try_recv().is_err());

        let next = harness.player.handle_completion(request).await;
        assert_eq!(next.map(|now| now.title), Some("B".to_string()));
        assert_eq!(harness.transport.connection().plays().len(), 2);
        assert_eq!(harness.titles(), vec!["C"]);
    }

    #[tokio::test]
    async fn own_disconnect_echo_does_not_stop_a_new_session() {
        let harness = Harness::new(FakeCatalog::default(), videos(&["A", "B"]));
        harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("A"))
            .await
            .unwrap();
        assert!(harness.player.stop(GUILD).await);
        harness
            .player
            .play(GUILD, Some(CHANNEL), &video_link("B"))
            .await
            .unwrap();

        // Llega el eco de la desconexión del /stop
        assert!(!harness.player.handle_voice_disconnect(GUILD).await);
        assert_eq!(
            harness.player.now_playing(GUILD).await.map(|now| now.title),
            Some("B".to_string())
        );

        // Una expulsión real sí limpia la sesión
        assert!(harness.player.handle_voice_disconnect(GUILD).await);
        assert_eq!(harness.state().await, SessionState::Idle);
    }
}
