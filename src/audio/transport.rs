//! # Voice Transport
//!
//! Frontera con la conexión de voz. El núcleo de reproducción solo conoce los
//! traits [`VoiceTransport`] y [`VoiceConnection`]; la implementación real usa
//! songbird y los tests usan fakes.
//!
//! El callback de fin de canción llega desde la tarea de eventos de songbird,
//! no desde la tarea que maneja el comando. [`CompletionNotifier`] no ejecuta
//! el avance: publica un [`AdvanceRequest`] en un canal que consume el bucle de
//! avance del orquestador.

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    error::{PlaybackError, Result},
    sources::ExtractedStream,
};

/// Petición de avance publicada al terminar una canción
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceRequest {
    pub guild_id: GuildId,
    pub generation: u64,
}

pub type AdvanceSender = mpsc::UnboundedSender<AdvanceRequest>;
pub type AdvanceReceiver = mpsc::UnboundedReceiver<AdvanceRequest>;

/// Notificador de fin de reproducción: dispara como máximo una vez y puede
/// llamarse desde cualquier hilo.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    request: AdvanceRequest,
    tx: AdvanceSender,
    fired: Arc<AtomicBool>,
}

impl CompletionNotifier {
    pub fn new(request: AdvanceRequest, tx: AdvanceSender) -> Self {
        Self {
            request,
            tx,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Publica la petición de avance. Devuelve `false` si ya se había disparado.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        if self.tx.send(self.request).is_err() {
            warn!("⚠️ Bucle de avance cerrado, guild {}", self.request.guild_id);
        }
        true
    }
}

/// Abre conexiones de voz
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>>;
}

/// Conexión de voz abierta en un guild
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Redirige la conexión existente a otro canal
    async fn move_to(&self, channel_id: ChannelId) -> Result<()>;

    /// Empieza a reproducir; `on_complete` se dispara al terminar o detenerse
    async fn play(&self, stream: &ExtractedStream, on_complete: CompletionNotifier) -> Result<()>;

    fn stop(&self);

    fn pause(&self);

    fn resume(&self);

    async fn disconnect(&self) -> Result<()>;
}

/// Transporte real sobre songbird
pub struct SongbirdTransport {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    volume: f32,
}

impl SongbirdTransport {
    pub fn new(manager: Arc<Songbird>, volume: f32) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            volume,
        }
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| {
                error!("Error al conectar al canal de voz: {:?}", e);
                PlaybackError::Transport(e.to_string())
            })?;

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);
        Ok(Arc::new(SongbirdConnection {
            manager: self.manager.clone(),
            call,
            guild_id,
            http: self.http.clone(),
            volume: self.volume,
            current: SyncMutex::new(None),
        }))
    }
}

struct SongbirdConnection {
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    guild_id: GuildId,
    http: reqwest::Client,
    volume: f32,
    current: SyncMutex<Option<TrackHandle>>,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn move_to(&self, channel_id: ChannelId) -> Result<()> {
        self.manager
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| PlaybackError::Transport(e.to_string()))?;
        debug!("🔀 Conexión movida al canal {} en guild {}", channel_id, self.guild_id);
        Ok(())
    }

    async fn play(&self, stream: &ExtractedStream, on_complete: CompletionNotifier) -> Result<()> {
        let input = Input::from(HttpRequest::new(self.http.clone(), stream.stream_url.clone()));

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only_input(input)
        };
        let _ = handle.set_volume(self.volume);

        // Fin natural, stop() y errores de decodificación avanzan la cola
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackCompletionHandler {
                        notifier: on_complete.clone(),
                    },
                )
                .map_err(|e| PlaybackError::Encoding(e.to_string()))?;
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    fn stop(&self) {
        if let Some(track) = self.current.lock().as_ref() {
            let _ = track.stop();
        }
    }

    fn pause(&self) {
        if let Some(track) = self.current.lock().as_ref() {
            let _ = track.pause();
        }
    }

    fn resume(&self) {
        if let Some(track) = self.current.lock().as_ref() {
            let _ = track.play();
        }
    }

    async fn disconnect(&self) -> Result<()> {
        let current = self.current.lock().take();
        if let Some(track) = current {
            let _ = track.stop();
        }
        self.manager
            .remove(self.guild_id)
            .await
            .map_err(|e| PlaybackError::Transport(e.to_string()))?;
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        Ok(())
    }
}

/// Handler de songbird que publica el avance al terminar el track
struct TrackCompletionHandler {
    notifier: CompletionNotifier,
}

#[async_trait]
impl VoiceEventHandler for TrackCompletionHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                debug!("Track terminado: {:?}", state.playing);
            }
        }
        self.notifier.fire();
        None
    }
}
