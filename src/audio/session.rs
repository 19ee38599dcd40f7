use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    audio::transport::{AdvanceRequest, AdvanceSender, CompletionNotifier, VoiceConnection, VoiceTransport},
    error::{PlaybackError, Result},
    sources::ExtractedStream,
};

/// Canción en reproducción: título y enlace de origen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub title: String,
    pub playable_ref: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Sin conexión de voz
    Idle,
    /// Conectado, sin reproducir
    ConnectedIdle,
    Playing { paused: bool },
}

/// Estado de reproducción de un guild.
///
/// Cada `start_playback` incrementa `generation`; las notificaciones de fin con
/// una generación anterior (canción ya reemplazada o sesión detenida) se ignoran.
pub struct PlaybackSession {
    guild_id: GuildId,
    connection: Option<Arc<dyn VoiceConnection>>,
    channel_id: Option<ChannelId>,
    now_playing: Option<NowPlaying>,
    paused: bool,
    generation: u64,
}

impl PlaybackSession {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            connection: None,
            channel_id: None,
            now_playing: None,
            paused: false,
            generation: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.connection, &self.now_playing) {
            (None, _) => SessionState::Idle,
            (Some(_), None) => SessionState::ConnectedIdle,
            (Some(_), Some(_)) => SessionState::Playing {
                paused: self.paused,
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state(), SessionState::Playing { .. })
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Conecta al canal, o redirige la conexión existente si el canal cambió
    pub async fn connect(&mut self, transport: &dyn VoiceTransport, channel_id: ChannelId) -> Result<()> {
        match &self.connection {
            Some(_) if self.channel_id == Some(channel_id) => {}
            Some(connection) => {
                connection.move_to(channel_id).await?;
                info!("🔀 Sesión de guild {} movida al canal {}", self.guild_id, channel_id);
            }
            None => {
                let connection = transport.connect(self.guild_id, channel_id).await?;
                self.connection = Some(connection);
            }
        }
        self.channel_id = Some(channel_id);
        Ok(())
    }

    /// Empieza a reproducir `stream` por la conexión abierta
    pub async fn start_playback(
        &mut self,
        track: NowPlaying,
        stream: &ExtractedStream,
        advance_tx: &AdvanceSender,
    ) -> Result<()> {
        let connection = self.connection.clone().ok_or(PlaybackError::NotConnected)?;

        self.generation += 1;
        let notifier = CompletionNotifier::new(
            AdvanceRequest {
                guild_id: self.guild_id,
                generation: self.generation,
            },
            advance_tx.clone(),
        );

        info!("🎵 Reproduciendo en guild {}: {}", self.guild_id, track.title);
        self.now_playing = Some(track);
        self.paused = false;

        if let Err(e) = connection.play(stream, notifier).await {
            self.now_playing = None;
            return Err(e);
        }
        Ok(())
    }

    /// Aplica la notificación de fin. Devuelve `true` si corresponde a la
    /// reproducción actual y la cola debe avanzar.
    pub fn complete(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.now_playing.is_none() {
            debug!(
                "Notificación de fin obsoleta en guild {} (gen {} ≠ {})",
                self.guild_id, generation, self.generation
            );
            return false;
        }
        self.clear_current();
        true
    }

    pub fn clear_current(&mut self) {
        self.now_playing = None;
        self.paused = false;
    }

    /// Corta el stream actual; el callback de fin se encarga de avanzar
    pub fn halt(&self) -> bool {
        match (&self.connection, &self.now_playing) {
            (Some(connection), Some(_)) => {
                connection.stop();
                true
            }
            _ => false,
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        let connection = self.playing_connection()?;
        connection.pause();
        self.paused = true;
        info!("⏸️ Reproducción pausada en guild {}", self.guild_id);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        let connection = self.playing_connection()?;
        connection.resume();
        self.paused = false;
        info!("▶️ Reproducción reanudada en guild {}", self.guild_id);
        Ok(())
    }

    /// Detiene, desconecta y vuelve a `Idle`. Devuelve si había conexión.
    pub async fn stop(&mut self) -> bool {
        // Invalida cualquier notificación de fin pendiente
        self.generation += 1;
        self.clear_current();
        self.channel_id = None;

        let Some(connection) = self.connection.take() else {
            return false;
        };
        connection.stop();
        if let Err(e) = connection.disconnect().await {
            warn!("⚠️ Error al desconectar en guild {}: {}", self.guild_id, e);
        }
        info!("⏹️ Sesión detenida en guild {}", self.guild_id);
        true
    }

    fn playing_connection(&self) -> Result<Arc<dyn VoiceConnection>> {
        match (&self.connection, &self.now_playing) {
            (Some(connection), Some(_)) => Ok(connection.clone()),
            _ => Err(PlaybackError::NothingPlaying),
        }
    }
}
