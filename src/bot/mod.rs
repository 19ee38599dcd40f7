//! # Bot Module
//!
//! Capa de Discord de PlayBot.
//!
//! [`PlayBot`] implementa el [`EventHandler`] de serenity:
//! - `ready`: registra los comandos slash (globales o de una guild de desarrollo)
//! - `interaction_create`: despacha los comandos al orquestador de reproducción
//! - `voice_state_update`: si alguien desconecta al bot, detiene la sesión del guild
//!
//! Toda la lógica de colas y reproducción vive en
//! [`PlaybackOrchestrator`](crate::audio::player::PlaybackOrchestrator); esta
//! capa solo traduce comandos y respuestas.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{audio::player::PlaybackOrchestrator, config::Config};

pub struct PlayBot {
    /// Configuración cargada del entorno
    config: Arc<Config>,
    /// Orquestador compartido con el bucle de avance
    pub player: Arc<PlaybackOrchestrator>,
}

impl PlayBot {
    pub fn new(config: Config, player: Arc<PlaybackOrchestrator>) -> Self {
        Self {
            config: Arc::new(config),
            player,
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Guild commands propagate in about a second and are meant for
    /// development; global commands can take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id, self.config.max_skip)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx, self.config.max_skip)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos globales: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                    })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for PlayBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Desconexión del bot: los ecos de `/stop` se ignoran; una expulsión o un
    /// canal borrado reciben la misma limpieza que `/stop`
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            info!("🔌 Bot fuera del canal de voz en guild {}", guild_id);
            if self.player.handle_voice_disconnect(guild_id).await {
                info!("🧹 Sesión limpiada tras desconexión en guild {}", guild_id);
            }
        }
    }
}
