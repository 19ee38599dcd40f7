use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    bot::PlayBot,
    error::PlaybackError,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &PlayBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond(
            ctx,
            &command,
            embeds::create_error_embed("Error", "Este comando solo funciona en un servidor"),
            true,
        )
        .await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await,
        "skip" => handle_skip(ctx, &command, bot, guild_id).await,
        "clear_queue" => handle_clear_queue(ctx, &command, bot, guild_id).await,
        "pause" => handle_pause(ctx, &command, bot, guild_id).await,
        "resume" => handle_resume(ctx, &command, bot, guild_id).await,
        "stop" => handle_stop(ctx, &command, bot, guild_id).await,
        "help" => {
            respond(ctx, &command, embeds::create_help_embed(bot.config.max_skip), true).await
        }
        _ => {
            respond(
                ctx,
                &command,
                embeds::create_error_embed("Error", "Comando no reconocido"),
                true,
            )
            .await
        }
    }
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &PlayBot,
    guild_id: GuildId,
) -> Result<()> {
    let link = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "link")
        .and_then(|opt| opt.value.as_str())
        .unwrap_or_default()
        .to_string();

    // Defer la respuesta ya que la extracción puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let voice_channel = get_user_voice_channel(ctx, guild_id, command.user.id);
    let embed = match bot.player.play(guild_id, voice_channel, &link).await {
        Ok(report) => embeds::create_enqueue_embed(&report.enqueued, report.started.as_ref()),
        Err(e) => playback_error_embed(&e),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &PlayBot,
    guild_id: GuildId,
) -> Result<()> {
    let view = bot.player.queue_view(guild_id).await;
    respond(ctx, command, embeds::create_queue_embed(&view), false).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &PlayBot,
    guild_id: GuildId,
) -> Result<()> {
    let amount = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "amount")
        .and_then(|opt| opt.value.as_i64())
        .unwrap_or(1);

    // Saltar dentro de una playlist consulta el catálogo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let edit = match bot.player.skip(guild_id, amount).await {
        Ok(report) => EditInteractionResponse::new().content(embeds::format_skip_text(&report)),
        Err(e) => EditInteractionResponse::new().embed(playback_error_embed(&e)),
    };

    command.edit_response(&ctx.http, edit).await?;
    Ok(())
}

async fn handle_clear_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &PlayBot,
    guild_id: GuildId,
) -> Result<()> {
    let embed = match bot.player.clear_queue(guild_id).await {
        Ok(removed) => embeds::create_success_embed(
            "Cola Limpiada",
            &format!("🗑️ Se quitaron {} entradas de la cola", removed),
        ),
        Err(e) => playback_error_embed(&e),
    };
    respond(ctx, command, embed, false).await
}

async fn handle_pause(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &PlayBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.player.pause(guild_id).await {
        Ok(()) => respond_text(ctx, command, "⏸️ Reproducción pausada").await,
        Err(e) => respond(ctx, command, playback_error_embed(&e), true).await,
    }
}

async fn handle_resume(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &PlayBot,
    guild_id: GuildId,
) -> Result<()> {
    match bot.player.resume(guild_id).await {
        Ok(()) => respond_text(ctx, command, "▶️ Reproducción reanudada").await,
        Err(e) => respond(ctx, command, playback_error_embed(&e), true).await,
    }
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &PlayBot,
    guild_id: GuildId,
) -> Result<()> {
    let message = if bot.player.stop(guild_id).await {
        "⏹️ Reproducción detenida y cola limpiada"
    } else {
        "ℹ️ No había nada que detener"
    };
    respond_text(ctx, command, message).await
}

// Funciones auxiliares

fn playback_error_embed(error: &PlaybackError) -> CreateEmbed {
    match error {
        PlaybackError::Encoding(_) | PlaybackError::Transport(_) | PlaybackError::NotConnected => {
            warn!("⚠️ Error de voz reportado al usuario: {}", error)
        }
        _ => info!("ℹ️ Comando rechazado: {}", error),
    }
    embeds::create_error_embed("Error", &error.user_message())
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_text(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await?;
    Ok(())
}

/// Canal de voz del usuario según la caché; `None` si no está conectado
fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
