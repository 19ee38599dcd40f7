use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::{Command, CommandOptionType}, id::GuildId},
    prelude::Context,
};

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context, max_skip: usize) -> Result<()> {
    Command::set_global_commands(&ctx.http, all_commands(max_skip)).await?;
    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId, max_skip: usize) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands(max_skip)).await?;
    Ok(())
}

fn all_commands(max_skip: usize) -> Vec<CreateCommand> {
    vec![
        play_command(),
        queue_command(),
        skip_command(max_skip),
        clear_queue_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        help_command(),
    ]
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce un enlace de YouTube o Spotify")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "link",
                "Enlace de video, canción o playlist",
            )
            .required(true),
        )
}

// Comandos de control

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn skip_command(max_skip: usize) -> CreateCommand {
    CreateCommand::new("skip")
        .description("Salta a la siguiente canción")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "amount",
                "Número de canciones a saltar",
            )
            .min_int_value(1)
            .max_int_value(max_skip.try_into().unwrap_or(100)),
        )
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción, limpia la cola y desconecta")
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola de reproducción")
}

fn clear_queue_command() -> CreateCommand {
    CreateCommand::new("clear_queue").description("Limpia la cola sin detener la canción actual")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Muestra información de ayuda")
}
