use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::audio::{
    player::{EnqueueOutcome, QueueView, SkipReport},
    session::NowPlaying,
};

/// Límite de caracteres de un mensaje de Discord
pub const MESSAGE_LIMIT: usize = 2000;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 PlayBot";

/// Embed de respuesta a `/play`
pub fn create_enqueue_embed(outcome: &EnqueueOutcome, started: Option<&NowPlaying>) -> CreateEmbed {
    let embed = match outcome {
        EnqueueOutcome::Track(track) => CreateEmbed::default()
            .title("✅ Canción Agregada")
            .description(format!(
                "**{}** se ha agregado a la cola de reproducción",
                track.title
            ))
            .url(&track.playable_ref)
            .color(colors::SUCCESS_GREEN),
        EnqueueOutcome::StreamingPlaylist { added: 0 } => CreateEmbed::default()
            .title("⚠️ Playlist Sin Videos")
            .description("No se encontraron videos disponibles en la playlist")
            .color(colors::WARNING_ORANGE),
        EnqueueOutcome::StreamingPlaylist { added } => CreateEmbed::default()
            .title("📋 Playlist Agregada")
            .description(format!("**{}** videos agregados a la cola", added))
            .color(colors::MUSIC_PURPLE),
        EnqueueOutcome::CatalogPlaylist { name, tracks: 0 } => CreateEmbed::default()
            .title("⚠️ Playlist Vacía")
            .description(format!("La playlist **{}** no tiene canciones", name))
            .color(colors::WARNING_ORANGE),
        EnqueueOutcome::CatalogPlaylist { name, tracks } => CreateEmbed::default()
            .title("📋 Playlist Agregada")
            .description(format!("**{}** agregada a la cola", name))
            .field("🎶 Canciones", tracks.to_string(), true)
            .color(colors::MUSIC_PURPLE),
    };

    let embed = match started {
        Some(now) => embed.field("▶️ Reproduciendo", &now.title, false),
        None => embed,
    };

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            "🎵 Se reproducirá automáticamente si no hay música sonando",
        ))
}

/// Texto de la cola: canción actual y filas de vista previa, recortado al
/// límite de un mensaje
pub fn format_queue_text(view: &QueueView) -> String {
    if view.is_empty() {
        return "😴 **La cola está vacía**\n\n💡 Usa `/play <enlace>` para agregar música".to_string();
    }

    let mut text = String::new();
    if let Some(current) = &view.now_playing {
        text.push_str(&format!("▶️ **Reproduciendo:** {}\n\n", current.title));
    }

    // Las filas de una misma playlist comparten posición: una cabecera por entrada
    let mut open_playlist: Option<usize> = None;
    for row in &view.rows {
        let line = match &row.playlist {
            Some(playlist) => {
                if open_playlist != Some(row.position) {
                    text.push_str(&format!("**{}**. 📋 {}\n", row.position, playlist));
                    open_playlist = Some(row.position);
                }
                let number = row.track_number.unwrap_or_default();
                match row.artist.as_deref().filter(|artist| !artist.is_empty()) {
                    Some(artist) => format!("　↳ #{} {} - {}\n", number, row.title, artist),
                    None => format!("　↳ #{} {}\n", number, row.title),
                }
            }
            None => {
                open_playlist = None;
                match &row.link {
                    Some(link) => format!("**{}**. {} ([Link](<{}>))\n", row.position, row.title, link),
                    None => format!("**{}**. {}\n", row.position, row.title),
                }
            }
        };
        text.push_str(&line);
    }

    if view.total_entries > 0 {
        text.push_str(&format!("\n**Total:** {} entradas en cola", view.total_entries));
    }

    truncate_message(text)
}

/// Recorta en un límite de carácter para no partir caracteres multibyte
fn truncate_message(text: String) -> String {
    if text.chars().count() <= MESSAGE_LIMIT {
        return text;
    }
    let mut truncated: String = text.chars().take(MESSAGE_LIMIT - 1).collect();
    truncated.push('…');
    truncated
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(view: &QueueView) -> CreateEmbed {
    let color = if view.is_empty() {
        colors::NEUTRAL_GRAY
    } else {
        colors::INFO_BLUE
    };

    CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .description(format_queue_text(view))
        .color(color)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

pub fn format_skip_text(report: &SkipReport) -> String {
    let mut text = String::from("⏭️ Canción saltada");
    if !report.skipped.is_empty() {
        text.push_str(&format!(
            "\n🗑️ También se saltaron: {}",
            report.skipped.join(", ")
        ));
    }
    match &report.next {
        Some(next) => text.push_str(&format!("\n▶️ Siguiente: **{}**", next)),
        None => text.push_str("\n📭 No hay más canciones en la cola"),
    }
    truncate_message(text)
}

/// Crea un embed de ayuda general
pub fn create_help_embed(max_skip: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 PlayBot - Guía")
        .color(colors::INFO_BLUE)
        .description("Bot de música para canales de voz")
        .field(
            "🎵 Reproducción",
            format!(
                "• `/play <enlace>` - Reproduce o agrega a la cola\n\
                • `/pause` - Pausa la reproducción\n\
                • `/resume` - Reanuda la reproducción\n\
                • `/skip [cantidad]` - Salta canciones (máx. {})\n\
                • `/stop` - Detiene, limpia la cola y desconecta",
                max_skip
            ),
            false,
        )
        .field(
            "📜 Cola",
            "• `/queue` - Muestra la cola\n\
            • `/clear_queue` - Limpia la cola",
            false,
        )
        .field(
            "🔗 Enlaces Soportados",
            "• Videos y playlists de YouTube\n\
            • Canciones y playlists de Spotify (se buscan en YouTube)",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}
