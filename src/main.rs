use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::player::PlaybackOrchestrator;
use crate::audio::transport::SongbirdTransport;
use crate::bot::PlayBot;
use crate::config::Config;
use crate::sources::{
    CatalogBridge, CatalogService, SpotifyClient, StreamResolver, UnconfiguredCatalog, YtDlpClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("playbot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando PlayBot v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Catálogo de metadata
    let catalog_service: Arc<dyn CatalogService> = match config.spotify_credentials() {
        Some((client_id, client_secret)) => Arc::new(SpotifyClient::new(client_id, client_secret)?),
        None => {
            warn!("⚠️ Sin credenciales de Spotify: los enlaces de Spotify no funcionarán");
            Arc::new(UnconfiguredCatalog)
        }
    };
    let catalog = CatalogBridge::new(catalog_service, config.catalog_page_size);

    // Sitio de streaming (yt-dlp con pool de extracción)
    let site = Arc::new(YtDlpClient::new(
        config.streaming_base_url.clone(),
        config.extraction_workers,
        config.ytdlp_cookies_browser.clone(),
    )?);
    let resolver = StreamResolver::new(site, config.streaming_base_url.clone());

    // El mismo manager de songbird se registra en serenity y maneja el transporte
    let songbird = Songbird::serenity();
    let transport = Arc::new(SongbirdTransport::new(songbird.clone(), config.default_volume));

    let (player, advance_rx) =
        PlaybackOrchestrator::new(catalog, resolver, transport, config.player_settings());
    let player = Arc::new(player);
    tokio::spawn(player.clone().run_advance_loop(advance_rx));

    // Intents mínimos: comandos slash y estados de voz
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let handler = PlayBot::new(config.clone(), player);
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    let version = YtDlpClient::verify_available().await?;
    println!("OK (yt-dlp {})", version);
    Ok(())
}
