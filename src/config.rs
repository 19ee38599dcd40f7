use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::player::PlayerSettings;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Catálogo de metadata (Spotify)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub catalog_page_size: usize,

    // Audio
    pub default_volume: f32,
    pub streaming_base_url: String,
    pub ytdlp_cookies_browser: Option<String>,

    // Rendimiento
    pub extraction_workers: usize,

    // Presentación y límites
    pub queue_preview_entries: usize,
    pub playlist_preview_tracks: usize,
    pub max_skip: usize,
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .with_context(|| format!("{} tiene un valor no válido: {}", name, val)),
        _ => Ok(default),
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|val| !val.trim().is_empty())
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let mut streaming_base_url = var_or("STREAMING_BASE_URL", defaults.streaming_base_url)?;
        if !streaming_base_url.ends_with('/') {
            streaming_base_url.push('/');
        }

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("Falta DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("Falta APPLICATION_ID")?
                .parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            spotify_client_id: optional_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: optional_var("SPOTIFY_CLIENT_SECRET"),
            catalog_page_size: var_or("CATALOG_PAGE_SIZE", defaults.catalog_page_size)?,

            default_volume: var_or("DEFAULT_VOLUME", defaults.default_volume)?,
            streaming_base_url,
            ytdlp_cookies_browser: optional_var("YTDLP_COOKIES_BROWSER"),

            extraction_workers: var_or("EXTRACTION_WORKERS", defaults.extraction_workers)?,

            queue_preview_entries: var_or("QUEUE_PREVIEW_ENTRIES", defaults.queue_preview_entries)?,
            playlist_preview_tracks: var_or(
                "PLAYLIST_PREVIEW_TRACKS",
                defaults.playlist_preview_tracks,
            )?,
            max_skip: var_or("MAX_SKIP", defaults.max_skip)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - Catalog page size must be between 1 and 50 (API limit)
    /// - Workers, previews and skip limit must be greater than 0
    /// - Streaming base URL must be an absolute http(s) URL
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.default_volume);
        }

        if !(1..=50).contains(&self.catalog_page_size) {
            anyhow::bail!("Catalog page size must be between 1 and 50, got: {}", self.catalog_page_size);
        }

        if self.extraction_workers == 0 {
            anyhow::bail!("Extraction workers must be greater than 0");
        }

        if self.queue_preview_entries == 0 || self.playlist_preview_tracks == 0 {
            anyhow::bail!("Queue previews must show at least one entry");
        }

        if self.max_skip == 0 {
            anyhow::bail!("Max skip must be greater than 0");
        }

        match url::Url::parse(&self.streaming_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => anyhow::bail!("Invalid streaming base URL: {}", self.streaming_base_url),
        }

        Ok(())
    }

    /// Credenciales del catálogo, si están completas
    pub fn spotify_credentials(&self) -> Option<(String, String)> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        }
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            queue_preview_entries: self.queue_preview_entries,
            playlist_preview_tracks: self.playlist_preview_tracks,
            max_skip: self.max_skip,
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes tokens and secrets.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {}% vol, streaming base {}\n  \
            Catalog: {} (page size {})\n  \
            Workers: {} extraction\n  \
            Queue: preview {} entries / {} playlist tracks, max skip {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.streaming_base_url,
            if self.spotify_credentials().is_some() {
                "configured"
            } else {
                "disabled"
            },
            self.catalog_page_size,
            self.extraction_workers,
            self.queue_preview_entries,
            self.playlist_preview_tracks,
            self.max_skip
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,

            spotify_client_id: None,
            spotify_client_secret: None,
            catalog_page_size: 10,

            default_volume: 0.25,
            streaming_base_url: "https://www.youtube.com/".to_string(),
            ytdlp_cookies_browser: None,

            extraction_workers: num_cpus::get(),

            queue_preview_entries: 5,
            playlist_preview_tracks: 5,
            max_skip: 100,
        }
    }
}
