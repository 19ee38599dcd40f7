use anyhow::{Context, Result};
use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{ExtractedStream, FlatEntry, StreamingSiteClient};
use crate::error::ResolutionError;

/// Cliente del sitio de streaming basado en yt-dlp.
///
/// yt-dlp corre como proceso hijo asíncrono; el semáforo limita cuántas
/// extracciones corren a la vez (el pool de workers).
pub struct YtDlpClient {
    http: reqwest::Client,
    workers: Semaphore,
    base_url: String,
    cookies_browser: Option<String>,
}

/// Salida de `yt-dlp --dump-single-json` para un video
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    url: Option<String>,
    requested_formats: Option<Vec<YtDlpFormat>>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    url: String,
    acodec: Option<String>,
}

/// Salida de `yt-dlp --flat-playlist --dump-single-json`
#[derive(Debug, Deserialize)]
struct YtDlpPlaylist {
    #[serde(default)]
    entries: Vec<YtDlpFlatEntry>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFlatEntry {
    id: Option<String>,
    title: Option<String>,
    #[serde(rename = "_type")]
    entry_type: Option<String>,
}

impl YtDlpClient {
    pub fn new(
        base_url: impl Into<String>,
        workers: usize,
        cookies_browser: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;

        Ok(Self {
            http,
            workers: Semaphore::new(workers.max(1)),
            base_url: base_url.into(),
            cookies_browser,
        })
    }

    async fn run_ytdlp(&self, args: &[&str]) -> Result<std::process::Output> {
        let _permit = self.workers.acquire().await?;

        let mut command = Command::new("yt-dlp");
        if let Some(browser) = &self.cookies_browser {
            command.args(["--cookies-from-browser", browser.as_str()]);
        }

        command
            .args(args)
            .output()
            .await
            .context("Error al ejecutar yt-dlp")
    }

    /// Verifica que yt-dlp esté instalado y responda
    pub async fn verify_available() -> Result<String> {
        let output = Command::new("yt-dlp").arg("--version").output().await?;
        if !output.status.success() {
            anyhow::bail!("yt-dlp no puede ejecutarse correctamente");
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Clasifica el stderr de yt-dlp: privado/no disponible frente a otros fallos
pub fn classify_failure(stderr: &str) -> ResolutionError {
    let lower = stderr.to_lowercase();
    let unavailable = [
        "private video",
        "this video is private",
        "video unavailable",
        "this video has been removed",
    ];

    let message = stderr.trim().to_string();
    if unavailable.iter().any(|marker| lower.contains(marker)) {
        ResolutionError::Unavailable(message)
    } else {
        ResolutionError::Failed(message)
    }
}

fn audio_url(info: &YtDlpInfo) -> Option<String> {
    if let Some(url) = &info.url {
        return Some(url.clone());
    }

    // Formatos combinados: preferir el que trae audio
    info.requested_formats.as_ref().and_then(|formats| {
        formats
            .iter()
            .find(|f| f.acodec.as_deref().is_some_and(|codec| codec != "none"))
            .or_else(|| formats.first())
            .map(|f| f.url.clone())
    })
}

#[async_trait]
impl StreamingSiteClient for YtDlpClient {
    async fn extract_full(&self, link: &str) -> std::result::Result<ExtractedStream, ResolutionError> {
        debug!("🎵 Extrayendo stream de: {}", link);

        let output = self
            .run_ytdlp(&[
                "--no-playlist",
                "--dump-single-json",
                "-f",
                "bestaudio/best",
                "--no-warnings",
                link,
            ])
            .await
            .map_err(|e| ResolutionError::Failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        let info: YtDlpInfo = serde_json::from_slice(&output.stdout)
            .map_err(|e| ResolutionError::Failed(format!("respuesta de yt-dlp no válida: {}", e)))?;

        let stream_url = audio_url(&info)
            .ok_or_else(|| ResolutionError::Failed("yt-dlp no devolvió URL de audio".to_string()))?;

        Ok(ExtractedStream {
            title: info.title.unwrap_or_else(|| "Título desconocido".to_string()),
            stream_url,
        })
    }

    async fn extract_flat(&self, playlist_link: &str) -> Result<Vec<FlatEntry>> {
        info!("📋 Listando playlist: {}", playlist_link);

        let output = self
            .run_ytdlp(&[
                "--flat-playlist",
                "--dump-single-json",
                "--skip-download",
                "--no-warnings",
                playlist_link,
            ])
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        let playlist: YtDlpPlaylist = serde_json::from_slice(&output.stdout)
            .context("Error al parsear respuesta de yt-dlp")?;

        Ok(playlist
            .entries
            .into_iter()
            .map(|entry| FlatEntry {
                id: entry.id,
                title: entry.title,
                entry_type: entry.entry_type,
            })
            .collect())
    }

    async fn fetch_search_page(&self, query: &str) -> Result<String> {
        let url = format!(
            "{}results?search_query={}",
            self.base_url,
            urlencoding::encode(query)
        );

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            warn!("⚠️ Búsqueda respondió {}", response.status());
            anyhow::bail!("búsqueda falló con estado {}", response.status());
        }

        Ok(response.text().await?)
    }
}
