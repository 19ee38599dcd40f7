//! # Error Types
//!
//! Errores del núcleo de reproducción. Los errores de operaciones invocadas por
//! el usuario (enqueue, connect) se muestran inmediatamente; los que ocurren
//! durante el avance autónomo de la cola se registran y se saltan.

use thiserror::Error;

/// Fallo al resolver un enlace del catálogo de streaming a audio reproducible
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Recurso privado, eliminado o bloqueado
    #[error("Recurso no disponible: {0}")]
    Unavailable(String),

    /// Cualquier otro fallo del extractor
    #[error("Extracción fallida: {0}")]
    Failed(String),
}

/// Error principal del reproductor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("El usuario no está en un canal de voz")]
    NoVoiceChannel,

    #[error("Catálogo no disponible: {0}")]
    CatalogUnavailable(String),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Sin resultados para '{0}'")]
    NoResult(String),

    #[error("Enlace no válido: {0}")]
    InvalidLink(String),

    #[error("No se está reproduciendo nada")]
    NothingPlaying,

    #[error("No hay cola que limpiar")]
    NothingQueued,

    #[error("Cantidad no válida: {0}")]
    InvalidAmount(i64),

    #[error("Sin conexión de voz")]
    NotConnected,

    #[error("Error de codificación: {0}")]
    Encoding(String),

    #[error("Error de transporte de voz: {0}")]
    Transport(String),
}

impl PlaybackError {
    /// Texto mostrado al usuario cuando el error se reporta en Discord
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::NoVoiceChannel => "❌ ¡Debes estar en un canal de voz!".to_string(),
            PlaybackError::CatalogUnavailable(msg) => {
                format!("❌ Error al consultar el catálogo: {}", msg)
            }
            PlaybackError::Resolution(ResolutionError::Unavailable(_)) => {
                "⚠️ Video privado omitido.".to_string()
            }
            PlaybackError::Resolution(ResolutionError::Failed(msg)) => {
                format!("❌ Error al cargar la canción: {}", msg)
            }
            PlaybackError::NoResult(query) => format!("🔍 Sin resultados para '{}'.", query),
            PlaybackError::InvalidLink(msg) => format!("❌ Enlace no válido: {}", msg),
            PlaybackError::NothingPlaying => "❌ No se está reproduciendo nada.".to_string(),
            PlaybackError::NothingQueued => "📭 No hay cola que limpiar.".to_string(),
            PlaybackError::InvalidAmount(_) => "❌ El valor mínimo es 1.".to_string(),
            PlaybackError::NotConnected => "❌ No estoy conectado a un canal de voz.".to_string(),
            PlaybackError::Encoding(msg) | PlaybackError::Transport(msg) => {
                format!("❌ Error de reproducción: {}", msg)
            }
        }
    }

    /// Recurso privado o no disponible: se salta sin avisar durante el avance
    pub fn is_unavailable(&self) -> bool {
        matches!(self, PlaybackError::Resolution(ResolutionError::Unavailable(_)))
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
