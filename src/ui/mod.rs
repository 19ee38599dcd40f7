//! Presentación de respuestas en Discord
pub mod embeds;
