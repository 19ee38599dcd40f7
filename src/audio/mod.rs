//! # Audio Module
//!
//! Núcleo de reproducción de música por guild.
//!
//! ### [`queue`] - Colas
//! - Colas FIFO por guild con entradas heterogéneas: tracks directos y
//!   cursores de playlist del catálogo que se expanden de a un track
//!
//! ### [`session`] - Sesión de voz
//! - Estado `Idle` / `ConnectedIdle` / `Playing` de cada guild
//! - Generaciones para descartar notificaciones de fin obsoletas
//!
//! ### [`transport`] - Transporte
//! - Traits de conexión de voz e implementación sobre songbird
//! - Traspaso del evento de fin al bucle de avance
//!
//! ### [`player`] - Orquestador
//! - `play`, `skip`, `pause`, `resume`, `stop`, vista de cola
//! - Avance automático: lo que no se puede reproducir se salta en silencio

pub mod player;
pub mod queue;
pub mod session;
pub mod transport;

#[cfg(test)]
pub mod testing;
