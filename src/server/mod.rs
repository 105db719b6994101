//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor que:
//! 1. Escucha en una o más direcciones (`listener`)
//! 2. Acepta conexiones entrantes
//! 3. Arma el request con el framer incremental
//! 4. Se lo pasa a un `Handler` y se asegura de que haya respuesta
//!
//! Maneja una conexión a la vez.

pub mod handler;
pub mod listener;
pub mod tcp;

// Re-exportar para facilitar el uso
pub use handler::{Handler, HandlerError};
pub use listener::{fallback_ports, Connection, ListenAddress, Listener};
pub use tcp::{ConnectionError, Server};
