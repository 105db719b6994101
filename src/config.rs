//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor de archivos con soporte para argumentos CLI
//! y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./userve --address 0.0.0.0 --port 8080 ./public
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! USERVE_PORT=8080 USERVE_ROOT=./public USERVE_LOG=debug ./userve
//! ```

use crate::http::DEFAULT_MAX_REQUEST_BYTES;
use clap::Parser;
use std::path::PathBuf;

/// Configuración del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "userve")]
#[command(about = "Servidor HTTP/1.x de archivos estáticos")]
#[command(version)]
pub struct Config {
    /// Host o IP donde escuchar; se usan todas las direcciones que resuelva
    #[arg(short, long, default_value = "localhost", env = "USERVE_ADDRESS")]
    pub address: String,

    /// Primer puerto a probar; si está ocupado se prueban los 4 siguientes
    #[arg(short, long, default_value = "3000", env = "USERVE_PORT")]
    pub port: u16,

    /// Directorio que se sirve en `/`
    #[arg(default_value = ".", env = "USERVE_ROOT")]
    pub root: PathBuf,

    /// Tamaño máximo de request line + headers
    #[arg(long = "max-request-bytes", default_value_t = DEFAULT_MAX_REQUEST_BYTES, env = "USERVE_MAX_REQUEST_BYTES")]
    pub max_request_bytes: usize,

    /// Nivel de log cuando RUST_LOG no está definido
    #[arg(long = "log-level", default_value = "info", env = "USERVE_LOG")]
    pub log_level: String,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Dirección para mostrar (address:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use userve::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "localhost:3000");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.address.trim().is_empty() {
            return Err("Address must not be empty".to_string());
        }
        if self.max_request_bytes == 0 {
            return Err("Max request bytes must be > 0".to_string());
        }

        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn log_summary(&self) {
        tracing::info!(
            address = %self.address(),
            root = %self.root.display(),
            max_request_bytes = self.max_request_bytes,
            "configuration"
        );
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: 3000,
            root: PathBuf::from("."),
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            log_level: "info".to_string(),
        }
    }
}
