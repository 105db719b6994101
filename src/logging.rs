//! # Logging
//! src/logging.rs
//!
//! Logs estructurados con `tracing`. El filtro sale de `RUST_LOG`; si no
//! está definido se usa el nivel de la configuración.
//!
//! ```bash
//! RUST_LOG=userve=debug ./userve
//! ```

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Instala el subscriber global. Falla si ya había uno.
pub fn init(default_level: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_target(false))
        .try_init()
}
