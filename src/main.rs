//! # userve - Entry Point
//! src/main.rs
//!
//! Carga el directorio raíz en memoria y lo sirve hasta que se mata el
//! proceso.

use std::process::ExitCode;
use userve::config::Config;
use userve::fileserver::FileServer;
use userve::logging;
use userve::server::Server;

fn main() -> ExitCode {
    let config = Config::new();

    if let Err(error) = logging::init(&config.log_level) {
        eprintln!("failed to initialize logging: {}", error);
        return ExitCode::FAILURE;
    }

    if let Err(error) = config.validate() {
        tracing::error!(%error, "invalid configuration");
        return ExitCode::FAILURE;
    }
    config.log_summary();

    let mut files = FileServer::new();
    match files.register_directory(&config.root, "/") {
        Ok(count) => tracing::info!(count, root = %config.root.display(), "files loaded"),
        Err(error) => {
            tracing::error!(root = %config.root.display(), %error, "failed to read root directory");
            return ExitCode::FAILURE;
        }
    }

    let mut server = match Server::bind(config, files) {
        Ok(server) => server,
        Err(error) => {
            tracing::error!(%error, "failed to start server");
            return ExitCode::FAILURE;
        }
    };

    // Iniciar el servidor (esto bloqueará el thread)
    if let Err(error) = server.run() {
        tracing::error!(%error, "server stopped");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
