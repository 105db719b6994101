//! # userve
//! src/lib.rs
//!
//! Servidor HTTP/1.x de archivos estáticos, implementado sobre sockets sin
//! frameworks HTTP.
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `buffer`: Buffer de bytes que crece en potencias de dos
//! - `http`: Framing incremental, parsing y escritura de responses
//! - `server`: Listener multi-dirección, handlers y loop de conexiones
//! - `fileserver`: Handler que sirve un directorio desde memoria
//! - `config`: Argumentos CLI y variables de entorno
//! - `logging`: Inicialización de `tracing`
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use userve::config::Config;
//! use userve::fileserver::FileServer;
//! use userve::server::Server;
//!
//! let config = Config::default();
//! let mut files = FileServer::new();
//! files.register_directory(&config.root, "/").expect("Error al leer el directorio");
//!
//! let mut server = Server::bind(config, files).expect("Error al iniciar servidor");
//! server.run().expect("Error en el servidor");
//! ```

pub mod buffer;
pub mod config;
pub mod fileserver;
pub mod http;
pub mod logging;
pub mod server;
