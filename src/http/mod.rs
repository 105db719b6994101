//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Implementa lo mínimo de HTTP/1.x para servir archivos, sin librerías
//! de alto nivel:
//!
//! - Framing incremental de requests (los bytes llegan en pedazos)
//! - Parsing de la request line
//! - Escritura de responses con una máquina de estados
//! - Status codes
//!
//! ### Formato de Request
//!
//! ```text
//! GET /path?query=value HTTP/1.1\r\n
//! Header-Name: Header-Value\r\n
//! \r\n
//! ```
//!
//! Los headers no se interpretan: se exponen como un bloque de bytes.
//!
//! ### Formato de Response
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/html; charset=utf-8\n
//! Content-Length: 13\n
//! \r\n
//! <h1>Hola</h1>
//! ```

pub mod parser; // Framing incremental
pub mod request; // Campos de la request line
pub mod response; // Escritura de responses
pub mod status; // Códigos de estado HTTP

// Re-exportamos los tipos principales para facilitar su uso
pub use parser::{ParseError, Progress, RequestFramer, DEFAULT_MAX_REQUEST_BYTES};
pub use request::{Malformed, ParsedRequest};
pub use response::{ResponseError, ResponseState, ResponseWriter};
pub use status::StatusCode;
