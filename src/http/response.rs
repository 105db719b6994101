//! # Escritura de Respuestas HTTP
//! src/http/response.rs
//!
//! [`ResponseWriter`] escribe una respuesta directo sobre la conexión. Los
//! headers se acumulan en un [`ByteBuffer`] hasta que se envía el body.
//!
//! ## Estados
//!
//! ```text
//! Headers --end_with_body()--> Done
//! Headers --write_chunk()----> BodyChunks --end()--> Done
//! ```
//!
//! ## Formato de una respuesta
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/plain; charset=utf-8\n
//! Content-Length: 5\n
//! \r\n
//! hello
//! ```
//!
//! Las líneas de header terminan en `\n`, no en `\r\n`. Los clientes
//! comunes lo aceptan; es una diferencia conocida con el RFC.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use userve::http::{ResponseWriter, StatusCode};
//!
//! let mut out = Vec::new();
//! let mut response = ResponseWriter::new(&mut out, false);
//! response.set_status(StatusCode::OK);
//! response.add_header("Content-Type", "text/plain").unwrap();
//! response.end_with_body(b"hello").unwrap();
//! drop(response);
//!
//! assert!(out.starts_with(b"HTTP/1.1 200 OK\r\n"));
//! assert!(out.ends_with(b"\r\nhello"));
//! ```

use super::request::ParsedRequest;
use super::StatusCode;
use crate::buffer::{BufferError, ByteBuffer};
use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// Content-Type de las respuestas canned
pub const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Errores al escribir una respuesta
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error("failed to write response: {0}")]
    Io(#[from] io::Error),
}

/// Estado de un [`ResponseWriter`]; solo avanza
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    /// Todavía se pueden cambiar status y headers
    Headers,
    /// Headers enviados, body en curso (sin Content-Length)
    BodyChunks,
    /// Respuesta terminada
    Done,
}

/// Escribe una respuesta HTTP sobre `out`
///
/// Si se destruye sin haber enviado nada, envía un `500 Internal Server
/// Error`: toda conexión que llega a un handler recibe una respuesta
/// completa.
pub struct ResponseWriter<'a> {
    out: &'a mut dyn Write,
    status: StatusCode,

    /// Líneas `Name: value\n` en orden de inserción
    headers: ByteBuffer,

    state: ResponseState,

    /// En un HEAD no se envía el body
    head_request: bool,

    /// Hace fallar el próximo armado de headers
    #[cfg(test)]
    fail_next_head: bool,
}

impl<'a> ResponseWriter<'a> {
    /// Crea un writer con status 500 y sin headers.
    pub fn new(out: &'a mut dyn Write, head_request: bool) -> Self {
        Self {
            out,
            status: StatusCode::default(),
            headers: ByteBuffer::new(),
            state: ResponseState::Headers,
            head_request,
            #[cfg(test)]
            fail_next_head: false,
        }
    }

    /// Crea el writer que responde a `request`
    pub fn for_request(out: &'a mut dyn Write, request: &ParsedRequest) -> Self {
        Self::new(out, request.is_head())
    }

    pub fn state(&self) -> ResponseState {
        self.state
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_head_request(&self) -> bool {
        self.head_request
    }

    /// # Panics
    ///
    /// Si los headers ya se enviaron.
    pub fn set_status(&mut self, status: StatusCode) {
        self.expect_headers_state("set_status");
        self.status = status;
    }

    /// Agrega un header tal cual. Se permiten nombres duplicados y no se
    /// valida el contenido.
    ///
    /// # Panics
    ///
    /// Si los headers ya se enviaron.
    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), BufferError> {
        self.expect_headers_state("add_header");

        let line_len = name
            .len()
            .checked_add(value.len())
            .and_then(|len| len.checked_add(3))
            .ok_or(BufferError::OutOfMemory)?;
        self.headers.reserve_additional(line_len)?;

        self.headers.append_within_capacity(name.as_bytes());
        self.headers.append_within_capacity(b": ");
        self.headers.append_within_capacity(value.as_bytes());
        self.headers.append_within_capacity(b"\n");
        Ok(())
    }

    /// Descarta los headers agregados hasta ahora
    ///
    /// # Panics
    ///
    /// Si los headers ya se enviaron.
    pub fn clear_headers(&mut self) {
        self.expect_headers_state("clear_headers");
        self.headers.clear();
    }

    /// Envía la respuesta completa con `Content-Length`.
    ///
    /// Si no se pueden armar los headers no se escribe nada y el writer
    /// sigue en `Headers`, así que todavía puede enviar un 500. Una vez que
    /// empieza a escribir queda en `Done` aunque falle la escritura. En un
    /// HEAD el body no se envía, pero `Content-Length` es su largo real.
    ///
    /// # Panics
    ///
    /// Si los headers ya se enviaron.
    pub fn end_with_body(&mut self, body: &[u8]) -> Result<(), ResponseError> {
        self.expect_headers_state("end_with_body");

        let head = self.compose_head(Some(body.len()))?;
        self.state = ResponseState::Done;
        self.out.write_all(head.view())?;

        if !self.head_request {
            self.out.write_all(body)?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// Envía parte de un body de largo desconocido. La primera llamada
    /// envía los headers sin `Content-Length`; el cierre de la conexión
    /// marca el fin del body.
    ///
    /// # Panics
    ///
    /// Si la respuesta ya terminó.
    pub fn write_chunk(&mut self, bytes: &[u8]) -> Result<(), ResponseError> {
        match self.state {
            ResponseState::Headers => {
                let head = self.compose_head(None)?;
                self.state = ResponseState::BodyChunks;
                if let Err(error) = self.out.write_all(head.view()) {
                    self.state = ResponseState::Done;
                    return Err(error.into());
                }
            }
            ResponseState::BodyChunks => {}
            ResponseState::Done => panic!("write_chunk called on a finished response"),
        }

        if !self.head_request {
            self.out.write_all(bytes)?;
        }
        Ok(())
    }

    /// Termina la respuesta. Sin body enviado equivale a
    /// `end_with_body(b"")`; si ya terminó no hace nada.
    pub fn end(&mut self) -> Result<(), ResponseError> {
        match self.state {
            ResponseState::Headers => self.end_with_body(b""),
            ResponseState::BodyChunks => {
                self.state = ResponseState::Done;
                self.out.flush()?;
                Ok(())
            }
            ResponseState::Done => Ok(()),
        }
    }

    /// `404 Not Found`. No hace nada si los headers ya se enviaron.
    pub fn not_found(&mut self) -> Result<(), ResponseError> {
        self.canned(StatusCode::NOT_FOUND, "not found")
    }

    /// `400 Bad Request`. No hace nada si los headers ya se enviaron.
    pub fn bad_request(&mut self) -> Result<(), ResponseError> {
        self.canned(StatusCode::BAD_REQUEST, "bad request")
    }

    /// `500 Internal Server Error`. No hace nada si los headers ya se
    /// enviaron.
    pub fn internal_server_error(&mut self) -> Result<(), ResponseError> {
        self.canned(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    fn canned(&mut self, status: StatusCode, body: &str) -> Result<(), ResponseError> {
        if self.state != ResponseState::Headers {
            return Ok(());
        }

        self.clear_headers();
        self.set_status(status);
        self.add_header("Content-Type", PLAIN_TEXT)?;
        self.end_with_body(body.as_bytes())
    }

    /// Arma status line, headers y línea vacía para enviarlos en un solo
    /// write. No toca el estado: si falla, los headers siguen intactos.
    fn compose_head(&mut self, content_length: Option<usize>) -> Result<ByteBuffer, BufferError> {
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_head) {
            return Err(BufferError::OutOfMemory);
        }

        let mut head = ByteBuffer::new();
        head.append_formatted(format_args!(
            "HTTP/1.1 {:03} {}\r\n",
            self.status.as_u16(),
            self.status.reason_phrase()
        ))?;
        head.append(self.headers.view())?;
        if let Some(len) = content_length {
            head.append_formatted(format_args!("Content-Length: {}\n", len))?;
        }
        head.append(b"\r\n")?;

        self.headers.clear_capacity();
        Ok(head)
    }

    fn expect_headers_state(&self, operation: &str) {
        assert_eq!(
            self.state,
            ResponseState::Headers,
            "{} called after headers were sent",
            operation
        );
    }
}

impl Drop for ResponseWriter<'_> {
    fn drop(&mut self) {
        if self.state != ResponseState::Headers {
            return;
        }

        tracing::debug!("response dropped before sending headers, sending 500");
        if let Err(error) = self.internal_server_error() {
            tracing::warn!(%error, "failed to send default 500 response");
        }
    }
}

impl fmt::Debug for ResponseWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("status", &self.status)
            .field("state", &self.state)
            .field("head_request", &self.head_request)
            .field("headers", &String::from_utf8_lossy(self.headers.view()))
            .finish()
    }
}
