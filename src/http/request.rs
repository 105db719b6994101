//! # Requests HTTP parseados
//! src/http/request.rs
//!
//! Un [`ParsedRequest`] es dueño del buffer que produjo el framer y guarda
//! vistas hacia sus campos. No hay copias: `method()`, `target()`,
//! `version()` y `headers()` se resuelven contra el buffer en cada llamada.
//!
//! ## Formato aceptado
//!
//! ```text
//! METHOD SP+ TARGET [SP+ VERSION] \r\n
//! (línea de header \r\n)*
//! \r\n
//! ```
//!
//! - El método son solo letras mayúsculas `A`-`Z`.
//! - El target es cualquier byte visible (sin espacios, tabs ni control).
//! - La versión es opcional: sin ella es un Simple-Request de HTTP/1.0.
//! - Los headers no se separan en nombre/valor; solo se exige que cada
//!   línea termine en `\r\n` y que no empiece con espacio o tab.

use crate::buffer::{ByteBuffer, View};
use memchr::memchr;
use std::fmt;
use thiserror::Error;

/// Motivo por el que un request no es válido
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Malformed {
    /// No hay método, o no empieza con una letra mayúscula. Incluye el
    /// request line que empieza con espacio: `" GET /"` cae acá.
    #[error("missing or invalid method")]
    EmptyMethod,

    /// Falta el espacio entre método y target
    #[error("missing space after method")]
    MissingSeparator,

    /// Falta el target
    #[error("missing request target")]
    EmptyTarget,

    /// La request line tiene bytes extra o no termina en CRLF
    #[error("request line not terminated by CRLF")]
    UnterminatedRequestLine,

    /// Un `\n` sin `\r` antes
    #[error("bare LF line ending")]
    BareNewline,

    /// Una línea de header que empieza con espacio o tab
    #[error("header line starts with whitespace")]
    LeadingWhitespace,

    /// Se superó el tamaño máximo antes de encontrar el fin del request
    #[error("request exceeds {0} bytes")]
    TooLarge(usize),
}

/// Request HTTP completo, dueño de sus bytes
pub struct ParsedRequest {
    /// Todo el request, desde el método hasta la línea vacía inclusive.
    buffer: ByteBuffer,

    method: View,
    target: View,
    version: View,
    headers: View,
}

impl ParsedRequest {
    /// Parsea los campos de `buffer`, que debe terminar en el límite del
    /// request (la línea vacía).
    ///
    /// Si falla, `buffer` se libera.
    pub(crate) fn parse(buffer: ByteBuffer) -> Result<Self, Malformed> {
        let bytes = buffer.view();
        let mut cursor = Cursor { bytes, pos: 0 };

        let method = cursor.cut(is_method_byte);
        if method.is_empty() {
            return Err(Malformed::EmptyMethod);
        }
        if !cursor.skip_spaces() {
            return Err(Malformed::MissingSeparator);
        }

        let target = cursor.cut(is_target_byte);
        if target.is_empty() {
            return Err(Malformed::EmptyTarget);
        }

        let version = if cursor.skip_spaces() {
            cursor.cut(is_version_byte)
        } else {
            View::new(cursor.pos, 0)
        };

        // Si quedan bytes antes del fin de línea, hay campos de más.
        if cursor.rest().starts_with(b"\r\n") {
            cursor.pos += 2;
        } else if cursor.rest().starts_with(b"\n") {
            return Err(Malformed::BareNewline);
        } else {
            return Err(Malformed::UnterminatedRequestLine);
        }

        let headers = header_block(bytes, cursor.pos)?;

        Ok(Self {
            buffer,
            method,
            target,
            version,
            headers,
        })
    }

    /// Método HTTP, ej. `GET`
    pub fn method(&self) -> &[u8] {
        self.method.resolve(&self.buffer)
    }

    /// Target tal como llegó, ej. `/docs/?page=2`
    pub fn target(&self) -> &[u8] {
        self.target.resolve(&self.buffer)
    }

    /// Versión HTTP; vacía para un Simple-Request
    pub fn version(&self) -> &[u8] {
        self.version.resolve(&self.buffer)
    }

    /// Bloque de headers sin parsear: cada línea termina en `\r\n`, sin
    /// incluir la línea vacía final.
    pub fn headers(&self) -> &[u8] {
        self.headers.resolve(&self.buffer)
    }

    /// Todo el request tal como llegó
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.view()
    }

    pub fn is_head(&self) -> bool {
        self.method() == b"HEAD"
    }
}

impl fmt::Debug for ParsedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedRequest")
            .field("method", &String::from_utf8_lossy(self.method()))
            .field("target", &String::from_utf8_lossy(self.target()))
            .field("version", &String::from_utf8_lossy(self.version()))
            .field("headers_len", &self.headers.len())
            .finish()
    }
}

/// Valida las líneas de header que empiezan en `start` y retorna la vista
/// del bloque, sin la línea vacía.
fn header_block(bytes: &[u8], start: usize) -> Result<View, Malformed> {
    let mut pos = start;

    loop {
        let rest = &bytes[pos..];
        let newline = memchr(b'\n', rest).ok_or(Malformed::UnterminatedRequestLine)?;

        if newline == 0 || rest[newline - 1] != b'\r' {
            return Err(Malformed::BareNewline);
        }

        let line = &rest[..newline - 1];
        match line.first().copied() {
            None => return Ok(View::new(start, pos - start)),
            Some(b' ' | b'\t') => return Err(Malformed::LeadingWhitespace),
            Some(_) => pos += newline + 1,
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn rest(&self) -> &[u8] {
        &self.bytes[self.pos..]
    }

    /// Corta el campo más largo de bytes que cumplen `allow`.
    fn cut(&mut self, allow: fn(u8) -> bool) -> View {
        let start = self.pos;
        let len = self.rest().iter().take_while(|&&b| allow(b)).count();
        self.pos += len;
        View::new(start, len)
    }

    /// Consume uno o más espacios. Retorna `false` si no había ninguno.
    fn skip_spaces(&mut self) -> bool {
        let count = self.rest().iter().take_while(|&&b| b == b' ').count();
        self.pos += count;
        count > 0
    }
}

fn is_method_byte(byte: u8) -> bool {
    byte.is_ascii_uppercase()
}

fn is_target_byte(byte: u8) -> bool {
    // Excluye espacio, \t, \r, \n y el resto de caracteres de control.
    byte > b' ' && byte != 0x7f
}

/// `token` según RFC 9110, apéndice A
fn is_token_byte(byte: u8) -> bool {
    matches!(
        byte,
        b'!' | b'#'
            | b'$'
            | b'%'
            | b'&'
            | b'\''
            | b'*'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~'
    ) || byte.is_ascii_alphanumeric()
}

fn is_version_byte(byte: u8) -> bool {
    is_token_byte(byte) || byte == b'/' || byte == b'.'
}
