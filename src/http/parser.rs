//! # Framer incremental de requests
//! src/http/parser.rs
//!
//! Los bytes de una conexión llegan en pedazos de cualquier tamaño. El
//! [`RequestFramer`] los acumula hasta encontrar la línea vacía que cierra
//! los headers y recién ahí parsea la request line.
//!
//! ## Ciclo de vida
//!
//! ```text
//! Collecting --poll()--> Collecting (Incomplete)
//!            --poll()--> Done       (Progress::Done)
//!            --poll()--> Failed     (Err(ParseError))
//! ```
//!
//! Un framer se usa para un solo request: una vez que retorna `Done` o un
//! error no se vuelve a llamar a `poll()`.
//!
//! ## Detección del fin de headers
//!
//! Se buscan dos `\n` seguidos (`\n\n`) o separados solo por un `\r`
//! (`\n\r\n`). Es más permisivo que HTTP: los finales de línea se validan
//! después, al parsear los campos.

use super::request::{Malformed, ParsedRequest};
use crate::buffer::{BufferError, ByteBuffer};
use memchr::memchr;
use thiserror::Error;

/// Tamaño máximo por defecto de request line + headers
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Errores de `RequestFramer::poll`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// El request no es HTTP válido; sus bytes se descartan
    #[error("malformed request: {0}")]
    Malformed(#[from] Malformed),

    /// No se pudo hacer crecer el buffer
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Resultado de un `poll()` exitoso
#[derive(Debug)]
pub enum Progress<'a> {
    /// Falta input; el framer conserva lo recibido
    Incomplete,

    /// Se encontró el fin del request
    Done {
        request: ParsedRequest,

        /// Bytes del último chunk que vienen después del request. Pertenecen
        /// al siguiente request y el framer no los guarda.
        remainder: &'a [u8],
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Collecting,
    Done,
    Failed,
}

/// Acumula chunks hasta tener un request completo
#[derive(Debug)]
pub struct RequestFramer {
    buffer: ByteBuffer,
    state: State,
    max_bytes: usize,
}

impl RequestFramer {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_REQUEST_BYTES)
    }

    /// Crea un framer que falla con `Malformed::TooLarge` si el request
    /// supera `max_bytes` sin terminar.
    pub fn with_limit(max_bytes: usize) -> Self {
        Self {
            buffer: ByteBuffer::new(),
            state: State::Collecting,
            max_bytes,
        }
    }

    /// Bytes acumulados hasta ahora
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_finished(&self) -> bool {
        self.state != State::Collecting
    }

    /// Agrega `chunk` y busca el fin del request.
    ///
    /// # Panics
    ///
    /// Si el framer ya retornó `Done` o un error.
    ///
    /// # Ejemplo
    /// ```
    /// use userve::http::{Progress, RequestFramer};
    ///
    /// let mut framer = RequestFramer::new();
    /// assert!(matches!(framer.poll(b"GET / HTTP/1.1\r").unwrap(), Progress::Incomplete));
    ///
    /// match framer.poll(b"\n\r\nnext").unwrap() {
    ///     Progress::Done { request, remainder } => {
    ///         assert_eq!(request.method(), b"GET");
    ///         assert_eq!(remainder, b"next");
    ///     }
    ///     Progress::Incomplete => unreachable!(),
    /// }
    /// ```
    pub fn poll<'a>(&mut self, chunk: &'a [u8]) -> Result<Progress<'a>, ParseError> {
        assert_eq!(
            self.state,
            State::Collecting,
            "RequestFramer polled after it finished"
        );

        if chunk.is_empty() {
            return Ok(Progress::Incomplete);
        }

        // El buffer puede terminar en `\n\r`; hay que mirar dos bytes atrás.
        let resume_at = self.buffer.len().saturating_sub(2);

        if let Err(error) = self.buffer.append(chunk) {
            self.fail();
            return Err(error.into());
        }

        let boundary = find_boundary(self.buffer.view(), resume_at);
        let end = match boundary {
            Some(newline) if newline < self.max_bytes => newline + 1,
            None if self.buffer.len() <= self.max_bytes => return Ok(Progress::Incomplete),
            _ => {
                self.fail();
                return Err(Malformed::TooLarge(self.max_bytes).into());
            }
        };

        // El límite siempre cae dentro del último chunk, así que lo que
        // sobra es un sufijo de `chunk`.
        let extra = self.buffer.len() - end;
        debug_assert!(extra < chunk.len());
        let remainder = &chunk[chunk.len() - extra..];

        self.buffer.truncate(end);
        let buffer = std::mem::take(&mut self.buffer);

        match ParsedRequest::parse(buffer) {
            Ok(request) => {
                self.state = State::Done;
                Ok(Progress::Done { request, remainder })
            }
            Err(reason) => {
                self.state = State::Failed;
                Err(reason.into())
            }
        }
    }

    fn fail(&mut self) {
        self.state = State::Failed;
        self.buffer.clear_capacity();
    }
}

impl Default for RequestFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Busca desde `start` la primera línea vacía y retorna el índice de su `\n`.
fn find_boundary(bytes: &[u8], start: usize) -> Option<usize> {
    let mut index = start;
    let mut previous: Option<usize> = None;

    while let Some(offset) = memchr(b'\n', &bytes[index..]) {
        let newline = index + offset;
        index = newline + 1;

        if let Some(prev) = previous {
            // `prev + 1` existe: hay al menos un byte (`newline`) después.
            if newline == prev + 1 || (newline == prev + 2 && bytes[prev + 1] == b'\r') {
                return Some(newline);
            }
        }

        previous = Some(newline);
    }

    None
}
