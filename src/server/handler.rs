//! # Handlers
//! src/server/handler.rs
//!
//! Un [`Handler`] recibe cada request completo y escribe la respuesta. El
//! servidor se encarga de los casos que el handler no cubre:
//!
//! - `Err(HandlerError::NotFound)` → `404 Not Found`
//! - cualquier otro error → `500 Internal Server Error`
//! - `Ok(())` sin terminar la respuesta → `500` al destruir el writer

use crate::buffer::BufferError;
use crate::http::{ParsedRequest, ResponseError, ResponseWriter};
use thiserror::Error;

/// Errores que un handler le devuelve al servidor
#[derive(Debug, Error)]
pub enum HandlerError {
    /// No existe el recurso pedido
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Response(#[from] ResponseError),
}

impl From<BufferError> for HandlerError {
    fn from(error: BufferError) -> Self {
        HandlerError::Response(error.into())
    }
}

/// Atiende un request ya parseado
///
/// `remainder` son los bytes que llegaron después del request en el mismo
/// chunk; el servidor los descarta después de llamar al handler.
pub trait Handler {
    fn handle(
        &self,
        request: &ParsedRequest,
        remainder: &[u8],
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError>;
}

/// Cualquier función con la firma correcta es un handler
impl<F> Handler for F
where
    F: Fn(&ParsedRequest, &[u8], &mut ResponseWriter<'_>) -> Result<(), HandlerError>,
{
    fn handle(
        &self,
        request: &ParsedRequest,
        remainder: &[u8],
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        self(request, remainder, response)
    }
}
