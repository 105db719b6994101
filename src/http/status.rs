//! # Códigos de Estado HTTP
//! src/http/status.rs
//!
//! El servidor solo genera cuatro códigos por su cuenta, pero un handler
//! puede responder con cualquiera. Los códigos que no están en la tabla se
//! envían con reason phrase vacía:
//!
//! - **2xx**: Éxito (200 OK)
//! - **4xx**: Error del cliente (400, 404)
//! - **5xx**: Error del servidor (500)

use std::fmt;

/// Código de estado HTTP de tres dígitos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    /// 200 OK - La petición fue exitosa
    pub const OK: StatusCode = StatusCode(200);

    /// 400 Bad Request - El request no se pudo parsear
    pub const BAD_REQUEST: StatusCode = StatusCode(400);

    /// 404 Not Found - Ruta o recurso no encontrado
    pub const NOT_FOUND: StatusCode = StatusCode(404);

    /// 500 Internal Server Error - Estado por defecto de toda respuesta
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    /// Crea un código arbitrario
    ///
    /// # Ejemplo
    /// ```
    /// use userve::http::StatusCode;
    /// assert_eq!(StatusCode::from_u16(200), StatusCode::OK);
    /// ```
    pub const fn from_u16(code: u16) -> Self {
        StatusCode(code)
    }

    pub const fn as_u16(&self) -> u16 {
        self.0
    }

    /// Retorna el texto de razón (reason phrase) asociado al código
    ///
    /// # Ejemplo
    /// ```
    /// use userve::http::StatusCode;
    /// assert_eq!(StatusCode::OK.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::from_u16(418).reason_phrase(), "");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self.0 {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "",
        }
    }

    /// Verifica si el código indica éxito (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Verifica si el código indica error del cliente (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// Verifica si el código indica error del servidor (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    /// Formato: "200 OK", o solo "418" si no hay reason phrase
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason_phrase() {
            "" => write!(f, "{:03}", self.0),
            reason => write!(f, "{:03} {}", self.0, reason),
        }
    }
}
