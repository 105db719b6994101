//! # Content-Type por extensión
//! src/fileserver/mime.rs
//!
//! Tabla fija de sufijos. Gana el primero que coincide; la comparación
//! distingue mayúsculas.

/// Content-Type para archivos sin extensión conocida
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPES: &[(&str, &str)] = &[
    (".txt", "text/plain; charset=utf-8"),
    (".html", "text/html; charset=utf-8"),
    (".css", "text/css; charset=utf-8"),
    (".js", "text/javascript; charset=utf-8"),
    (".wasm", "application/wasm"),
    (".md", "text/markdown; charset=utf-8"),
    (".pdf", "application/pdf"),
    (".ttf", "font/ttf"),
    (".otf", "font/otf"),
    (".woff", "font/woff"),
    (".woff2", "font/woff2"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".svg", "image/svg+xml"),
    (".ico", "image/vnd.microsoft.icon"),
    (".mp3", "audio/mpeg"),
    (".ogg", "application/ogg"),
    (".mp4", "video/mp4"),
];

/// Detecta el Content-Type de `path` por su sufijo
///
/// # Ejemplo
/// ```
/// use userve::fileserver::mime::content_type;
///
/// assert_eq!(content_type("site/index.html"), "text/html; charset=utf-8");
/// assert_eq!(content_type("Makefile"), "application/octet-stream");
/// ```
pub fn content_type(path: &str) -> &'static str {
    CONTENT_TYPES
        .iter()
        .find(|(suffix, _)| path.ends_with(suffix))
        .map(|&(_, content_type)| content_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_types() {
        assert_eq!(content_type("a.txt"), "text/plain; charset=utf-8");
        assert_eq!(content_type("style.css"), "text/css; charset=utf-8");
        assert_eq!(content_type("app.js"), "text/javascript; charset=utf-8");
        assert_eq!(content_type("README.md"), "text/markdown; charset=utf-8");
    }

    #[test]
    fn test_binary_types() {
        assert_eq!(content_type("logo.png"), "image/png");
        assert_eq!(content_type("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type("photo.jpg"), "image/jpeg");
        assert_eq!(content_type("font.woff"), "font/woff");
        assert_eq!(content_type("font.woff2"), "font/woff2");
        assert_eq!(content_type("favicon.ico"), "image/vnd.microsoft.icon");
        assert_eq!(content_type("module.wasm"), "application/wasm");
    }

    #[test]
    fn test_unknown_and_case() {
        assert_eq!(content_type("archive.tar.gz"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type("PHOTO.PNG"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type(""), DEFAULT_CONTENT_TYPE);
    }
}
