//! # Servidor de Archivos Estáticos
//! src/fileserver/mod.rs
//!
//! Al arrancar se recorre el directorio raíz y todos los archivos quedan
//! en memoria, indexados por URL. Cambios posteriores en disco no se ven
//! hasta reiniciar.
//!
//! ## URLs
//!
//! ```text
//! root/index.html        -> /
//! root/about.html        -> /about
//! root/docs/index.html   -> /docs/
//! root/img/logo.png      -> /img/logo.png
//! root/.git/...          -> (ignorado)
//! ```

pub mod mime;

use crate::buffer::{BufferError, ByteBuffer};
use crate::http::{ParsedRequest, ResponseWriter, StatusCode};
use crate::server::{Handler, HandlerError};
use memchr::memchr;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read};
use std::path::Path;

/// Tamaño del primer read; después se duplica según lo leído
const INITIAL_READ_SIZE: usize = 128;

/// Archivo cargado en memoria
#[derive(Debug)]
pub struct StaticFile {
    content_type: &'static str,
    contents: ByteBuffer,
}

impl StaticFile {
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn contents(&self) -> &[u8] {
        self.contents.view()
    }
}

/// Handler que sirve archivos desde memoria
#[derive(Debug, Default)]
pub struct FileServer {
    files: HashMap<String, StaticFile>,
}

impl FileServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carga todos los archivos bajo `path` y los publica bajo
    /// `url_prefix`. Retorna cuántos archivos se registraron.
    ///
    /// Los nombres que empiezan con `.` se ignoran. Si `path` no se puede
    /// leer retorna el error; los errores más abajo solo se registran.
    pub fn register_directory(&mut self, path: &Path, url_prefix: &str) -> io::Result<usize> {
        let entries = fs::read_dir(path)?;
        let base = url_prefix.trim_end_matches('/');

        let mut registered = 0;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "failed to read directory entry");
                    continue;
                }
            };

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                tracing::warn!(name = ?file_name, "skipping file with non UTF-8 name");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let entry_path = entry.path();
            let url = format!("{}/{}", base, name);

            // Sigue symlinks.
            let metadata = match fs::metadata(&entry_path) {
                Ok(metadata) => metadata,
                Err(error) => {
                    tracing::warn!(path = %entry_path.display(), %error, "failed to stat");
                    continue;
                }
            };

            if metadata.is_dir() {
                match self.register_directory(&entry_path, &url) {
                    Ok(count) => registered += count,
                    Err(error) => {
                        tracing::warn!(path = %entry_path.display(), %error, "failed to read directory");
                    }
                }
            } else if metadata.is_file() {
                match self.register_file(&entry_path, url) {
                    Ok(()) => registered += 1,
                    Err(error) => {
                        tracing::warn!(path = %entry_path.display(), %error, "failed to load file");
                    }
                }
            }
        }

        Ok(registered)
    }

    fn register_file(&mut self, path: &Path, url: String) -> io::Result<()> {
        let contents = read_file(path)?;
        let content_type = mime::content_type(&path.to_string_lossy());
        let url = public_url(url);

        tracing::debug!(%url, bytes = contents.len(), content_type, "registered file");
        self.files.insert(url, StaticFile { content_type, contents });
        Ok(())
    }

    /// Busca el archivo publicado en `url` (sin query string)
    pub fn get(&self, url: &str) -> Option<&StaticFile> {
        self.files.get(url)
    }

    /// URLs publicadas, sin orden
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Handler for FileServer {
    fn handle(
        &self,
        request: &ParsedRequest,
        _remainder: &[u8],
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        let target = request.target();
        let path = match memchr(b'?', target) {
            Some(query) => &target[..query],
            None => target,
        };

        let file = std::str::from_utf8(path)
            .ok()
            .and_then(|path| self.get(path))
            .ok_or(HandlerError::NotFound)?;

        response.set_status(StatusCode::OK);
        response.add_header("Content-Type", file.content_type)?;
        response.end_with_body(file.contents())?;
        Ok(())
    }
}

/// `/dir/index.html` -> `/dir/`, `/page.html` -> `/page`
fn public_url(mut url: String) -> String {
    if url.ends_with("index.html") {
        url.truncate(url.len() - "index.html".len());
    }
    if url.ends_with(".html") {
        url.truncate(url.len() - ".html".len());
    }
    url
}

/// Lee el archivo completo, creciendo el buffer según lo que va llegando
fn read_file(path: &Path) -> io::Result<ByteBuffer> {
    let mut file = File::open(path)?;
    let mut contents = ByteBuffer::new();
    let mut read_size = INITIAL_READ_SIZE;

    loop {
        contents
            .reserve_additional(read_size)
            .map_err(|error: BufferError| io::Error::new(ErrorKind::OutOfMemory, error))?;

        let read = match file.read(contents.spare()) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };

        contents.commit(read);
        read_size = read.saturating_mul(2);
    }

    Ok(contents)
}
