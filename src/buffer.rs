//! # Buffer de bytes
//! src/buffer.rs
//!
//! `ByteBuffer` es la memoria sobre la que trabajan el parser de requests y
//! el writer de responses. Es un arreglo de bytes propio que crece a la
//! siguiente potencia de dos y que expone su capacidad libre para que se
//! pueda leer (o formatear) directamente dentro de él.
//!
//! ## Invariantes
//!
//! - `len <= cap` siempre.
//! - La capacidad solo crece, salvo con `clear_capacity()`.
//! - Una [`View`] es un par `(offset, len)`: se resuelve contra el buffer en
//!   cada acceso, así que una realocación nunca deja una vista colgando.

use std::fmt;
use thiserror::Error;

/// Espacio que se reserva antes del primer intento de `append_formatted`,
/// para que el caso común se resuelva en una sola pasada.
const FORMAT_HEADROOM: usize = 128;

/// Errores que puede producir un `ByteBuffer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    /// No se pudo obtener memoria para crecer
    #[error("out of memory")]
    OutOfMemory,

    /// Una implementación de `Display` devolvió error
    #[error("formatting failed")]
    Format,

    /// El formateo pidió más espacio en la segunda pasada que en la primera
    #[error("formatted output changed size between passes")]
    FormatUnstable,
}

/// Arreglo de bytes propio y creciente.
///
/// Internamente toda la asignación está inicializada (en ceros al crecer),
/// lo que permite entregar `spare()` como un `&mut [u8]` normal.
#[derive(Debug, Default, Clone)]
pub struct ByteBuffer {
    /// Asignación de `cap` bytes; `bytes.len()` es la capacidad.
    bytes: Vec<u8>,

    /// Cantidad de bytes válidos al inicio de `bytes`.
    len: usize,
}

impl ByteBuffer {
    /// Crea un buffer vacío sin asignar memoria.
    pub fn new() -> Self {
        Self::default()
    }

    /// Crea un buffer con capacidad para al menos `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, BufferError> {
        let mut buffer = Self::new();
        buffer.reserve_total(capacity)?;
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Garantiza capacidad para `total` bytes en total.
    ///
    /// Si hace falta crecer, la nueva capacidad es la siguiente potencia de
    /// dos mayor o igual a `total`. Si ya alcanza, no hace nada.
    ///
    /// # Errores
    ///
    /// `BufferError::OutOfMemory` si la asignación falla.
    pub fn reserve_total(&mut self, total: usize) -> Result<(), BufferError> {
        if self.capacity() >= total {
            return Ok(());
        }

        let new_cap = total
            .checked_next_power_of_two()
            .ok_or(BufferError::OutOfMemory)?;

        self.bytes
            .try_reserve_exact(new_cap - self.bytes.len())
            .map_err(|_| BufferError::OutOfMemory)?;
        self.bytes.resize(new_cap, 0);

        Ok(())
    }

    /// Garantiza capacidad para `additional` bytes más.
    pub fn reserve_additional(&mut self, additional: usize) -> Result<(), BufferError> {
        let total = self
            .len
            .checked_add(additional)
            .ok_or(BufferError::OutOfMemory)?;
        self.reserve_total(total)
    }

    /// Copia `bytes` al final del buffer, creciendo si hace falta.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.reserve_additional(bytes.len())?;
        self.append_within_capacity(bytes);
        Ok(())
    }

    /// Copia `bytes` al final del buffer sin crecer.
    ///
    /// # Panics
    ///
    /// Si no hay capacidad reservada suficiente.
    pub fn append_within_capacity(&mut self, bytes: &[u8]) {
        let end = self.len + bytes.len();
        assert!(end <= self.capacity(), "append without reserved capacity");

        self.bytes[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    /// Agrega texto formateado al final del buffer.
    ///
    /// Primero intenta formatear dentro de la capacidad libre. Si no alcanza,
    /// crece exactamente lo que pidió el formateo y lo intenta una vez más.
    /// Retorna la cantidad de bytes escritos.
    ///
    /// # Ejemplo
    /// ```
    /// use userve::buffer::ByteBuffer;
    ///
    /// let mut buffer = ByteBuffer::new();
    /// buffer.append_formatted(format_args!("HTTP/1.1 {:03} {}", 200, "OK")).unwrap();
    /// assert_eq!(buffer.view(), b"HTTP/1.1 200 OK");
    /// ```
    pub fn append_formatted(&mut self, args: fmt::Arguments<'_>) -> Result<usize, BufferError> {
        self.reserve_additional(FORMAT_HEADROOM)?;

        for attempt in 0..2 {
            let mut writer = SpareWriter {
                spare: &mut self.bytes[self.len..],
                required: 0,
            };
            fmt::write(&mut writer, args).map_err(|_| BufferError::Format)?;

            let required = writer.required;
            if required <= writer.spare.len() {
                self.len += required;
                return Ok(required);
            }

            // Con los mismos argumentos la salida debería medir lo mismo.
            if attempt != 0 {
                break;
            }

            self.reserve_additional(required)?;
        }

        Err(BufferError::FormatUnstable)
    }

    /// Marca como válidos los primeros `n` bytes de `spare()`.
    ///
    /// # Panics
    ///
    /// Si `n` es mayor que la capacidad libre.
    pub fn commit(&mut self, n: usize) {
        assert!(n <= self.capacity() - self.len, "commit past capacity");
        self.len += n;
    }

    /// Recorta el contenido a `len` bytes. No libera memoria.
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Vacía el buffer conservando la capacidad.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Vacía el buffer y libera la memoria.
    pub fn clear_capacity(&mut self) {
        self.bytes = Vec::new();
        self.len = 0;
    }

    /// Contenido válido: `bytes[0..len]`
    pub fn view(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Capacidad libre: `bytes[len..cap]`
    pub fn spare(&mut self) -> &mut [u8] {
        &mut self.bytes[self.len..]
    }

    /// Convierte el buffer en un `Vec` con solo el contenido válido.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.bytes.truncate(self.len);
        self.bytes
    }
}

/// Destino de `fmt::write` que escribe lo que quepa en la capacidad libre y
/// cuenta cuánto habría necesitado en total.
struct SpareWriter<'a> {
    spare: &'a mut [u8],
    required: usize,
}

impl fmt::Write for SpareWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let start = self.required.min(self.spare.len());
        let end = (self.required + s.len()).min(self.spare.len());
        self.spare[start..end].copy_from_slice(&s.as_bytes()[..end - start]);

        self.required += s.len();
        Ok(())
    }
}

/// Rango `(offset, len)` dentro de un `ByteBuffer`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct View {
    offset: usize,
    len: usize,
}

impl View {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resuelve la vista contra el contenido actual de `buffer`.
    ///
    /// # Panics
    ///
    /// Si la vista cae fuera de `buffer.view()`.
    pub fn resolve<'a>(&self, buffer: &'a ByteBuffer) -> &'a [u8] {
        &buffer.view()[self.offset..self.offset + self.len]
    }
}
