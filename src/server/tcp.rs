//! # Servidor TCP
//! src/server/tcp.rs
//!
//! Atiende una conexión a la vez: acepta, lee en pedazos de
//! [`READ_CHUNK_SIZE`] bytes hasta tener un request, responde y cierra.
//! No hay keep-alive: lo que llega después del request se descarta.
//!
//! Para atender conexiones en paralelo basta con llamar a
//! [`Server::serve_connection`] desde otro thread por cada conexión; el
//! framer y el writer no comparten estado entre conexiones.

use super::handler::{Handler, HandlerError};
use super::listener::{Connection, Listener};
use crate::buffer::BufferError;
use crate::config::Config;
use crate::http::{
    ParseError, ParsedRequest, Progress, RequestFramer, ResponseError, ResponseState,
    ResponseWriter,
};
use std::any::Any;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

/// Bytes que se leen del socket por llamada
pub const READ_CHUNK_SIZE: usize = 512;

/// Errores al atender una conexión. Solo afectan a esa conexión.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to read request: {0}")]
    Read(#[source] io::Error),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// Servidor HTTP secuencial
pub struct Server<H> {
    config: Config,
    listener: Listener,
    handler: H,
}

impl<H: Handler> Server<H> {
    /// Escucha en todas las direcciones que resuelve `config.address`.
    ///
    /// Cada dirección prueba hasta 5 puertos desde `config.port`. Solo
    /// falla si no quedó escuchando en ninguna.
    pub fn bind(config: Config, handler: H) -> io::Result<Self> {
        let mut listener = Listener::new()?;

        let addresses = (config.address.as_str(), config.port).to_socket_addrs()?;
        for address in addresses {
            if let Err(error) = listener.listen_with_fallback(address) {
                tracing::warn!(%address, %error, "giving up on address");
            }
        }

        if listener.is_empty() {
            return Err(io::Error::new(
                ErrorKind::AddrNotAvailable,
                format!("could not listen on {}", config.address()),
            ));
        }

        Ok(Self {
            config,
            listener,
            handler,
        })
    }

    /// Direcciones donde quedó escuchando
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listener.local_addrs()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Atiende conexiones para siempre. Los errores de accept se registran
    /// y el loop sigue.
    pub fn run(&mut self) -> io::Result<()> {
        tracing::info!(addresses = ?self.local_addrs(), "accepting connections");

        loop {
            if let Err(error) = self.accept_one() {
                tracing::warn!(%error, "failed to accept connection");
            }
        }
    }

    /// Acepta una conexión y la atiende hasta cerrarla
    pub fn accept_one(&mut self) -> io::Result<()> {
        let mut connection = self.listener.accept()?;
        self.handle_connection(&mut connection);
        Ok(())
    }

    fn handle_connection(&self, connection: &mut Connection) {
        let span = tracing::info_span!("connection", peer = ?connection.peer_addr());
        let _enter = span.enter();

        if let Err(error) = self.serve_connection(connection) {
            tracing::warn!(%error, "connection failed");
        }
    }

    /// Lee un request de `stream`, lo responde y retorna.
    ///
    /// Si el cliente cierra antes de terminar el request no se responde
    /// nada. Un request malformado recibe `400 Bad Request`.
    pub fn serve_connection<S: Read + Write>(
        &self,
        stream: &mut S,
    ) -> Result<(), ConnectionError> {
        let mut framer = RequestFramer::with_limit(self.config.max_request_bytes);
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            let read = match stream.read(&mut chunk) {
                Ok(0) => {
                    tracing::debug!(
                        buffered = framer.buffered(),
                        "peer closed before a full request"
                    );
                    return Ok(());
                }
                Ok(read) => read,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(ConnectionError::Read(error)),
            };

            match framer.poll(&chunk[..read]) {
                Ok(Progress::Incomplete) => {}
                Ok(Progress::Done { request, remainder }) => {
                    return self.respond(stream, &request, remainder);
                }
                Err(ParseError::Malformed(reason)) => {
                    tracing::info!(%reason, "malformed request");
                    let mut response = ResponseWriter::new(&mut *stream, false);
                    response.bad_request()?;
                    return Ok(());
                }
                Err(ParseError::Buffer(error)) => return Err(error.into()),
            }
        }
    }

    fn respond<S: Write>(
        &self,
        stream: &mut S,
        request: &ParsedRequest,
        remainder: &[u8],
    ) -> Result<(), ConnectionError> {
        tracing::info!(
            method = %String::from_utf8_lossy(request.method()),
            target = %String::from_utf8_lossy(request.target()),
            "request"
        );
        if !remainder.is_empty() {
            tracing::debug!(bytes = remainder.len(), "discarding bytes after request");
        }

        let mut response = ResponseWriter::for_request(&mut *stream, request);

        // Un panic en el handler solo pierde esta conexión.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.handler.handle(request, remainder, &mut response)
        }));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(HandlerError::NotFound)) => response.not_found()?,
            Ok(Err(error)) => {
                tracing::warn!(%error, "handler failed");
                response.internal_server_error()?;
            }
            Err(payload) => {
                tracing::error!(panic = panic_message(&*payload), "handler panicked");
                response.internal_server_error()?;
            }
        }

        // En Headers el drop del writer envía el 500.
        if response.state() == ResponseState::BodyChunks {
            response.end()?;
        }

        tracing::debug!(status = response.status().as_u16(), "response sent");
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;
    use std::io::Cursor;
    use std::net::{Shutdown, TcpStream};
    use std::thread;

    /// Stream en memoria que entrega el input de a `step` bytes
    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        step: usize,
    }

    impl MockStream {
        fn new(input: &[u8]) -> Self {
            Self::with_step(input, usize::MAX)
        }

        fn with_step(input: &[u8], step: usize) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
                step,
            }
        }

        fn output(&self) -> String {
            String::from_utf8_lossy(&self.output).into_owned()
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(self.step);
            self.input.read(&mut buf[..len])
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn echo_target(
        request: &ParsedRequest,
        _remainder: &[u8],
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        response.set_status(StatusCode::OK);
        response.end_with_body(request.target())?;
        Ok(())
    }

    fn forgets_to_respond(
        _request: &ParsedRequest,
        _remainder: &[u8],
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        response.set_status(StatusCode::OK);
        response.add_header("X-Lost", "yes")?;
        Ok(())
    }

    fn never_found(
        _request: &ParsedRequest,
        _remainder: &[u8],
        _response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        Err(HandlerError::NotFound)
    }

    fn streams_body(
        _request: &ParsedRequest,
        _remainder: &[u8],
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        response.set_status(StatusCode::OK);
        response.write_chunk(b"part1,")?;
        response.write_chunk(b"part2")?;
        Ok(())
    }

    fn fails_midway(
        _request: &ParsedRequest,
        _remainder: &[u8],
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        response.set_status(StatusCode::OK);
        Err(HandlerError::Response(ResponseError::Io(io::Error::new(
            ErrorKind::Other,
            "disk on fire",
        ))))
    }

    fn panics_on_boom(
        request: &ParsedRequest,
        remainder: &[u8],
        response: &mut ResponseWriter<'_>,
    ) -> Result<(), HandlerError> {
        if request.target() == b"/boom" {
            panic!("handler blew up");
        }
        echo_target(request, remainder, response)
    }

    fn server<H: Handler>(handler: H) -> Server<H> {
        let config = Config {
            address: "127.0.0.1".to_string(),
            port: 0,
            ..Config::default()
        };
        Server::bind(config, handler).unwrap()
    }

    #[test]
    fn test_serve_simple_request() {
        let server = server(echo_target);
        let mut stream = MockStream::new(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n");

        server.serve_connection(&mut stream).unwrap();

        assert_eq!(
            stream.output(),
            "HTTP/1.1 200 OK\r\nContent-Length: 6\n\r\n/hello"
        );
    }

    #[test]
    fn test_serve_byte_by_byte() {
        let server = server(echo_target);
        let mut stream = MockStream::with_step(b"GET /slow HTTP/1.1\r\n\r\n", 1);

        server.serve_connection(&mut stream).unwrap();

        assert!(stream.output().ends_with("\r\n/slow"));
    }

    #[test]
    fn test_request_larger_than_one_read() {
        let server = server(echo_target);
        let target = format!("/{}", "a".repeat(READ_CHUNK_SIZE * 2));
        let raw = format!("GET {} HTTP/1.1\r\n\r\n", target);
        let mut stream = MockStream::new(raw.as_bytes());

        server.serve_connection(&mut stream).unwrap();

        assert!(stream.output().ends_with(&target));
    }

    #[test]
    fn test_head_request_has_no_body() {
        let server = server(echo_target);
        let mut stream = MockStream::new(b"HEAD /hello HTTP/1.1\r\n\r\n");

        server.serve_connection(&mut stream).unwrap();

        assert_eq!(stream.output(), "HTTP/1.1 200 OK\r\nContent-Length: 6\n\r\n");
    }

    #[test]
    fn test_malformed_request_gets_400() {
        let server = server(echo_target);
        let mut stream = MockStream::new(b" GET / HTTP/1.1\r\n\r\n");

        server.serve_connection(&mut stream).unwrap();

        assert!(stream.output().starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(stream.output().ends_with("bad request"));
    }

    #[test]
    fn test_oversized_request_gets_400() {
        let mut server = server(echo_target);
        server.config.max_request_bytes = 32;
        let mut stream = MockStream::new(&[b'A'; 100]);

        server.serve_connection(&mut stream).unwrap();

        assert!(stream.output().starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_peer_closes_before_request_ends() {
        let server = server(echo_target);
        let mut stream = MockStream::new(b"GET / HTTP/1.1\r\nHost:");

        server.serve_connection(&mut stream).unwrap();

        assert!(stream.output.is_empty());
    }

    #[test]
    fn test_handler_returning_early_gets_exactly_one_500() {
        let server = server(forgets_to_respond);
        let mut stream = MockStream::new(b"GET / HTTP/1.1\r\n\r\n");

        server.serve_connection(&mut stream).unwrap();

        let output = stream.output();
        assert_eq!(output.matches("HTTP/1.1 ").count(), 1);
        assert!(output.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(!output.contains("X-Lost"));
        assert!(output.ends_with("\n\r\ninternal server error"));
    }

    #[test]
    fn test_handler_not_found() {
        let server = server(never_found);
        let mut stream = MockStream::new(b"GET /missing HTTP/1.1\r\n\r\n");

        server.serve_connection(&mut stream).unwrap();

        assert!(stream.output().starts_with("HTTP/1.1 404 Not Found\r\n"));
    }

    #[test]
    fn test_handler_error_gets_500() {
        let server = server(fails_midway);
        let mut stream = MockStream::new(b"GET / HTTP/1.1\r\n\r\n");

        server.serve_connection(&mut stream).unwrap();

        assert!(stream.output().starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[test]
    fn test_streamed_body_is_finished() {
        let server = server(streams_body);
        let mut stream = MockStream::new(b"GET / HTTP/1.1\r\n\r\n");

        server.serve_connection(&mut stream).unwrap();

        assert_eq!(stream.output(), "HTTP/1.1 200 OK\r\n\r\npart1,part2");
    }

    #[test]
    fn test_bind_reports_local_addrs() {
        let server = server(echo_target);
        let addrs = server.local_addrs();

        assert_eq!(addrs.len(), 1);
        assert!(addrs[0].ip().is_loopback());
        assert_ne!(addrs[0].port(), 0);
    }

    #[test]
    fn test_bind_fails_without_addresses() {
        let config = Config {
            address: "192.0.2.1".to_string(),
            port: 8000,
            ..Config::default()
        };
        assert!(Server::bind(config, echo_target).is_err());
    }

    #[test]
    fn test_accept_one_over_tcp() {
        let mut server = server(echo_target);
        let addr = server.local_addrs()[0];

        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream.write_all(b"GET /tcp HTTP/1.0\r\n\r\n").unwrap();
            stream.shutdown(Shutdown::Write).unwrap();

            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        });

        server.accept_one().unwrap();

        let text = client.join().unwrap();
        assert!(text.contains("200 OK"));
        assert!(text.ends_with("/tcp"));
    }

    #[test]
    fn test_handler_panic_gets_500() {
        let server = server(panics_on_boom);
        let mut stream = MockStream::new(b"GET /boom HTTP/1.1\r\n\r\n");

        server.serve_connection(&mut stream).unwrap();

        let output = stream.output();
        assert_eq!(output.matches("HTTP/1.1 ").count(), 1);
        assert!(output.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[test]
    fn test_server_keeps_accepting_after_handler_panic() {
        let mut server = server(panics_on_boom);
        let addr = server.local_addrs()[0];

        let client = thread::spawn(move || {
            let mut responses = Vec::new();
            for target in ["/boom", "/after"] {
                let mut stream = TcpStream::connect(addr).unwrap();
                write!(stream, "GET {} HTTP/1.1\r\n\r\n", target).unwrap();
                stream.shutdown(Shutdown::Write).unwrap();

                let mut buf = Vec::new();
                stream.read_to_end(&mut buf).unwrap();
                responses.push(String::from_utf8_lossy(&buf).into_owned());
            }
            responses
        });

        server.accept_one().unwrap();
        server.accept_one().unwrap();

        let responses = client.join().unwrap();
        assert!(responses[0].starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(responses[1].starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(responses[1].ends_with("/after"));
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u32), "unknown panic");
    }
}
