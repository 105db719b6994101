//! Tests de integración para el servidor HTTP
//! tests/integration_test.rs
//!
//! Cada test levanta su propio servidor en un puerto efímero de
//! 127.0.0.1, sirviendo un directorio temporal, y le habla por TCP.

use std::fs;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;
use userve::config::Config;
use userve::fileserver::FileServer;
use userve::server::Server;

/// Helper: crea un sitio de prueba y deja un servidor corriendo en background
fn start_server() -> SocketAddr {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("index.html"), "<h1>hola</h1>").unwrap();
    fs::write(dir.path().join("notes.txt"), "some notes").unwrap();
    fs::create_dir(dir.path().join("blog")).unwrap();
    fs::write(dir.path().join("blog").join("first.html"), "first post").unwrap();

    let mut files = FileServer::new();
    files.register_directory(dir.path(), "/").unwrap();

    let config = Config {
        address: "127.0.0.1".to_string(),
        port: 0,
        ..Config::default()
    };
    let mut server = Server::bind(config, files).expect("bind");
    let addr = server.local_addrs()[0];

    thread::spawn(move || server.run());
    addr
}

/// Helper: envía los pedazos con una pausa entre cada uno y retorna la
/// response completa
fn send_chunks(addr: SocketAddr, chunks: &[&[u8]]) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.set_write_timeout(Some(Duration::from_secs(5))).unwrap();

    for chunk in chunks {
        stream.write_all(chunk).unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(5));
    }

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

fn send_request(addr: SocketAddr, raw: &str) -> String {
    send_chunks(addr, &[raw.as_bytes()])
}

/// Helper: extrae el body de una response HTTP
fn extract_body(response: &str) -> &str {
    // Los headers terminan en "\n" y la línea vacía es "\r\n"
    if let Some(pos) = response.find("\n\r\n") {
        &response[pos + 3..]
    } else {
        ""
    }
}

#[test]
fn test_get_index() {
    let addr = start_server();
    let response = send_request(addr, "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "got: {}", response);
    assert!(response.contains("Content-Type: text/html; charset=utf-8\n"));
    assert!(response.contains("Content-Length: 13\n"));
    assert_eq!(extract_body(&response), "<h1>hola</h1>");
}

#[test]
fn test_get_nested_page_without_extension() {
    let addr = start_server();
    let response = send_request(addr, "GET /blog/first HTTP/1.0\r\n\r\n");

    assert!(response.contains("200 OK"));
    assert_eq!(extract_body(&response), "first post");
}

#[test]
fn test_query_string_is_ignored() {
    let addr = start_server();
    let response = send_request(addr, "GET /notes.txt?download=1 HTTP/1.1\r\n\r\n");

    assert!(response.contains("Content-Type: text/plain; charset=utf-8\n"));
    assert_eq!(extract_body(&response), "some notes");
}

#[test]
fn test_head_request() {
    let addr = start_server();
    let response = send_request(addr, "HEAD /notes.txt HTTP/1.1\r\n\r\n");

    assert!(response.contains("200 OK"));
    assert!(response.contains("Content-Length: 10\n"));
    assert_eq!(extract_body(&response), "");
}

#[test]
fn test_not_found() {
    let addr = start_server();
    let response = send_request(addr, "GET /missing HTTP/1.1\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert_eq!(extract_body(&response), "not found");
}

#[test]
fn test_malformed_request() {
    let addr = start_server();
    let response = send_request(addr, "GET / HTTP/1.1\r\n bad header\r\n\r\n");

    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert_eq!(extract_body(&response), "bad request");
}

#[test]
fn test_request_sent_byte_by_byte() {
    let addr = start_server();
    let raw = b"GET /notes.txt HTTP/1.1\r\n\r\n";
    let chunks: Vec<&[u8]> = raw.chunks(1).collect();

    let response = send_chunks(addr, &chunks);
    assert_eq!(extract_body(&response), "some notes");
}

#[test]
fn test_pipelined_request_is_discarded() {
    let addr = start_server();
    let response = send_request(
        addr,
        "GET /notes.txt HTTP/1.1\r\n\r\nGET /missing HTTP/1.1\r\n\r\n",
    );

    // Sin keep-alive: solo se responde el primero.
    assert_eq!(response.matches("HTTP/1.1 ").count(), 1);
    assert_eq!(extract_body(&response), "some notes");
}

#[test]
fn test_server_survives_client_that_disconnects() {
    let addr = start_server();

    let mut stream = TcpStream::connect(addr).unwrap();
    stream.write_all(b"GET / HTT").unwrap();
    stream.shutdown(Shutdown::Both).unwrap();
    drop(stream);

    let response = send_request(addr, "GET / HTTP/1.1\r\n\r\n");
    assert!(response.contains("200 OK"));
}

#[test]
fn test_sequential_requests() {
    let addr = start_server();

    for _ in 0..5 {
        let response = send_request(addr, "GET /notes.txt HTTP/1.1\r\n\r\n");
        assert_eq!(extract_body(&response), "some notes");
    }
}
