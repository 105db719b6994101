//! # Listener multi-dirección
//! src/server/listener.rs
//!
//! Un [`Listener`] escucha en varias direcciones a la vez (por ejemplo
//! `127.0.0.1` y `::1` para `localhost`) y espera conexiones en todas con
//! un solo `Poller` (epoll/kqueue).
//!
//! ## Orden de aceptación
//!
//! Si varios sockets tienen conexiones pendientes, gana el primero que se
//! registró. No es justo: un socket muy cargado puede postergar a los que
//! vienen después.
//!
//! ## Fallback de puertos
//!
//! Si un puerto está ocupado se prueba con el siguiente, hasta
//! [`PORT_ATTEMPTS`] intentos y sin pasar de 65535.

use polling::{Event, Poller};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;

/// Máximo de sockets por listener
pub const MAX_ADDRESSES: usize = 32;

/// Backlog de `listen(2)`
pub const BACKLOG: i32 = 32;

/// Puertos que se prueban por dirección, contando el original
pub const PORT_ATTEMPTS: u16 = 5;

/// Dirección donde escuchar: familia, tipo de socket y dirección propia
#[derive(Debug, Clone)]
pub struct ListenAddress {
    domain: Domain,
    socket_type: Type,
    protocol: Option<Protocol>,
    address: SockAddr,
}

impl ListenAddress {
    pub fn new(domain: Domain, socket_type: Type, address: SockAddr) -> Self {
        Self {
            domain,
            socket_type,
            protocol: None,
            address,
        }
    }

    /// Socket TCP en `address`
    pub fn tcp(address: SocketAddr) -> Self {
        Self {
            domain: Domain::for_address(address),
            socket_type: Type::STREAM,
            protocol: Some(Protocol::TCP),
            address: SockAddr::from(address),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn socket_type(&self) -> Type {
        self.socket_type
    }

    /// La dirección como IP y puerto, si es IPv4 o IPv6
    pub fn as_socket(&self) -> Option<SocketAddr> {
        self.address.as_socket()
    }
}

impl From<SocketAddr> for ListenAddress {
    fn from(address: SocketAddr) -> Self {
        Self::tcp(address)
    }
}

/// Socket escuchando, registrado en el poller con su índice como key
struct BoundSocket {
    socket: Socket,
    address: ListenAddress,
}

/// Conexión aceptada. Se cierra al destruirla.
pub struct Connection {
    socket: Socket,
    peer: SockAddr,
}

impl Connection {
    /// Dirección del cliente
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer.as_socket()
    }

    /// Dirección local (la del socket que la aceptó)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()?.as_socket()
    }

    pub fn socket(&self) -> &Socket {
        &self.socket
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.socket.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.socket.flush()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer_addr())
            .field("local", &self.local_addr())
            .finish()
    }
}

/// Conjunto de sockets escuchando, multiplexados con un `Poller`
pub struct Listener {
    poller: Poller,
    sockets: Vec<BoundSocket>,
    events: Vec<Event>,
}

impl Listener {
    /// Crea un listener vacío
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poller: Poller::new()?,
            sockets: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Abre un socket en `address`, lo pone a escuchar y lo registra.
    ///
    /// Si algo falla el socket se cierra y el listener queda igual. Con
    /// [`MAX_ADDRESSES`] sockets ya registrados falla con
    /// `ErrorKind::OutOfMemory`.
    pub fn listen(&mut self, address: &ListenAddress) -> io::Result<()> {
        if self.sockets.len() >= MAX_ADDRESSES {
            return Err(io::Error::new(
                ErrorKind::OutOfMemory,
                format!("listener already has {} sockets", MAX_ADDRESSES),
            ));
        }

        let socket = Socket::new(address.domain, address.socket_type, address.protocol)?;

        if let Err(error) = socket.set_reuse_address(true) {
            tracing::warn!(address = ?address.as_socket(), %error, "failed to set SO_REUSEADDR");
        }

        socket.bind(&address.address)?;
        socket.listen(BACKLOG)?;

        let key = self.sockets.len();
        self.poller.add(&socket, Event::readable(key))?;

        self.sockets.push(BoundSocket {
            socket,
            address: address.clone(),
        });
        Ok(())
    }

    /// Escucha en `address`, probando puertos siguientes si falla.
    ///
    /// Retorna la dirección que quedó escuchando (con el puerto real si
    /// se pidió el 0) o el último error.
    pub fn listen_with_fallback(&mut self, address: SocketAddr) -> io::Result<SocketAddr> {
        let mut last_error = None;

        for port in fallback_ports(address.port()) {
            let mut candidate = address;
            candidate.set_port(port);

            match self.listen(&ListenAddress::tcp(candidate)) {
                Ok(()) => {
                    let bound = self.last_local_addr().unwrap_or(candidate);
                    tracing::info!(address = %bound, "listening");
                    return Ok(bound);
                }
                Err(error) if error.kind() == ErrorKind::OutOfMemory => return Err(error),
                Err(error) => {
                    tracing::warn!(address = %candidate, %error, "failed to listen");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(ErrorKind::AddrNotAvailable, "no ports left to try")
        }))
    }

    /// Espera una conexión en cualquiera de los sockets y la acepta.
    ///
    /// Bloquea sin timeout. Falla de inmediato si no hay sockets.
    pub fn accept(&mut self) -> io::Result<Connection> {
        if self.sockets.is_empty() {
            return Err(io::Error::new(
                ErrorKind::NotConnected,
                "listener has no bound sockets",
            ));
        }

        loop {
            self.events.clear();
            match self.poller.wait(&mut self.events, None) {
                Ok(_) => {}
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            }

            // Los eventos son oneshot: todo socket que disparó se vuelve a
            // registrar, aunque no sea el que se acepta ahora.
            let mut ready: Option<usize> = None;
            for event in &self.events {
                let Some(bound) = self.sockets.get(event.key) else {
                    continue;
                };
                self.poller.modify(&bound.socket, Event::readable(event.key))?;

                if event.readable {
                    ready = Some(ready.map_or(event.key, |key| key.min(event.key)));
                }
            }

            if let Some(key) = ready {
                let (socket, peer) = self.sockets[key].socket.accept()?;
                return Ok(Connection { socket, peer });
            }
        }
    }

    /// Direcciones donde se está escuchando, en orden de registro
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.sockets
            .iter()
            .filter_map(|bound| bound.socket.local_addr().ok()?.as_socket())
            .collect()
    }

    /// Direcciones tal como se pidieron en `listen()`
    pub fn addresses(&self) -> impl Iterator<Item = &ListenAddress> {
        self.sockets.iter().map(|bound| &bound.address)
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    fn last_local_addr(&self) -> Option<SocketAddr> {
        self.sockets.last()?.socket.local_addr().ok()?.as_socket()
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("addresses", &self.local_addrs())
            .finish()
    }
}

/// Puertos a probar empezando en `start`: hasta [`PORT_ATTEMPTS`], sin
/// pasar de 65535.
///
/// # Ejemplo
/// ```
/// use userve::server::listener::fallback_ports;
///
/// assert_eq!(fallback_ports(3000).collect::<Vec<_>>(), [3000, 3001, 3002, 3003, 3004]);
/// assert_eq!(fallback_ports(65534).collect::<Vec<_>>(), [65534, 65535]);
/// ```
pub fn fallback_ports(start: u16) -> impl Iterator<Item = u16> {
    (0..PORT_ATTEMPTS).map_while(move |offset| start.checked_add(offset))
}
