//! TCP connection to the camera server.
//!
//! # Example
//!
//! ```ignore
//! use camwire_client::transport::{connect, ConnectOptions, DEFAULT_PORT};
//!
//! let connection = connect("192.168.110.250", DEFAULT_PORT, &ConnectOptions::default())?;
//! let stop = connection.shutdown_handle()?;
//! // hand `stop` to another thread; `stop.shutdown()` unblocks a pending read
//! ```

use std::io::{self, ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{CamwireError, Result};

/// Port the camera server listens on.
pub const DEFAULT_PORT: u16 = 8888;

/// Default timeout for each connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Options applied when opening a connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Per-address connect timeout. `None` or zero waits for the OS.
    pub connect_timeout: Option<Duration>,
    /// OS-level read timeout. Expiry surfaces as a transport error.
    /// `None` or zero blocks indefinitely.
    pub read_timeout: Option<Duration>,
    /// Set `TCP_NODELAY`.
    pub nodelay: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: None,
            nodelay: true,
        }
    }
}

/// An open TCP stream to the camera server.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

/// Shuts a connection down from another thread.
///
/// Shutting down wakes a reader blocked on the socket; it then sees EOF or
/// a transport error.
#[derive(Debug)]
pub struct ShutdownHandle {
    stream: TcpStream,
}

/// Resolve `host:port` and connect to the first address that accepts.
///
/// Fails with [`CamwireError::Connect`] if the host does not resolve or
/// every address refuses or times out. Never retries an address.
pub fn connect(host: &str, port: u16, options: &ConnectOptions) -> Result<Connection> {
    let target = format!("{}:{}", host, port);
    let connect_error = |source: io::Error| CamwireError::Connect {
        addr: target.clone(),
        source,
    };

    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(connect_error)?
        .collect();

    if addrs.is_empty() {
        return Err(connect_error(io::Error::new(
            ErrorKind::NotFound,
            "host resolved to no addresses",
        )));
    }

    let connect_timeout = nonzero(options.connect_timeout);
    let read_timeout = nonzero(options.read_timeout);

    let mut last_error = None;
    for addr in addrs {
        let attempt = match connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };

        match attempt {
            Ok(stream) => {
                info!(%addr, "Connected to camera server");
                // The connection exists from here on; setup failures are local I/O errors.
                stream.set_read_timeout(read_timeout)?;
                stream.set_nodelay(options.nodelay)?;
                return Ok(Connection { stream, peer: addr });
            }
            Err(e) => {
                debug!(%addr, "Connect attempt failed: {}", e);
                last_error = Some(e);
            }
        }
    }

    Err(connect_error(last_error.unwrap_or_else(|| {
        io::Error::new(ErrorKind::NotConnected, "no address accepted the connection")
    })))
}

/// The socket API rejects zero timeouts; treat them as "no timeout".
fn nonzero(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|t| !t.is_zero())
}

impl Connection {
    /// Wrap an already-connected stream.
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(Self { stream, peer })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Handle that can shut this connection down from another thread.
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            stream: self.stream.try_clone()?,
        })
    }

    /// Shut down both directions. Already-closed sockets are not an error.
    pub fn shutdown(&self) -> Result<()> {
        shutdown_stream(&self.stream)
    }

    /// Get a reference to the underlying stream.
    pub fn inner(&self) -> &TcpStream {
        &self.stream
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl ShutdownHandle {
    pub fn shutdown(&self) -> Result<()> {
        shutdown_stream(&self.stream)
    }
}

fn shutdown_stream(stream: &TcpStream) -> Result<()> {
    match stream.shutdown(Shutdown::Both) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_default_options() {
        let options = ConnectOptions::default();
        assert_eq!(options.connect_timeout, Some(DEFAULT_CONNECT_TIMEOUT));
        assert_eq!(options.read_timeout, None);
        assert!(options.nodelay);
        assert_eq!(DEFAULT_PORT, 8888);
    }

    #[test]
    fn test_connect_and_read() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(b"hello").unwrap();
        });

        let mut connection = connect("127.0.0.1", port, &ConnectOptions::default()).unwrap();
        assert_eq!(connection.peer_addr().port(), port);

        let mut received = Vec::new();
        connection.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"hello");
        server.join().unwrap();
    }

    #[test]
    fn test_zero_timeouts_mean_no_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(b"ok").unwrap();
        });

        let options = ConnectOptions {
            connect_timeout: Some(Duration::ZERO),
            read_timeout: Some(Duration::ZERO),
            nodelay: true,
        };
        let mut connection = connect("127.0.0.1", port, &options).unwrap();
        assert_eq!(connection.inner().read_timeout().unwrap(), None);

        let mut received = Vec::new();
        connection.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"ok");
        server.join().unwrap();
    }

    #[test]
    fn test_nonzero() {
        assert_eq!(nonzero(None), None);
        assert_eq!(nonzero(Some(Duration::ZERO)), None);
        assert_eq!(
            nonzero(Some(Duration::from_millis(5))),
            Some(Duration::from_millis(5))
        );
    }

    #[test]
    fn test_connect_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = connect("127.0.0.1", port, &ConnectOptions::default()).unwrap_err();
        match err {
            CamwireError::Connect { addr, .. } => assert_eq!(addr, format!("127.0.0.1:{}", port)),
            other => panic!("expected Connect, got {:?}", other),
        }
    }

    #[test]
    fn test_connect_unresolvable_host() {
        let err = connect("camera.invalid", DEFAULT_PORT, &ConnectOptions::default()).unwrap_err();
        assert!(matches!(err, CamwireError::Connect { .. }));
    }

    #[test]
    fn test_shutdown_handle_unblocks_reader() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        // Keep the server side open and silent until the client is done.
        let server = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1];
            let _ = (&socket).read(&mut buf);
        });

        let mut connection = connect("127.0.0.1", port, &ConnectOptions::default()).unwrap();
        let handle = connection.shutdown_handle().unwrap();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.shutdown().unwrap();
        });

        let mut buf = [0u8; 16];
        let result = connection.read(&mut buf);
        assert!(matches!(result, Ok(0) | Err(_)));

        stopper.join().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_read_timeout_surfaces_as_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(300));
            drop(socket);
        });

        let options = ConnectOptions {
            read_timeout: Some(Duration::from_millis(20)),
            ..ConnectOptions::default()
        };
        let mut connection = connect("127.0.0.1", port, &options).unwrap();

        let mut buf = [0u8; 4];
        let err = connection.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::WouldBlock | ErrorKind::TimedOut
        ));
        server.join().unwrap();
    }
}
