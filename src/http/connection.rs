use std::io;
use std::net::{Shutdown, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use crate::http::handler::RequestHandler;
use crate::http::parser::{ParseError, ParserLimits, RequestParser};

/// Size of the stack buffer each read drains into.
const READ_CHUNK: usize = 1024;

/// The byte source behind a [`Connection`].
///
/// `try_read` must never block: with nothing buffered it fails with
/// [`io::ErrorKind::WouldBlock`].
pub trait Socket: Send {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

impl Socket for TcpStream {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        TcpStream::try_read(self, buf)
    }

    fn close(self) -> io::Result<()> {
        self.into_std()?.shutdown(Shutdown::Both)
    }
}

/// Why a connection is being closed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error(transparent)]
    MalformedRequest(#[from] ParseError),

    #[error("socket error: {0}")]
    Socket(#[from] io::Error),

    #[error("idle for more than {0:?}")]
    Timeout(Duration),

    #[error("client disconnected")]
    Disconnected,
}

#[derive(Debug)]
pub enum ConnectionState {
    Open,
    Closing(ConnectionError),
    Closed,
}

/// One client socket and the parser assembling its current request.
pub struct Connection<S: Socket = TcpStream> {
    socket: Option<S>,
    peer: SocketAddr,
    parser: RequestParser,
    last_activity: Instant,
    state: ConnectionState,
}

impl<S: Socket> Connection<S> {
    pub fn new(socket: S, peer: SocketAddr) -> Self {
        Self {
            socket: Some(socket),
            peer,
            parser: RequestParser::new(),
            last_activity: Instant::now(),
            state: ConnectionState::Open,
        }
    }

    /// Applies `limits` to every request parsed on this connection.
    pub fn with_limits(mut self, limits: ParserLimits) -> Self {
        self.parser = RequestParser::with_limits(limits);
        self
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// The error this connection is waiting to be closed for, if any.
    pub fn error(&self) -> Option<&ConnectionError> {
        match &self.state {
            ConnectionState::Closing(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnectionState::Closed)
    }

    /// Drains every byte currently available on the socket into the parser.
    ///
    /// Completed requests go to `handler`. Returns `true` if any bytes were
    /// read. Parse errors, socket errors and client disconnects move the
    /// connection to [`ConnectionState::Closing`]; the caller closes it.
    pub fn poll(&mut self, handler: &dyn RequestHandler) -> bool {
        if !matches!(self.state, ConnectionState::Open) {
            return false;
        }

        let mut buf = [0u8; READ_CHUNK];
        let mut read_any = false;

        loop {
            let result = match self.socket.as_mut() {
                Some(socket) => socket.try_read(&mut buf),
                None => break,
            };

            match result {
                Ok(0) => {
                    self.state = ConnectionState::Closing(ConnectionError::Disconnected);
                    break;
                }
                Ok(n) => {
                    read_any = true;
                    self.last_activity = Instant::now();
                    if let Err(e) = self.feed(&buf[..n], handler) {
                        handler.on_malformed(self.peer, &e);
                        self.state = ConnectionState::Closing(e.into());
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = ConnectionState::Closing(e.into());
                    break;
                }
            }
        }

        read_any
    }

    fn feed(&mut self, mut input: &[u8], handler: &dyn RequestHandler) -> Result<(), ParseError> {
        while !input.is_empty() {
            match self.parser.feed_slice(input)? {
                Some((request, consumed)) => {
                    handler.on_request(self.peer, request);
                    self.parser = RequestParser::with_limits(self.parser.limits());
                    input = &input[consumed..];
                }
                None => break,
            }
        }
        Ok(())
    }

    /// True once `timeout` has passed since the last successful read.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) >= timeout
    }

    /// Marks an open connection for closing because it sat idle for `timeout`.
    pub fn time_out(&mut self, timeout: Duration) {
        if matches!(self.state, ConnectionState::Open) {
            self.state = ConnectionState::Closing(ConnectionError::Timeout(timeout));
        }
    }

    /// Closes the socket. Only the first call has any effect.
    pub fn close(&mut self) {
        if let Some(socket) = self.socket.take() {
            if let Err(e) = socket.close() {
                debug!(peer = %self.peer, error = %e, "Error while closing socket");
            }
        }
        self.state = ConnectionState::Closed;
    }
}
