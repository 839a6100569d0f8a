#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use simpleweb::http::connection::Socket;
use simpleweb::http::handler::RequestHandler;
use simpleweb::http::parser::ParseError;
use simpleweb::http::request::Request;

#[derive(Default)]
struct MockState {
    incoming: VecDeque<u8>,
    hung_up: bool,
    fail: Option<io::ErrorKind>,
    closes: usize,
}

/// In-memory socket. Clones share the same buffers, so a test can keep one
/// clone while the connection owns another.
#[derive(Clone, Default)]
pub struct MockSocket {
    state: Arc<Mutex<MockState>>,
}

impl MockSocket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, bytes: &[u8]) {
        self.state.lock().unwrap().incoming.extend(bytes.iter().copied());
    }

    /// Reads return 0 once the buffered bytes are drained.
    pub fn hang_up(&self) {
        self.state.lock().unwrap().hung_up = true;
    }

    /// The next read fails with `kind`.
    pub fn fail_with(&self, kind: io::ErrorKind) {
        self.state.lock().unwrap().fail = Some(kind);
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

impl Socket for MockSocket {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        if let Some(kind) = state.fail.take() {
            return Err(io::Error::from(kind));
        }
        if state.incoming.is_empty() {
            return if state.hung_up {
                Ok(0)
            } else {
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            };
        }

        let n = buf.len().min(state.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn close(self) -> io::Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingHandler {
    requests: Mutex<Vec<(SocketAddr, Request)>>,
    malformed: Mutex<Vec<(SocketAddr, ParseError)>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn peers(&self) -> Vec<SocketAddr> {
        self.requests.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    pub fn malformed(&self) -> Vec<ParseError> {
        self.malformed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }
}

impl RequestHandler for RecordingHandler {
    fn on_request(&self, peer: SocketAddr, request: Request) {
        self.requests.lock().unwrap().push((peer, request));
    }

    fn on_malformed(&self, peer: SocketAddr, error: &ParseError) {
        self.malformed.lock().unwrap().push((peer, error.clone()));
    }
}

pub fn peer(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}
