use std::net::SocketAddr;

use tracing::{info, warn};

use crate::http::parser::ParseError;
use crate::http::request::Request;

/// Receives the output of every connection's parser.
///
/// This is the seam to the response layer. Handlers are called from the pool's
/// poll loop, so they must return quickly.
pub trait RequestHandler: Send + Sync {
    /// Called with each completed request.
    fn on_request(&self, peer: SocketAddr, request: Request);

    /// Called when a connection sends a malformed request, just before the
    /// connection is closed. A response layer would answer 400 here.
    fn on_malformed(&self, peer: SocketAddr, error: &ParseError) {
        warn!(peer = %peer, error = %error, "Malformed request");
    }
}

/// Logs every request and does nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl RequestHandler for LogHandler {
    fn on_request(&self, peer: SocketAddr, request: Request) {
        info!(
            peer = %peer,
            method = %request.method,
            uri = %request.uri,
            version = %request.version,
            host = request.host.as_deref().unwrap_or("-"),
            headers = request.headers.len(),
            "Request received"
        );
    }
}
