//! HTTP request intake.
//!
//! # Architecture
//!
//! - **`request`**: `Method` and the parsed `Request`
//! - **`parser`**: Byte-at-a-time request parser built as an explicit state machine
//! - **`connection`**: One socket plus its parser; drains available bytes on each poll
//! - **`handler`**: Hook receiving completed requests and parse failures
//!
//! # Connection Lifecycle
//!
//! ```text
//!        ┌─────────────┐
//!        │    Open     │ ← poll() feeds available bytes to the parser
//!        └──────┬──────┘
//!               │ malformed request / socket error / client hung up
//!               ▼
//!        ┌──────────────────┐
//!        │     Closing      │ ← pool logs the reason
//!        └──────┬───────────┘
//!               │ close()
//!               ▼
//!        ┌──────────────────┐
//!        │     Closed       │
//!        └──────────────────┘
//! ```
//!
//! An `Open` connection idle for longer than the pool's timeout is closed
//! directly.
//!
//! # Example
//!
//! ```
//! use simpleweb::http::parser::{Progress, RequestParser};
//! use simpleweb::http::request::Method;
//!
//! let mut parser = RequestParser::new();
//! let mut done = None;
//! for &b in b"GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n" {
//!     if let Progress::Complete(req) = parser.feed(b).unwrap() {
//!         done = Some(req);
//!     }
//! }
//! let req = done.unwrap();
//! assert_eq!(req.method, Method::GET);
//! assert_eq!(req.host.as_deref(), Some("example.com"));
//! ```

pub mod request;
pub mod parser;
pub mod connection;
pub mod handler;
