//! Incremental HTTP/1.1 request parser.
//!
//! [`RequestParser`] consumes one byte at a time and never looks ahead, so a
//! request can arrive in chunks of any size. Only the token currently being
//! accumulated (a method, URI, version, header name or header value) is
//! buffered.
//!
//! ```text
//! Begin ──► Method ──► Uri ──► Version ──► VersionCr ──► HeaderName ◄──┐
//!   │ ▲                                                   │      │     │
//!   ▼ │ LF                                           ':'  │   CR │     │
//! BeginCr                                                 ▼      ▼     │
//!                                      HeaderCr ◄── HeaderValue  BoundaryCr
//!                                         └──────────────────────┘│ LF
//!                                                                 ▼
//!                                                                End
//! ```

use std::collections::HashMap;
use std::mem;

use bytes::{BufMut, BytesMut};

use crate::http::request::{Method, Request};

/// Default upper bound on the length of a single token.
pub const DEFAULT_MAX_TOKEN_LEN: usize = 8192;

/// Default upper bound on the number of distinct headers in one request.
pub const DEFAULT_MAX_HEADERS: usize = 100;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Parser states, from the start of a request to its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Before the request line; blank lines are skipped here.
    Begin,
    /// A CR was seen before the request line.
    BeginCr,
    Method,
    Uri,
    Version,
    /// CR ending the request line.
    VersionCr,
    HeaderName,
    HeaderValue,
    /// CR ending a header line.
    HeaderCr,
    /// CR of the blank line ending the header section.
    BoundaryCr,
    /// Never entered: bodies are not read.
    Body,
    /// Request complete.
    End,
}

/// What went wrong while parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("invalid request method {0:?}")]
    InvalidMethod(String),

    #[error("request URI is empty")]
    EmptyUri,

    #[error("HTTP version is empty")]
    EmptyVersion,

    #[error("header name is empty")]
    EmptyHeaderName,

    #[error("line feed without preceding carriage return")]
    BareLineFeed,

    #[error("carriage return followed by carriage return")]
    DoubleCarriageReturn,

    #[error("expected line feed after carriage return")]
    ExpectedLineFeed,

    #[error("line ended prematurely")]
    UnexpectedLineEnd,

    #[error("token exceeds {0} bytes")]
    TokenTooLong(usize),

    #[error("more than {0} headers")]
    TooManyHeaders(usize),
}

/// A malformed request, with the state the parser was in and the offending byte.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed request: {kind} (state {state:?}, byte {:?})", as_char(.byte))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub state: State,
    pub byte: u8,
}

/// Outcome of feeding a single byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    NeedsMore,
    Complete(Request),
}

/// Bounds on what a single request may make the parser hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserLimits {
    /// Longest method, URI, version, header name or header value.
    pub max_token_len: usize,
    /// Most distinct header names; repeating a name does not count again.
    pub max_headers: usize,
}

impl Default for ParserLimits {
    fn default() -> Self {
        Self {
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            max_headers: DEFAULT_MAX_HEADERS,
        }
    }
}

/// What to do with the byte just processed.
enum Step {
    Append,
    Consume,
    Complete(Request),
}

/// Internal position in the state machine. Every phase after the request
/// method carries the parsed method along.
#[derive(Debug, Clone, Copy)]
enum Phase {
    Begin,
    BeginCr,
    Method,
    Uri(Method),
    Version(Method),
    VersionCr(Method),
    HeaderName(Method),
    HeaderValue(Method),
    HeaderCr(Method),
    BoundaryCr(Method),
    Body(Method),
    End,
}

impl Phase {
    fn state(self) -> State {
        match self {
            Phase::Begin => State::Begin,
            Phase::BeginCr => State::BeginCr,
            Phase::Method => State::Method,
            Phase::Uri(_) => State::Uri,
            Phase::Version(_) => State::Version,
            Phase::VersionCr(_) => State::VersionCr,
            Phase::HeaderName(_) => State::HeaderName,
            Phase::HeaderValue(_) => State::HeaderValue,
            Phase::HeaderCr(_) => State::HeaderCr,
            Phase::BoundaryCr(_) => State::BoundaryCr,
            Phase::Body(_) => State::Body,
            Phase::End => State::End,
        }
    }
}

/// Byte-at-a-time HTTP request parser.
///
/// One instance parses one request. Once [`Progress::Complete`] has been
/// returned, further bytes are ignored; create a new parser for the next
/// request. After an error the parser should be discarded.
///
/// Memory held is bounded by [`ParserLimits`]: one token plus at most
/// `max_headers` header entries.
#[derive(Debug)]
pub struct RequestParser {
    phase: Phase,
    token: BytesMut,
    limits: ParserLimits,
    uri: String,
    version: String,
    header_name: String,
    headers: HashMap<String, String>,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self::with_limits(ParserLimits::default())
    }

    pub fn with_limits(limits: ParserLimits) -> Self {
        Self {
            phase: Phase::Begin,
            token: BytesMut::new(),
            limits,
            uri: String::new(),
            version: String::new(),
            header_name: String::new(),
            headers: HashMap::new(),
        }
    }

    /// Creates a parser that rejects any token longer than `max_token_len` bytes.
    pub fn with_max_token_len(max_token_len: usize) -> Self {
        Self::with_limits(ParserLimits {
            max_token_len,
            ..ParserLimits::default()
        })
    }

    pub fn state(&self) -> State {
        self.phase.state()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::End)
    }

    pub fn limits(&self) -> ParserLimits {
        self.limits
    }

    /// Feeds one byte to the parser.
    ///
    /// Returns [`Progress::Complete`] exactly once, on the byte that finishes
    /// the header section.
    pub fn feed(&mut self, byte: u8) -> Result<Progress, ParseError> {
        if self.is_complete() {
            return Ok(Progress::NeedsMore);
        }

        let state = self.state();
        let fail = |kind| ParseError { kind, state, byte };

        match self.step(byte).map_err(fail)? {
            Step::Append => {
                let max = self.limits.max_token_len;
                if self.token.len() >= max {
                    return Err(fail(ParseErrorKind::TokenTooLong(max)));
                }
                self.token.put_u8(byte);
            }
            Step::Consume => {}
            Step::Complete(request) => return Ok(Progress::Complete(request)),
        }
        Ok(Progress::NeedsMore)
    }

    /// Feeds bytes until a request completes or the input runs out.
    ///
    /// On completion returns the request and how many bytes of `input` were
    /// consumed; the rest belongs to whatever follows the request.
    pub fn feed_slice(&mut self, input: &[u8]) -> Result<Option<(Request, usize)>, ParseError> {
        for (i, &byte) in input.iter().enumerate() {
            if let Progress::Complete(request) = self.feed(byte)? {
                return Ok(Some((request, i + 1)));
            }
        }
        Ok(None)
    }

    fn step(&mut self, byte: u8) -> Result<Step, ParseErrorKind> {
        match self.phase {
            Phase::Begin => match byte {
                CR => self.consume(Phase::BeginCr),
                LF => Ok(Step::Consume),
                _ => self.append(Phase::Method),
            },
            Phase::BeginCr => {
                expect_lf(byte)?;
                self.consume(Phase::Begin)
            }
            Phase::Method => match byte {
                b' ' => {
                    let token = self.take_token();
                    let method = Method::from_str(&token)
                        .ok_or(ParseErrorKind::InvalidMethod(token))?;
                    self.consume(Phase::Uri(method))
                }
                CR | LF => Err(ParseErrorKind::UnexpectedLineEnd),
                _ => Ok(Step::Append),
            },
            Phase::Uri(method) => match byte {
                b' ' => {
                    let uri = self.take_token();
                    if uri.is_empty() {
                        return Err(ParseErrorKind::EmptyUri);
                    }
                    self.uri = uri;
                    self.consume(Phase::Version(method))
                }
                CR | LF => Err(ParseErrorKind::UnexpectedLineEnd),
                _ => Ok(Step::Append),
            },
            Phase::Version(method) => match byte {
                CR => {
                    let version = self.take_token();
                    if version.is_empty() {
                        return Err(ParseErrorKind::EmptyVersion);
                    }
                    self.version = version;
                    self.consume(Phase::VersionCr(method))
                }
                LF => Err(ParseErrorKind::BareLineFeed),
                _ => Ok(Step::Append),
            },
            Phase::VersionCr(method) | Phase::HeaderCr(method) => {
                expect_lf(byte)?;
                self.consume(Phase::HeaderName(method))
            }
            Phase::HeaderName(method) => match byte {
                b':' => {
                    let name = self.take_token().to_ascii_lowercase();
                    if name.is_empty() {
                        return Err(ParseErrorKind::EmptyHeaderName);
                    }
                    let max = self.limits.max_headers;
                    if self.headers.len() >= max && !self.headers.contains_key(&name) {
                        return Err(ParseErrorKind::TooManyHeaders(max));
                    }
                    self.header_name = name;
                    self.consume(Phase::HeaderValue(method))
                }
                CR if self.token.is_empty() => self.consume(Phase::BoundaryCr(method)),
                CR => Err(ParseErrorKind::UnexpectedLineEnd),
                LF => Err(ParseErrorKind::BareLineFeed),
                _ => Ok(Step::Append),
            },
            Phase::HeaderValue(method) => match byte {
                CR => {
                    let value = self.take_token();
                    let name = mem::take(&mut self.header_name);
                    self.headers.insert(name, trim_ows(&value).to_string());
                    self.consume(Phase::HeaderCr(method))
                }
                // Folded (multi-line) header values are not supported.
                LF => Err(ParseErrorKind::BareLineFeed),
                _ => Ok(Step::Append),
            },
            Phase::BoundaryCr(method) => {
                expect_lf(byte)?;
                if self.has_body() {
                    return self.consume(Phase::Body(method));
                }
                self.phase = Phase::End;
                Ok(Step::Complete(self.finish(method)))
            }
            Phase::Body(_) => Ok(Step::Append),
            Phase::End => Ok(Step::Consume),
        }
    }

    fn append(&mut self, next: Phase) -> Result<Step, ParseErrorKind> {
        self.phase = next;
        Ok(Step::Append)
    }

    fn consume(&mut self, next: Phase) -> Result<Step, ParseErrorKind> {
        self.phase = next;
        Ok(Step::Consume)
    }

    fn has_body(&self) -> bool {
        false
    }

    /// Drains the current token, decoding each byte as one character.
    fn take_token(&mut self) -> String {
        let text = self.token.iter().map(|&b| char::from(b)).collect();
        self.token.clear();
        text
    }

    fn finish(&mut self, method: Method) -> Request {
        let mut headers = mem::take(&mut self.headers);
        let host = headers.remove("host");

        Request {
            method,
            uri: mem::take(&mut self.uri),
            version: mem::take(&mut self.version),
            host,
            headers,
            body: Vec::new(),
        }
    }
}

/// Strips optional whitespace (space and tab only) from both ends.
fn trim_ows(value: &str) -> &str {
    value.trim_matches(|c| c == ' ' || c == '\t')
}

fn as_char(byte: &u8) -> char {
    char::from(*byte)
}

fn expect_lf(byte: u8) -> Result<(), ParseErrorKind> {
    match byte {
        LF => Ok(()),
        CR => Err(ParseErrorKind::DoubleCarriageReturn),
        _ => Err(ParseErrorKind::ExpectedLineFeed),
    }
}
