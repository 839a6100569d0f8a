use std::collections::HashMap;
use std::fmt;

/// HTTP request methods.
///
/// The closed set of methods the parser recognises. Any other token on the
/// request line is rejected rather than mapped to a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// TRACE - Loop-back test along the path to the resource
    TRACE,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// CONNECT - Establish a tunnel
    CONNECT,
    /// PATCH - Partial modification of a resource
    PATCH,
}

impl Method {
    /// Every recognised method, in the order they are listed above.
    pub const ALL: [Method; 9] = [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::TRACE,
        Method::OPTIONS,
        Method::CONNECT,
        Method::PATCH,
    ];

    /// Parses an HTTP method from a string.
    ///
    /// # Arguments
    ///
    /// * `s` - String representation of the method (case-sensitive, uppercase)
    ///
    /// # Returns
    ///
    /// `Some(Method)` if the string matches a known method, `None` otherwise.
    ///
    /// # Example
    ///
    /// ```
    /// # use simpleweb::http::request::Method;
    /// assert_eq!(Method::from_str("TRACE"), Some(Method::TRACE));
    /// assert_eq!(Method::from_str("get"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::GET),
            "HEAD" => Some(Method::HEAD),
            "POST" => Some(Method::POST),
            "PUT" => Some(Method::PUT),
            "DELETE" => Some(Method::DELETE),
            "TRACE" => Some(Method::TRACE),
            "OPTIONS" => Some(Method::OPTIONS),
            "CONNECT" => Some(Method::CONNECT),
            "PATCH" => Some(Method::PATCH),
            _ => None,
        }
    }

    /// The canonical wire token for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::TRACE => "TRACE",
            Method::OPTIONS => "OPTIONS",
            Method::CONNECT => "CONNECT",
            Method::PATCH => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully parsed HTTP request.
///
/// Produced by [`RequestParser`](crate::http::parser::RequestParser) once the
/// blank line ending the header section has been read. Header names are stored
/// lower-cased and values trimmed. The `Host` header is lifted out of the map
/// into its own field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request target exactly as sent (e.g., "/index.html")
    pub uri: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Value of the `Host` header, if one was sent
    pub host: Option<String>,
    /// Remaining headers, keyed by lower-case name
    pub headers: HashMap<String, String>,
    /// Always empty: request bodies are never read
    pub body: Vec<u8>,
}

impl Request {
    /// Retrieves a header value by name, ignoring ASCII case.
    ///
    /// `Host` is answered from the dedicated field since it is not kept in the
    /// generic map.
    pub fn header(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        if key == "host" {
            return self.host.as_deref();
        }
        self.headers.get(&key).map(|v| v.as_str())
    }
}
