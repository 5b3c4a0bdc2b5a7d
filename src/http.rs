//! HTTP/1.1 framing for the order endpoint.
//!
//! Implements the small slice of HTTP the endpoint speaks:
//! - Incremental request parsing with a bounded body
//! - Plaintext response serialization (connections are never persistent)
//! - Response parsing for the submitting client

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::str;

/// Maximum size of the request line plus headers
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Identifier sent in the `Server` response header
const SERVER_NAME: &str = "order-intake/0.1.0";

/// Body of the not-found fallback response
pub const NOT_FOUND_BODY: &str = "HTTP code 404";

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    /// Any token not listed above; never matches a route
    Other,
}

impl Method {
    /// Map a request-line token to a method
    pub fn from_token(token: &str) -> Method {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            _ => Method::Other,
        }
    }

    /// Request-line token for this method
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Other => "OTHER",
        }
    }
}

/// Header list preserving receive order; lookup is case-insensitive
#[derive(Debug, Default, Clone)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn push(&mut self, name: &str, value: &str) {
        self.0.push((name.to_string(), value.to_string()));
    }

    /// First value for `name`, compared case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A fully received request
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub target: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    /// Value of the Content-Type header, if present
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}

/// Framing errors
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Malformed request line
    InvalidRequestLine(String),
    /// Malformed response status line
    InvalidStatusLine(String),
    /// Malformed header line
    InvalidHeader(String),
    /// Content-Length is not a number
    InvalidContentLength(String),
    /// Head or body bytes are not valid UTF-8 where text is required
    InvalidUtf8,
    /// Request line plus headers exceed the head cap
    HeadTooLarge(usize),
    /// Declared body length exceeds the configured cap
    BodyTooLarge(usize),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidRequestLine(line) => write!(f, "Invalid request line: {}", line),
            ParseError::InvalidStatusLine(line) => write!(f, "Invalid status line: {}", line),
            ParseError::InvalidHeader(line) => write!(f, "Invalid header: {}", line),
            ParseError::InvalidContentLength(value) => {
                write!(f, "Invalid Content-Length: {}", value)
            }
            ParseError::InvalidUtf8 => write!(f, "Invalid UTF-8"),
            ParseError::HeadTooLarge(size) => write!(f, "Head too large: {} bytes", size),
            ParseError::BodyTooLarge(size) => write!(f, "Body too large: {} bytes", size),
        }
    }
}

impl std::error::Error for ParseError {}

/// Result of parsing a request from an accumulation buffer
#[derive(Debug)]
pub enum ParseResult {
    /// Successfully parsed request with bytes consumed
    Complete(Request, usize),
    /// Need more data
    Incomplete,
    /// Parse error
    Error(ParseError),
}

/// Incremental request decoder with a bounded body.
///
/// `parse` is called over the whole accumulated buffer after every read;
/// a declared body length above the cap is rejected before any body byte
/// is waited for.
pub struct RequestParser {
    max_body: usize,
}

impl RequestParser {
    pub fn new(max_body: usize) -> Self {
        RequestParser { max_body }
    }

    /// Parse a request from the buffer
    pub fn parse(&self, buffer: &[u8]) -> ParseResult {
        let head_end = match find_head_end(buffer) {
            Some(pos) => pos,
            None => {
                return if buffer.len() > MAX_HEAD_BYTES {
                    ParseResult::Error(ParseError::HeadTooLarge(buffer.len()))
                } else {
                    ParseResult::Incomplete
                };
            }
        };

        if head_end > MAX_HEAD_BYTES {
            return ParseResult::Error(ParseError::HeadTooLarge(head_end));
        }

        let head = match str::from_utf8(&buffer[..head_end]) {
            Ok(s) => s,
            Err(_) => return ParseResult::Error(ParseError::InvalidUtf8),
        };

        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or("");

        let mut parts = request_line.split(' ');
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return ParseResult::Error(ParseError::InvalidRequestLine(request_line.to_string()));
        };
        if method.is_empty() || target.is_empty() || !version.starts_with("HTTP/1.") {
            return ParseResult::Error(ParseError::InvalidRequestLine(request_line.to_string()));
        }

        let headers = match parse_headers(lines) {
            Ok(headers) => headers,
            Err(e) => return ParseResult::Error(e),
        };

        let content_length = match headers.get("content-length") {
            Some(value) => match value.parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    return ParseResult::Error(ParseError::InvalidContentLength(value.to_string()))
                }
            },
            None => 0,
        };
        if content_length > self.max_body {
            return ParseResult::Error(ParseError::BodyTooLarge(content_length));
        }

        let body_start = head_end + 4;
        let total = body_start + content_length;
        if buffer.len() < total {
            return ParseResult::Incomplete;
        }

        let request = Request {
            method: Method::from_token(method),
            target: target.to_string(),
            headers,
            body: Bytes::copy_from_slice(&buffer[body_start..total]),
        };
        ParseResult::Complete(request, total)
    }
}

/// HTTP status code with canonical reason phrases for the codes the
/// endpoint emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn reason(self) -> &'static str {
        match self.0 {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.reason())
    }
}

/// An outgoing response
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub body: String,
    /// Always false: connections are closed after one response
    pub keep_alive: bool,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Response {
            status,
            body: body.into(),
            keep_alive: false,
        }
    }

    /// Fallback for unrecognized method, path, or content type
    pub fn not_found() -> Self {
        Response::new(StatusCode::NOT_FOUND, NOT_FOUND_BODY)
    }

    /// Serialize status line, headers, and body to wire form
    pub fn to_bytes(&self) -> BytesMut {
        let connection = if self.keep_alive { "keep-alive" } else { "close" };
        let head = format!(
            "HTTP/1.1 {}\r\nServer: {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: {}\r\n\r\n",
            self.status,
            SERVER_NAME,
            self.body.len(),
            connection
        );

        let mut out = BytesMut::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}

/// A response as seen by the submitting client
#[derive(Debug)]
pub struct ClientResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Result of parsing a response from an accumulation buffer
#[derive(Debug)]
pub enum ResponseResult {
    /// Successfully parsed response with bytes consumed
    Complete(ClientResponse, usize),
    /// Need more data
    Incomplete,
    /// Parse error
    Error(ParseError),
}

/// Parse a response from the buffer.
///
/// Without a Content-Length header the body runs to end of stream, so
/// completion can only be decided once the peer closes; `eof` tells the
/// parser the stream is done.
pub fn parse_response(buffer: &[u8], eof: bool) -> ResponseResult {
    let head_end = match find_head_end(buffer) {
        Some(pos) => pos,
        None => {
            return if buffer.len() > MAX_HEAD_BYTES {
                ResponseResult::Error(ParseError::HeadTooLarge(buffer.len()))
            } else {
                ResponseResult::Incomplete
            };
        }
    };

    let head = match str::from_utf8(&buffer[..head_end]) {
        Ok(s) => s,
        Err(_) => return ResponseResult::Error(ParseError::InvalidUtf8),
    };

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or("");

    // HTTP/1.1 SP code SP reason; the reason phrase may contain spaces
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    let code = match parts.next().and_then(|c| c.parse::<u16>().ok()) {
        Some(code) if version.starts_with("HTTP/1.") => code,
        _ => {
            return ResponseResult::Error(ParseError::InvalidStatusLine(status_line.to_string()))
        }
    };

    let headers = match parse_headers(lines) {
        Ok(headers) => headers,
        Err(e) => return ResponseResult::Error(e),
    };

    let body_start = head_end + 4;
    let (body_end, consumed) = match headers.get("content-length") {
        Some(value) => {
            let length = match value.parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    return ResponseResult::Error(ParseError::InvalidContentLength(
                        value.to_string(),
                    ))
                }
            };
            if buffer.len() < body_start + length {
                return ResponseResult::Incomplete;
            }
            (body_start + length, body_start + length)
        }
        None if eof => (buffer.len(), buffer.len()),
        None => return ResponseResult::Incomplete,
    };

    let body = match str::from_utf8(&buffer[body_start..body_end]) {
        Ok(s) => s.to_string(),
        Err(_) => return ResponseResult::Error(ParseError::InvalidUtf8),
    };

    ResponseResult::Complete(
        ClientResponse {
            status: StatusCode(code),
            body,
        },
        consumed,
    )
}

/// Parse `name: value` lines into a header list
fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> Result<Headers, ParseError> {
    let mut headers = Headers::default();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            return Err(ParseError::InvalidHeader(line.to_string()));
        };
        let name = name.trim();
        if name.is_empty() || name.contains(' ') {
            return Err(ParseError::InvalidHeader(line.to_string()));
        }
        headers.push(name, value.trim());
    }
    Ok(headers)
}

/// Find the \r\n\r\n separating head from body
fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(buffer: &[u8]) -> ParseResult {
        RequestParser::new(1024 * 1024).parse(buffer)
    }

    #[test]
    fn test_parse_request_with_body() {
        let buffer =
            b"POST /order HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 11\r\n\r\n{\"total\":1}";
        match parse(buffer) {
            ParseResult::Complete(request, consumed) => {
                assert_eq!(request.method, Method::Post);
                assert_eq!(request.target, "/order");
                assert_eq!(request.content_type(), Some("application/json"));
                assert_eq!(&request.body[..], b"{\"total\":1}");
                assert_eq!(consumed, buffer.len());
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_request_without_body() {
        let buffer = b"GET /order HTTP/1.1\r\nHost: localhost\r\n\r\n";
        match parse(buffer) {
            ParseResult::Complete(request, consumed) => {
                assert_eq!(request.method, Method::Get);
                assert!(request.body.is_empty());
                assert_eq!(consumed, buffer.len());
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_incremental() {
        let full =
            b"POST /feedback HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: 4\r\n\r\nbody";

        // Partial head, then full head with partial body, then everything
        assert!(matches!(parse(&full[..10]), ParseResult::Incomplete));
        assert!(matches!(
            parse(&full[..full.len() - 2]),
            ParseResult::Incomplete
        ));
        assert!(matches!(parse(full), ParseResult::Complete(_, _)));
    }

    #[test]
    fn test_parse_unknown_method() {
        let buffer = b"BREW /order HTTP/1.1\r\n\r\n";
        match parse(buffer) {
            ParseResult::Complete(request, _) => assert_eq!(request.method, Method::Other),
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_body_too_large() {
        let buffer = b"POST /order HTTP/1.1\r\nContent-Length: 2097152\r\n\r\n";
        match parse(buffer) {
            ParseResult::Error(ParseError::BodyTooLarge(size)) => assert_eq!(size, 2097152),
            other => panic!("Expected BodyTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_body_at_cap_is_accepted() {
        let parser = RequestParser::new(4);
        let buffer = b"POST /order HTTP/1.1\r\nContent-Length: 4\r\n\r\nabcd";
        assert!(matches!(
            parser.parse(buffer),
            ParseResult::Complete(_, _)
        ));
    }

    #[test]
    fn test_parse_head_too_large() {
        let mut buffer = Vec::from(&b"POST /order HTTP/1.1\r\nX-Filler: "[..]);
        buffer.resize(MAX_HEAD_BYTES + 16, b'a');
        match parse(&buffer) {
            ParseResult::Error(ParseError::HeadTooLarge(_)) => {}
            other => panic!("Expected HeadTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bad_request_line() {
        let buffer = b"POST /order\r\n\r\n";
        match parse(buffer) {
            ParseResult::Error(ParseError::InvalidRequestLine(_)) => {}
            other => panic!("Expected InvalidRequestLine, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_bad_content_length() {
        let buffer = b"POST /order HTTP/1.1\r\nContent-Length: many\r\n\r\n";
        match parse(buffer) {
            ParseResult::Error(ParseError::InvalidContentLength(value)) => {
                assert_eq!(value, "many");
            }
            other => panic!("Expected InvalidContentLength, got {:?}", other),
        }
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let buffer = b"POST /order HTTP/1.1\r\nCONTENT-TYPE: application/json\r\n\r\n";
        match parse(buffer) {
            ParseResult::Complete(request, _) => {
                assert_eq!(request.headers.get("content-type"), Some("application/json"));
                assert_eq!(request.headers.len(), 1);
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_response_serialization() {
        let response = Response::new(StatusCode::OK, "Feedback received");
        let bytes = response.to_bytes();
        let expected = format!(
            "HTTP/1.1 200 OK\r\nServer: {}\r\nContent-Type: text/plain\r\nContent-Length: 17\r\nConnection: close\r\n\r\nFeedback received",
            SERVER_NAME
        );
        assert_eq!(&bytes[..], expected.as_bytes());
    }

    #[test]
    fn test_not_found_response() {
        let response = Response::not_found();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body, "HTTP code 404");
        assert!(!response.keep_alive);
    }

    #[test]
    fn test_parse_response_with_content_length() {
        let buffer = b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\nConnection: close\r\n\r\n{\"total\":35}";
        match parse_response(buffer, false) {
            ResponseResult::Complete(response, consumed) => {
                assert_eq!(response.status, StatusCode::OK);
                assert_eq!(response.body, "{\"total\":35}");
                assert_eq!(consumed, buffer.len());
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_body_to_eof() {
        let buffer = b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\nHTTP code 404";
        assert!(matches!(
            parse_response(buffer, false),
            ResponseResult::Incomplete
        ));
        match parse_response(buffer, true) {
            ResponseResult::Complete(response, _) => {
                assert_eq!(response.status, StatusCode::NOT_FOUND);
                assert_eq!(response.body, "HTTP code 404");
            }
            other => panic!("Expected Complete, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_response_incomplete_body() {
        let buffer = b"HTTP/1.1 200 OK\r\nContent-Length: 12\r\n\r\n{\"tot";
        assert!(matches!(
            parse_response(buffer, false),
            ResponseResult::Incomplete
        ));
    }

    #[test]
    fn test_parse_response_bad_status_line() {
        let buffer = b"ICMP nope\r\n\r\n";
        assert!(matches!(
            parse_response(buffer, true),
            ResponseResult::Error(ParseError::InvalidStatusLine(_))
        ));
    }

    #[test]
    fn test_status_code_reasons() {
        assert_eq!(StatusCode::OK.to_string(), "200 OK");
        assert_eq!(StatusCode::NOT_FOUND.to_string(), "404 Not Found");
        assert_eq!(StatusCode(418).to_string(), "418 Unknown");
    }
}
