//! Synchronous client for submitting orders and feedback.
//!
//! Counterpart to the server: resolve, connect, write one request, read
//! one response. Used by callers acting as an order-submitting process
//! rather than a serving one.

use crate::http::{self, ClientResponse, Method, ParseError, ResponseResult};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// Identifier sent in the `User-Agent` request header
const USER_AGENT: &str = "order-intake/0.1.0";

/// One connection to an order endpoint
pub struct ClientStream {
    host: String,
    stream: TcpStream,
}

impl ClientStream {
    /// Resolve `host:port` and connect; failure here is fatal to
    /// construction
    pub fn connect(host: &str, port: u16) -> io::Result<ClientStream> {
        let stream = TcpStream::connect((host, port))?;
        Ok(ClientStream {
            host: host.to_string(),
            stream,
        })
    }

    /// Write a single request; blocks until it is fully written
    pub fn write(
        &mut self,
        method: Method,
        target: &str,
        content_type: &str,
        body: &str,
    ) -> io::Result<()> {
        let request = build_request(&self.host, method, target, content_type, body);
        self.stream.write_all(request.as_bytes())
    }

    /// Block until a complete response has been received
    pub fn read(&mut self) -> Result<ClientResponse, ClientError> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            match http::parse_response(&buffer, false) {
                ResponseResult::Complete(response, _) => return Ok(response),
                ResponseResult::Error(e) => return Err(ClientError::Parse(e)),
                ResponseResult::Incomplete => {}
            }

            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                // Peer closed; a body without Content-Length ends here
                return match http::parse_response(&buffer, true) {
                    ResponseResult::Complete(response, _) => Ok(response),
                    ResponseResult::Error(e) => Err(ClientError::Parse(e)),
                    ResponseResult::Incomplete => Err(ClientError::Truncated),
                };
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

impl Drop for ClientStream {
    fn drop(&mut self) {
        // Peer may already be gone; shutdown errors are not interesting
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Build the wire form of a single request
fn build_request(
    host: &str,
    method: Method,
    target: &str,
    content_type: &str,
    body: &str,
) -> String {
    format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
        method.as_str(),
        target,
        host,
        USER_AGENT,
        content_type,
        body.len(),
        body
    )
}

/// Client-side read errors
#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    Parse(ParseError),
    /// Peer closed mid-response
    Truncated,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(e) => write!(f, "{}", e),
            ClientError::Parse(e) => write!(f, "{}", e),
            ClientError::Truncated => write!(f, "Connection closed mid-response"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request() {
        let request = build_request(
            "localhost",
            Method::Post,
            "/order",
            "application/json",
            "{\"a\":1}",
        );
        assert_eq!(
            request,
            "POST /order HTTP/1.1\r\n\
             Host: localhost\r\n\
             User-Agent: order-intake/0.1.0\r\n\
             Content-Type: application/json\r\n\
             Content-Length: 7\r\n\
             \r\n\
             {\"a\":1}"
        );
    }

    #[test]
    fn test_build_request_empty_body() {
        let request = build_request("localhost", Method::Get, "/", "text/plain", "");
        assert!(request.ends_with("Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn test_connect_failure_is_fatal() {
        // Nothing listens on a port we never bound
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(ClientStream::connect("127.0.0.1", port).is_err());
    }
}
