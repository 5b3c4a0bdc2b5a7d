//! TCP server for the order endpoint.
//!
//! One connection is served at a time: accept, read one request, dispatch,
//! write the response, half-close, then accept again. A deadline timer
//! bounds every connection to the configured request timeout; expiry drops
//! the connection mid-phase with no response.

use crate::config::Config;
use crate::dispatch;
use crate::http::{ParseError, ParseResult, RequestParser};
use crate::orders::DecodeError;
use bytes::BytesMut;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Read buffer size
const BUFFER_SIZE: usize = 16 * 1024;

/// Server instance owning the listening socket and the single worker slot
pub struct Server {
    config: Config,
    listener: TcpListener,
}

impl Server {
    /// Bind the listening socket
    pub async fn bind(config: Config) -> io::Result<Server> {
        let listener = TcpListener::bind(&config.listen).await?;
        Ok(Server { config, listener })
    }

    /// Address the server is actually bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve connections forever, one at a time.
    ///
    /// The deadline timer and the connection cycle interleave on the same
    /// scheduler; whichever finishes first wins. On expiry the connection
    /// is dropped where it stands and the worker goes back to accepting.
    pub async fn run(self) -> io::Result<()> {
        info!(address = %self.listener.local_addr()?, "Server listening");

        let mut deadline = DeadlineTimer::parked();
        loop {
            let (mut stream, peer) = self.accept_next().await;
            debug!(peer = %peer, "New connection");
            deadline.arm(self.config.request_timeout);

            tokio::select! {
                _ = deadline.expired() => {
                    warn!(peer = %peer, "Request deadline exceeded, closing connection");
                }
                result = serve_connection(&mut stream, self.config.max_body) => {
                    if let Err(e) = result {
                        debug!(peer = %peer, error = %e, "Connection abandoned");
                    }
                }
            }

            deadline.park();
            // stream drops here; per-connection state never outlives the cycle
        }
    }

    /// Wait for the next inbound connection, retrying on transient errors
    async fn accept_next(&self) -> (TcpStream, SocketAddr) {
        loop {
            match self.listener.accept().await {
                Ok(pair) => return pair,
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            }
        }
    }
}

/// Run one request/response cycle over a fresh connection.
///
/// Any error means the connection is abandoned without a response; the
/// caller returns to accepting either way.
async fn serve_connection(stream: &mut TcpStream, max_body: usize) -> Result<(), ServeError> {
    let parser = RequestParser::new(max_body);
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);

    let request = loop {
        match parser.parse(&buffer) {
            ParseResult::Complete(request, _) => break request,
            ParseResult::Incomplete => {
                let n = stream.read_buf(&mut buffer).await?;
                if n == 0 {
                    return Err(ServeError::ClosedEarly);
                }
            }
            ParseResult::Error(e) => return Err(ServeError::Parse(e)),
        }
    };

    let response = dispatch::dispatch(&request)?;
    let write_result = stream.write_all(&response.to_bytes()).await;

    // Half-close the send side whether or not the write went through
    let _ = stream.shutdown().await;
    write_result?;
    Ok(())
}

/// Restartable expiry clock bounding each connection.
///
/// Either armed at a concrete instant or parked indefinitely. `expired`
/// resolves once the armed instant passes and never resolves while parked.
#[derive(Debug)]
pub struct DeadlineTimer {
    expiry: Option<Instant>,
}

impl DeadlineTimer {
    /// A timer that will not fire until armed
    pub fn parked() -> Self {
        DeadlineTimer { expiry: None }
    }

    /// Arm the timer to fire `after` from now
    pub fn arm(&mut self, after: Duration) {
        self.expiry = Some(Instant::now() + after);
    }

    /// Park the timer so it cannot fire until armed again
    pub fn park(&mut self) {
        self.expiry = None;
    }

    /// Resolve when the armed instant has passed; pend forever while parked
    pub async fn expired(&self) {
        match self.expiry {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

/// Per-connection cycle errors; all of them mean "abandon and accept again"
#[derive(Debug)]
enum ServeError {
    Io(io::Error),
    /// Peer closed before a complete request arrived
    ClosedEarly,
    Parse(ParseError),
    Decode(DecodeError),
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServeError::Io(e) => write!(f, "{}", e),
            ServeError::ClosedEarly => write!(f, "Connection closed before a complete request"),
            ServeError::Parse(e) => write!(f, "{}", e),
            ServeError::Decode(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ServeError {}

impl From<io::Error> for ServeError {
    fn from(e: io::Error) -> Self {
        ServeError::Io(e)
    }
}

impl From<DecodeError> for ServeError {
    fn from(e: DecodeError) -> Self {
        ServeError::Decode(e)
    }
}
