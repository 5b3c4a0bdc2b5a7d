//! order-intake: an HTTP endpoint for purchase orders and feedback.
//!
//! The server serves one connection at a time:
//! - `POST /order`: decode an order, respond with the computed total
//! - `POST /feedback`: log the submission, acknowledge in plaintext
//! - anything else: a fixed 404
//!
//! Every connection is bounded by a request deadline and a body size cap;
//! requests that cannot be read or decoded are dropped without a response.
//! A synchronous [`client::ClientStream`] is provided for processes that
//! submit orders rather than serve them.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod orders;
pub mod server;
