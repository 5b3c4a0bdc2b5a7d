//! Request dispatch for the order endpoint.
//!
//! Maps an incoming request's method, target, content type, and body to a
//! response. Unrecognized combinations get the not-found fallback; bodies
//! that fail to decode propagate as errors and the connection is dropped
//! without a response.

use crate::http::{Method, Request, Response, StatusCode};
use crate::orders::{self, DecodeError};
use tracing::info;

/// Content type accepted on the order and feedback routes
const JSON_CONTENT_TYPE: &str = "application/json";

/// Produce the response for a request.
///
/// Routing rules, in order:
/// 1. Anything that is not a JSON POST gets the not-found fallback.
/// 2. `/order` computes a total and answers `{"total": <amount>}`.
/// 3. `/feedback` logs the submission and answers plaintext.
/// 4. Any other target gets the same fallback.
pub fn dispatch(request: &Request) -> Result<Response, DecodeError> {
    if request.method != Method::Post || request.content_type() != Some(JSON_CONTENT_TYPE) {
        return Ok(Response::not_found());
    }

    match request.target.as_str() {
        "/order" => {
            let order = orders::parse_order(&request.body)?;
            info!(
                country = %order.country,
                reduction = %order.reduction,
                lines = order.quantities.len(),
                "Order received"
            );

            let total = orders::compute_total(&request.body)?;
            let body = serde_json::json!({ "total": total.amount }).to_string();
            Ok(Response::new(total.status, body))
        }
        "/feedback" => {
            let feedback = orders::parse_feedback(&request.body)?;
            info!(kind = %feedback.kind, content = %feedback.content, "Feedback received");
            Ok(Response::new(StatusCode::OK, "Feedback received"))
        }
        _ => Ok(Response::not_found()),
    }
}
