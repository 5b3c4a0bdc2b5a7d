//! Order and feedback decoding plus total computation.
//!
//! An order carries parallel quantity/price sequences, a destination
//! country, and a reduction code. The total is the gross sum of the item
//! lines with the country's tax applied, minus the reduction.

use crate::http::StatusCode;
use serde::Deserialize;
use std::fmt;

/// A purchase order
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Order {
    pub quantities: Vec<u32>,
    pub prices: Vec<f64>,
    pub country: String,
    pub reduction: String,
}

/// A feedback submission
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Feedback {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

/// Outcome of a total computation
#[derive(Debug, Clone, PartialEq)]
pub struct TotalAmount {
    pub status: StatusCode,
    pub amount: f64,
}

/// Body decoding errors
#[derive(Debug)]
pub enum DecodeError {
    /// Body is not valid JSON for the expected shape
    Json(serde_json::Error),
    /// Quantities and prices are not the same length
    LengthMismatch { quantities: usize, prices: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "Invalid JSON: {}", e),
            DecodeError::LengthMismatch { quantities, prices } => write!(
                f,
                "Quantities/prices length mismatch: {} != {}",
                quantities, prices
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e)
    }
}

/// Decode an order body and check the quantities/prices invariant
pub fn parse_order(body: &[u8]) -> Result<Order, DecodeError> {
    let order: Order = serde_json::from_slice(body)?;
    if order.quantities.len() != order.prices.len() {
        return Err(DecodeError::LengthMismatch {
            quantities: order.quantities.len(),
            prices: order.prices.len(),
        });
    }
    Ok(order)
}

/// Decode a feedback body
pub fn parse_feedback(body: &[u8]) -> Result<Feedback, DecodeError> {
    Ok(serde_json::from_slice(body)?)
}

/// Compute the total owed for an order body.
///
/// Every well-formed order computes to a 200 status; malformed bodies are
/// decode errors, not responses.
pub fn compute_total(body: &[u8]) -> Result<TotalAmount, DecodeError> {
    let order = parse_order(body)?;

    let gross: f64 = order
        .quantities
        .iter()
        .zip(&order.prices)
        .map(|(&quantity, &price)| f64::from(quantity) * price)
        .sum();
    let taxed = gross * country_tax(&order.country);
    let amount = taxed * (1.0 - reduction_rate(&order.reduction, taxed));

    Ok(TotalAmount {
        status: StatusCode::OK,
        amount,
    })
}

/// Tax multiplier by country code; unknown countries pass through untaxed
fn country_tax(country: &str) -> f64 {
    match country {
        "AT" => 1.22,
        "BE" => 1.24,
        "BG" => 1.21,
        "CY" => 1.21,
        "CZ" => 1.19,
        "DE" => 1.20,
        "DK" => 1.21,
        "EE" => 1.22,
        "EL" => 1.20,
        "ES" => 1.19,
        "FI" => 1.17,
        "FR" => 1.20,
        "HR" => 1.23,
        "HU" => 1.27,
        "IE" => 1.21,
        "IT" => 1.25,
        "LT" => 1.23,
        "LU" => 1.25,
        "LV" => 1.20,
        "MT" => 1.20,
        "NL" => 1.20,
        "PL" => 1.21,
        "PT" => 1.23,
        "RO" => 1.20,
        "SE" => 1.23,
        "SI" => 1.24,
        "SK" => 1.18,
        "UK" => 1.21,
        _ => 1.0,
    }
}

/// Discount rate for a reduction code, tiered by the taxed total where
/// the code calls for it
fn reduction_rate(reduction: &str, taxed_total: f64) -> f64 {
    match reduction {
        "STANDARD" => {
            if taxed_total >= 50_000.0 {
                0.15
            } else if taxed_total >= 10_000.0 {
                0.10
            } else if taxed_total >= 7_000.0 {
                0.07
            } else if taxed_total >= 5_000.0 {
                0.05
            } else if taxed_total >= 1_000.0 {
                0.03
            } else {
                0.0
            }
        }
        "HALF PRICE" => 0.5,
        // PAY THE PRICE and anything unrecognized take no discount
        _ => 0.0,
    }
}
