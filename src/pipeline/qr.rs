//! QR payload parsing: `upi://pay?am=150.50&invoiceNo=INV-042` → verified fields.
//!
//! Payment QR codes carry a URI whose query holds `name=value` pairs. Only
//! two names matter here: `am` (amount) and `invoiceNo`. Values are taken
//! verbatim; there is no percent-decoding.
//!
//! Parsing is fail-open. A payload without a well-formed query produces an
//! empty [`QrVerifiedData`] and a warning, never an error.

use crate::output::QrVerifiedData;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix placed in front of the QR amount.
pub const CURRENCY_GLYPH: &str = "₹";

/// Why a payload could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload has no '?' query part")]
    MissingQuery,
    #[error("malformed query pair '{0}'")]
    MalformedPair(String),
}

/// Query pairs of a payload URI, last occurrence of a key winning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFields(HashMap<String, String>);

impl QueryFields {
    /// Value for `key`, treating an empty value as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// Split a payload into its query pairs.
///
/// The query is everything after the first `?`, sliced from the payload as
/// decoded: no scheme is required and nothing is re-encoded. Every
/// `&`-separated pair must contain exactly one `=`; one bad pair invalidates
/// the whole payload.
pub fn query_fields(payload: &str) -> Result<QueryFields, PayloadError> {
    let (_, query) = payload
        .trim()
        .split_once('?')
        .ok_or(PayloadError::MissingQuery)?;

    let mut fields = HashMap::new();
    for pair in query.split('&') {
        let mut parts = pair.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(value), None) => {
                fields.insert(name.to_string(), value.to_string());
            }
            _ => return Err(PayloadError::MalformedPair(pair.to_string())),
        }
    }
    Ok(QueryFields(fields))
}

/// Extract the invoice amount and number from a decoded QR payload.
pub fn parse_payload(payload: &str) -> QrVerifiedData {
    match query_fields(payload) {
        Ok(fields) => {
            let data = QrVerifiedData {
                invoice_amount: fields.get("am").map(|am| format!("{CURRENCY_GLYPH}{am}")),
                invoice_number: fields.get("invoiceNo").map(str::to_string),
            };
            debug!(?data, "Parsed QR payload");
            data
        }
        Err(e) => {
            warn!(error = %e, "Could not parse QR payload");
            QrVerifiedData::default()
        }
    }
}
