//! Report composition: suggested value, token identifier, metadata record and
//! mint payload.
//!
//! All functions are pure apart from the random token suffix, so the
//! numeric rules are easy to pin down in tests.

use crate::output::{
    AnalysisReport, MetadataAttribute, NftMetadata, TransactionPayload, VerificationMethod,
};
use rand::Rng;
use serde_json::Value;
use tracing::warn;

/// Score used when the analyzer omits `authenticity_score`.
pub const DEFAULT_AUTHENTICITY_SCORE: f64 = 0.7;

/// Scale applied to the discounted total (micro-units).
pub const VALUE_SCALE: f64 = 1_000_000.0;

/// Fixed prefix of every token identifier.
pub const TOKEN_PREFIX: &str = "RWA";

/// `floor(total × score × 1_000_000)`, or 0 when either input is unusable.
///
/// `total` may be a JSON number or a string with thousands separators
/// (`"1,234.50"`); an absent total counts as zero. An absent score falls back
/// to [`DEFAULT_AUTHENTICITY_SCORE`]; a present score must be a number and is
/// clamped to `[0, 1]`.
///
/// A negative total yields 0, never a negative value: the result is unsigned
/// and anything at or below zero after flooring is reported as 0.
pub fn suggested_value(report: &AnalysisReport) -> u128 {
    let total = match parse_total(report.get("total")) {
        Some(t) => t,
        None => {
            warn!(total = ?report.get("total"), "Non-numeric total; suggested value defaults to 0");
            return 0;
        }
    };
    let score = match parse_score(report.get("authenticity_score")) {
        Some(s) => s,
        None => {
            warn!(
                score = ?report.get("authenticity_score"),
                "Non-numeric authenticity score; suggested value defaults to 0"
            );
            return 0;
        }
    };

    let scaled = (total * score * VALUE_SCALE).floor();
    if scaled.is_finite() && scaled > 0.0 {
        scaled as u128
    } else {
        0
    }
}

fn parse_total(value: Option<&Value>) -> Option<f64> {
    match value {
        None => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.replace(',', "").trim().parse::<f64>().ok(),
        Some(_) => None,
    }
    .filter(|t| t.is_finite())
}

fn parse_score(value: Option<&Value>) -> Option<f64> {
    match value {
        None => Some(DEFAULT_AUTHENTICITY_SCORE),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|s| s.is_finite())
            .map(|s| s.clamp(0.0, 1.0)),
        Some(_) => None,
    }
}

/// `RWA_{filename with '.' → '_'}_{8 hex chars}`. No collision detection.
pub fn token_id(filename: &str) -> String {
    let suffix: [u8; 4] = rand::thread_rng().gen();
    format!(
        "{}_{}_{}",
        TOKEN_PREFIX,
        filename.replace('.', "_"),
        hex::encode(suffix)
    )
}

/// Metadata record pinned for the token.
pub fn build_metadata(
    filename: &str,
    report: &AnalysisReport,
    method: VerificationMethod,
) -> NftMetadata {
    let mut attributes = vec![MetadataAttribute {
        trait_type: "Verification Method".to_string(),
        value: Value::String(method.as_str().to_string()),
    }];
    for (trait_type, key) in [
        ("Authenticity Score", "authenticity_score"),
        ("Total", "total"),
        ("Currency", "currency"),
        ("Date", "date"),
    ] {
        if let Some(value) = report.get(key).filter(|v| !v.is_null()) {
            attributes.push(MetadataAttribute {
                trait_type: trait_type.to_string(),
                value: value.clone(),
            });
        }
    }

    NftMetadata {
        name: format!("AI Verified RWA: {filename}"),
        description: report.verification_summary().map(str::to_string),
        attributes,
    }
}

/// Assemble the `verify_and_mint` instruction.
pub fn build_payload(
    token_id: String,
    owner: Option<String>,
    token_uri: String,
    report: &AnalysisReport,
    suggested_value: u128,
    publisher_tag: &str,
) -> TransactionPayload {
    TransactionPayload::VerifyAndMint {
        token_id,
        owner,
        token_uri,
        ai_report: report.source_text().to_string(),
        suggested_value: suggested_value.to_string(),
        rwa_publisher: publisher_tag.to_string(),
    }
}
