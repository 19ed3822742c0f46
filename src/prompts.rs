//! Instruction text sent to the document analyzer.
//!
//! Kept in one place so unit tests can inspect it and so the requested field
//! names stay in sync with the accessors on [`crate::output::AnalysisReport`].

/// Fixed instruction attached to every uploaded document.
///
/// The field names listed here are the ones the orchestrator reads back
/// (`total`, `authenticity_score`, `verification_summary`, ...).
pub const ANALYSIS_PROMPT: &str = "Analyze this document. \
    If it is an invoice, extract the invoice total, currency, and date. \
    Also, determine if it looks authentic (e.g., has signatures, proper formatting). \
    Output as a JSON object with fields: 'is_invoice', 'total', 'currency', 'date', \
    'authenticity_score', 'verification_summary'. \
    'authenticity_score' must be a number between 0.0 and 1.0.";

/// Report fields the prompt asks for, in the order they are listed.
pub(crate) const REPORT_FIELDS: [&str; 6] = [
    "is_invoice",
    "total",
    "currency",
    "date",
    "authenticity_score",
    "verification_summary",
];
