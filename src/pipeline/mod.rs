//! Pipeline stages for preparing a mint from an uploaded document.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the external collaborators (analyzer, pinning service) can be
//! swapped for stubs.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ analyze ──▶ scan ──▶ qr ──▶ compose ──▶ publish ──▶ payload
//!            (VLM)      (pdfium/  (URI    (value,     (IPFS)
//!                        rqrr)     query)  token id)
//! ```
//!
//! 1. [`analyze`]: the only fatal external call before publishing; parses
//!    the model's JSON report
//! 2. [`scan`]: fail-open QR discovery; runs in `spawn_blocking`
//! 3. [`qr`]: fail-open payload parsing into verified fields
//! 4. [`compose`]: pure functions for suggested value, token id, metadata, payload
//! 5. [`publish`]: pin the metadata record, return the gateway URI

pub mod analyze;
pub mod compose;
pub mod publish;
pub mod qr;
pub mod scan;
