//! Decision records and the rules that keep them consistent

pub mod parse;
mod status;
mod types;

pub use parse::{decode_decisions, parse_participants, parse_response, ParsedResponse};
pub use status::{compute_status, enforce_status, validate, StatusCorrection};
pub use types::{AgreementValue, Decision, Significance, Status};
