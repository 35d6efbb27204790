//! Error taxonomy for the BLS service.
//!
//! Server-side kinds map onto bus status codes (400/403); client-side
//! verification kinds are absorbed per response (logged, response dropped).
//! Only [`BlsError::InvalidRequest`] fails a whole aggregation.

use thiserror::Error;

pub type BlsResult<T> = Result<T, BlsError>;

#[derive(Debug, Error)]
pub enum BlsError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: signing request is {age_secs}s old, too old to consider signing")]
    StaleTimestamp { age_secs: u64 },

    #[error("Invalid aggregation request: {0}")]
    InvalidRequest(String),

    #[error("Request returned an error: {0}")]
    RequestFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response subject does not match the request")]
    SubjectMismatch,

    #[error(
        "Balance/height mismatch: expected {expected_amount}/{expected_height}, \
         got {amount}/{height}"
    )]
    BalanceMismatch { expected_amount: u64, expected_height: u64, amount: u64, height: u64 },

    #[error("Invalid BLS signature for BLS pubkey {0}")]
    SignatureInvalid(String),
}
