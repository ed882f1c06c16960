//! Server-side signature verification.
//!
//! Recomputes the signature for a received request from its `X-Date` header
//! and compares it with the presented `Authorization` value.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::{Request, Signer, TIMESTAMP_FORMAT};

/// Reasons a received request fails verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    /// A header required by the scheme is absent
    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),

    /// `X-Date` could not be parsed
    #[error("Invalid X-Date header: {0}")]
    InvalidDate(String),

    /// `X-Content-Sha256` does not describe the body that arrived
    #[error("Payload hash does not match the request body")]
    PayloadMismatch,

    /// The credential in `Authorization` names a different access key
    #[error("Unknown access key in credential: {0}")]
    UnknownAccessKey(String),

    /// The recomputed signature differs from the presented one
    #[error("Signature does not match")]
    SignatureMismatch,
}

/// A request as it arrived on the wire.
#[derive(Debug, Clone, Copy)]
pub struct Received<'a> {
    /// The request line and body
    pub request: Request<'a>,
    /// `X-Date` header value
    pub date: Option<&'a str>,
    /// `X-Content-Sha256` header value
    pub content_sha256: Option<&'a str>,
    /// `Authorization` header value
    pub authorization: Option<&'a str>,
}

impl Signer {
    /// Check that `received` was signed with this signer's credentials.
    pub fn verify(&self, received: &Received<'_>) -> Result<(), SigningError> {
        let date = received
            .date
            .ok_or(SigningError::MissingHeader(crate::DATE_HEADER))?;
        let presented = received
            .authorization
            .ok_or(SigningError::MissingHeader(crate::AUTHORIZATION_HEADER))?;
        let content_sha256 = received
            .content_sha256
            .ok_or(SigningError::MissingHeader(crate::CONTENT_SHA256_HEADER))?;

        let time = NaiveDateTime::parse_from_str(date, TIMESTAMP_FORMAT)
            .map_err(|e| SigningError::InvalidDate(format!("{date}: {e}")))?
            .and_utc();

        let expected = self.sign_at(&received.request, time);

        if !constant_time_eq(expected.payload_hash.as_bytes(), content_sha256.as_bytes()) {
            return Err(SigningError::PayloadMismatch);
        }

        let credential_prefix = format!("{} Credential=", crate::ALGORITHM_IDENTIFIER);
        let access_key = presented
            .strip_prefix(&credential_prefix)
            .and_then(|rest| rest.split('/').next())
            .unwrap_or_default();
        if access_key != self.credentials().access_key() {
            return Err(SigningError::UnknownAccessKey(access_key.to_string()));
        }

        if constant_time_eq(expected.authorization.as_bytes(), presented.as_bytes()) {
            Ok(())
        } else {
            Err(SigningError::SignatureMismatch)
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
