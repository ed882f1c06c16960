//! Canonical request construction and signature computation.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt::Write;

use crate::{Credentials, Scope};

/// Algorithm name at the head of the string to sign and the header.
pub const ALGORITHM_IDENTIFIER: &str = "HMAC-SHA256";
/// Final component of the credential scope.
pub const KEY_TYPE_IDENTIFIER: &str = "request";
/// Every request body is JSON.
pub const CONTENT_TYPE: &str = "application/json";
/// Fixed list of signed headers.
pub const SIGNED_HEADERS: &str = "content-type;host;x-content-sha256;x-date";
/// All actions are addressed at the root path.
pub const CANONICAL_URI: &str = "/";

/// Header carrying the signing timestamp.
pub const DATE_HEADER: &str = "X-Date";
/// Header carrying the credential and signature.
pub const AUTHORIZATION_HEADER: &str = "Authorization";
/// Header carrying the body hash.
pub const CONTENT_SHA256_HEADER: &str = "X-Content-Sha256";
/// Content type header name.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Format of the `X-Date` header.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// A single HTTP request as seen by the signer.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    /// HTTP method, upper case
    pub method: &'a str,
    /// Host header value, including a non-default port
    pub host: &'a str,
    /// Canonical query string (see [`crate::Query::canonical`])
    pub query: &'a str,
    /// Raw request body
    pub body: &'a [u8],
}

impl<'a> Request<'a> {
    /// A `POST` request with a canonical query string and body.
    pub fn post(host: &'a str, query: &'a str, body: &'a [u8]) -> Self {
        Self::new("POST", host, query, body)
    }

    /// A request with an explicit method and pre-rendered query string.
    pub fn new(method: &'a str, host: &'a str, query: &'a str, body: &'a [u8]) -> Self {
        Self {
            method,
            host,
            query,
            body,
        }
    }
}

/// Everything computed while signing one request.
///
/// Intermediate values are exposed so they can be compared against a
/// reference implementation when debugging a rejected signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// `YYYYMMDDTHHMMSSZ`, sent as `X-Date`
    pub timestamp: String,
    /// `YYYYMMDD`
    pub date: String,
    /// Hex SHA-256 of the body, sent as `X-Content-Sha256`
    pub payload_hash: String,
    /// `date/region/service/request`
    pub scope: String,
    /// The canonical request that was hashed
    pub canonical_request: String,
    /// The string the signing key was applied to
    pub string_to_sign: String,
    /// Hex signature
    pub signature: String,
    /// Full `Authorization` header value
    pub authorization: String,
}

impl Authorization {
    /// The headers that must accompany the request, in wire form.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        [
            (DATE_HEADER, self.timestamp.clone()),
            (AUTHORIZATION_HEADER, self.authorization.clone()),
            (CONTENT_SHA256_HEADER, self.payload_hash.clone()),
            (CONTENT_TYPE_HEADER, CONTENT_TYPE.to_string()),
        ]
    }
}

/// Signs requests with one key pair for one region/service scope.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
    scope: Scope,
}

impl Signer {
    /// Create a signer.
    pub fn new(credentials: Credentials, scope: Scope) -> Self {
        Self { credentials, scope }
    }

    /// The credentials this signer uses.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The region/service scope.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Sign a request at the current wall-clock time.
    pub fn sign(&self, request: &Request<'_>) -> Authorization {
        self.sign_at(request, current_time())
    }

    /// Sign a request as if it were sent at `time`.
    pub fn sign_at(&self, request: &Request<'_>, time: DateTime<Utc>) -> Authorization {
        let timestamp = time.format(TIMESTAMP_FORMAT).to_string();
        let date = timestamp[0..8].to_string();

        let payload_hash = hex_encode(&Sha256::digest(request.body));

        let canonical_headers = format!(
            "content-type:{}\nhost:{}\nx-content-sha256:{}\nx-date:{}\n",
            CONTENT_TYPE, request.host, payload_hash, timestamp
        );

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method,
            CANONICAL_URI,
            request.query,
            canonical_headers,
            SIGNED_HEADERS,
            payload_hash
        );

        let scope = self.scope.credential_scope(&date);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM_IDENTIFIER,
            timestamp,
            scope,
            hex_encode(&Sha256::digest(canonical_request.as_bytes()))
        );

        let key = SigningKey::derive(
            self.credentials.secret_key(),
            &date,
            self.scope.region(),
            self.scope.service(),
        );
        let signature = key.sign(string_to_sign.as_bytes()).to_string();

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM_IDENTIFIER,
            self.credentials.access_key(),
            scope,
            SIGNED_HEADERS,
            signature
        );

        Authorization {
            timestamp,
            date,
            payload_hash,
            scope,
            canonical_request,
            string_to_sign,
            signature,
            authorization,
        }
    }
}

/// Derived per-request signing key.
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Derive the key for the given date, region and service.
    pub fn derive(secret_key: &str, date: &str, region: &str, service: &str) -> Self {
        let k_date = hmac_sign(secret_key.as_bytes(), date.as_bytes());
        let k_region = hmac_sign(&k_date, region.as_bytes());
        let k_service = hmac_sign(&k_region, service.as_bytes());
        Self(hmac_sign(&k_service, KEY_TYPE_IDENTIFIER.as_bytes()))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Sign a message with this key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(hmac_sign(&self.0, message))
    }
}

/// HMAC-SHA256 signature, displayed as lowercase hex.
pub struct Signature(Vec<u8>);

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Get the current time as a UTC datetime.
pub fn current_time() -> DateTime<Utc> {
    Utc::now()
}

fn hmac_sign(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Lowercase hex encoding.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(result, "{:02x}", byte);
    }
    result
}
