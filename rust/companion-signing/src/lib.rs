#![warn(missing_docs)]

//! Request signing for the generative-media service.
//!
//! The service authenticates every call with an HMAC-SHA256 scheme modelled
//! on AWS SigV4, but with its own constants: the algorithm identifier is
//! `HMAC-SHA256`, the scope terminator is `request`, and the secret key is
//! used as-is to seed the key derivation (no `AWS4` prefix).
//!
//! The signed header set is fixed. Every request carries exactly
//! `content-type`, `host`, `x-content-sha256` and `x-date`, so the canonical
//! request only varies in method, query string, host, body and time.
//!
//! # Example
//!
//! ```
//! use companion_signing::{Credentials, Query, Request, Scope, Signer};
//!
//! let signer = Signer::new(
//!     Credentials::new("AKEXAMPLE", "secret"),
//!     Scope::new("cn-north-1", "cv"),
//! );
//!
//! let query = Query::new()
//!     .with("Action", "CVProcess")
//!     .with("Version", "2022-08-31")
//!     .canonical();
//! let body = br#"{"req_key":"jimeng_i2i_v30"}"#;
//!
//! let authorization = signer.sign(&Request::post("visual.volcengineapi.com", &query, body));
//! for (name, value) in authorization.headers() {
//!     println!("{name}: {value}");
//! }
//! ```

mod credentials;
pub use credentials::*;

mod query;
pub use query::*;

mod signer;
pub use signer::*;

mod verify;
pub use verify::*;
