use serde::{Deserialize, Serialize};

/// Access key pair issued by the media service.
///
/// The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    /// Create credentials from an access key and its secret.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// The public half of the key pair, sent in the `Authorization` header.
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub(crate) fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Whether both halves are non-blank.
    pub fn is_complete(&self) -> bool {
        !self.access_key.trim().is_empty() && !self.secret_key.trim().is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Region and service a signing key is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    region: String,
    service: String,
}

impl Scope {
    /// Create a scope for the given region and service name.
    pub fn new(region: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            service: service.into(),
        }
    }

    /// Region, e.g. `cn-north-1`.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Service name, e.g. `cv`.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Credential scope string for the given `YYYYMMDD` date.
    pub fn credential_scope(&self, date: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            date, self.region, self.service, crate::KEY_TYPE_IDENTIFIER
        )
    }
}
