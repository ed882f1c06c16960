use std::fmt::Write;

/// Canonical query string builder.
///
/// Parameters are sorted by key (then value) and percent-encoded, so the
/// string handed to the signer is byte-for-byte the one placed on the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// The `Action` / `Version` pair every service call carries.
    pub fn action(action: &str, version: &str) -> Self {
        Self::new().with("Action", action).with("Version", version)
    }

    /// Render the canonical form: sorted, `&`-joined `k=v` pairs.
    pub fn canonical(&self) -> String {
        let mut params: Vec<&(String, String)> = self.params.iter().collect();
        params.sort();

        params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
pub fn percent_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                let _ = write!(result, "%{:02X}", byte);
            }
        }
    }
    result
}
