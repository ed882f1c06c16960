use std::path::{Path, PathBuf};
use std::time::Duration;

use companion_signing::{Credentials, Query, Request, Scope, Signer};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::{MediaError, ServiceConfig};

/// Longest raw response body echoed back in an error message.
const RAW_MESSAGE_LIMIT: usize = 200;

/// Signed HTTP client for the media service.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct MediaClient {
    config: ServiceConfig,
    signer: Signer,
    endpoint: Url,
    http: reqwest::Client,
    diagnostics: Option<PathBuf>,
}

/// Status and body text of a service reply.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    pub status: u16,
    pub text: String,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Parse the body, mapping failure to [`MediaError::Malformed`].
    pub fn json(&self) -> Result<Value, MediaError> {
        serde_json::from_str(&self.text)
            .map_err(|_| MediaError::Malformed(truncate(&self.text, RAW_MESSAGE_LIMIT)))
    }

    /// Turn a non-200 reply into a [`MediaError::Status`].
    pub fn status_error(&self) -> MediaError {
        let message = serde_json::from_str::<Value>(&self.text)
            .ok()
            .and_then(|body| error_message(&body))
            .unwrap_or_else(|| truncate(&self.text, RAW_MESSAGE_LIMIT));

        MediaError::Status {
            status: self.status,
            message,
        }
    }
}

impl MediaClient {
    /// Create a client for the configured endpoint.
    pub fn new(credentials: Credentials, config: ServiceConfig) -> Result<Self, MediaError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| MediaError::Configuration(format!("{}: {}", config.endpoint, e)))?;
        if endpoint.host_str().is_none() {
            return Err(MediaError::Configuration(format!(
                "{}: endpoint has no host",
                config.endpoint
            )));
        }

        let signer = Signer::new(
            credentials,
            Scope::new(config.region.clone(), config.service.clone()),
        );

        Ok(Self {
            diagnostics: config.diagnostics_dir.clone(),
            config,
            signer,
            endpoint,
            http: reqwest::Client::new(),
        })
    }

    /// Write the sanitized body of unrecognized responses to
    /// `<dir>/last_response.json`.
    pub fn with_diagnostics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.diagnostics = Some(dir.into());
        self
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub(crate) fn diagnostics_dir(&self) -> Option<&Path> {
        self.diagnostics.as_deref()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Host as it appears in the `Host` header, including a non-default port.
    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Sign and POST `body` to `action`.
    ///
    /// The body is serialized once so the signed bytes are the sent bytes.
    pub(crate) async fn post_action(
        &self,
        action: &str,
        body: &impl Serialize,
        timeout: Duration,
    ) -> Result<Reply, MediaError> {
        let body = serde_json::to_vec(body)
            .map_err(|e| MediaError::Malformed(format!("Could not encode request: {}", e)))?;
        let query = Query::action(action, &self.config.version).canonical();

        let mut url = self.endpoint.clone();
        url.set_path("/");
        url.set_query(Some(&query));

        let host = self.host();
        let authorization = self.signer.sign(&Request::post(&host, &query, &body));

        tracing::debug!(action, %url, bytes = body.len(), "POST");

        let mut request = self.http.post(url).timeout(timeout);
        for (name, value) in authorization.headers() {
            request = request.header(name, value);
        }

        let response = request.body(body).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        tracing::debug!(action, status, bytes = text.len(), "reply");

        Ok(Reply { status, text })
    }
}

/// Read an input image, failing before any network activity.
pub(crate) async fn read_image(path: &Path) -> Result<Vec<u8>, MediaError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(MediaError::file(path, "image file does not exist"));
    }
    tokio::fs::read(path)
        .await
        .map_err(|e| MediaError::file(path, e))
}

/// `message`, else `ResponseMetadata.Error.Message`.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| {
            body.pointer("/ResponseMetadata/Error/Message")
                .and_then(Value::as_str)
        })
        .map(str::to_string)
}

/// The business `code`, from the top level or under `response`.
pub(crate) fn response_code(body: &Value) -> Option<&Value> {
    body.get("code")
        .or_else(|| body.pointer("/response/code"))
        .filter(|code| !code.is_null())
}

/// Render a `code` value without JSON quoting.
pub(crate) fn code_text(code: &Value) -> String {
    match code {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Cut `text` to at most `limit` characters.
pub(crate) fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}
