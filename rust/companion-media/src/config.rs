use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Production endpoint of the media service.
pub const DEFAULT_ENDPOINT: &str = "https://visual.volcengineapi.com";
/// Region the service is signed for.
pub const DEFAULT_REGION: &str = "cn-north-1";
/// Service name in the credential scope.
pub const DEFAULT_SERVICE: &str = "cv";
/// API version sent with every action.
pub const DEFAULT_VERSION: &str = "2022-08-31";

/// Business `code` values that mean success.
///
/// The service reports success as `10000`; some actions use `0`. Both
/// integers and their string forms are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessCodes(Vec<i64>);

impl SuccessCodes {
    /// Accept exactly the given codes.
    pub fn new(codes: impl IntoIterator<Item = i64>) -> Self {
        Self(codes.into_iter().collect())
    }

    /// Whether a `code` value from a response denotes success.
    pub fn accepts(&self, code: &Value) -> bool {
        let parsed = match code {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed.is_some_and(|code| self.0.contains(&code))
    }
}

/// Connection and behaviour settings for [`MediaClient`](crate::MediaClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the service
    pub endpoint: String,
    /// Signing region
    pub region: String,
    /// Signing service name
    pub service: String,
    /// Value of the `Version` query parameter
    pub version: String,

    /// Timeout for the synchronous avatar transform (default: 90)
    pub transform_timeout_seconds: u64,
    /// Timeout for job submit and result queries (default: 60)
    pub job_timeout_seconds: u64,
    /// Timeout for downloading a finished video (default: 60)
    pub download_timeout_seconds: u64,
    /// Timeout for fetching an image referenced by URL (default: 30)
    pub fetch_timeout_seconds: u64,

    /// Codes accepted as success by the avatar transform
    pub transform_success: SuccessCodes,
    /// Codes accepted as success by the job endpoints
    pub job_success: SuccessCodes,

    /// Whether avatar generation is offered
    pub avatar_enabled: bool,
    /// Whether video generation is offered
    pub video_enabled: bool,

    /// Where unrecognized responses are saved, if anywhere
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            version: DEFAULT_VERSION.to_string(),
            transform_timeout_seconds: 90,
            job_timeout_seconds: 60,
            download_timeout_seconds: 60,
            fetch_timeout_seconds: 30,
            transform_success: SuccessCodes::new([10000, 0]),
            job_success: SuccessCodes::new([10000]),
            avatar_enabled: true,
            video_enabled: true,
            diagnostics_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Configuration for a non-default endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the signing region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Set the signing service name.
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Set the success codes of the avatar transform.
    pub fn with_transform_success(mut self, codes: SuccessCodes) -> Self {
        self.transform_success = codes;
        self
    }

    /// Set the success codes of the job endpoints.
    pub fn with_job_success(mut self, codes: SuccessCodes) -> Self {
        self.job_success = codes;
        self
    }

    /// Set every request timeout to the same value.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.transform_timeout_seconds = seconds;
        self.job_timeout_seconds = seconds;
        self.download_timeout_seconds = seconds;
        self.fetch_timeout_seconds = seconds;
        self
    }

    /// Enable or disable the optional capabilities.
    pub fn with_capabilities(mut self, avatar: bool, video: bool) -> Self {
        self.avatar_enabled = avatar;
        self.video_enabled = video;
        self
    }

    /// Save unrecognized responses to `<dir>/last_response.json`.
    pub fn with_diagnostics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.diagnostics_dir = Some(dir.into());
        self
    }

    pub(crate) fn transform_timeout(&self) -> Duration {
        Duration::from_secs(self.transform_timeout_seconds)
    }

    pub(crate) fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    pub(crate) fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }

    pub(crate) fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}
