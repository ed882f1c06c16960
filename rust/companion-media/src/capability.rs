//! Optional generation features, as seen by the rest of the application.
//!
//! The pet works without the media service. Each feature is a trait object
//! chosen once at startup by [`Capabilities::from_config`]; when the service
//! is not configured the [`Unavailable`] implementation is installed and
//! every call fails with [`MediaError::Unavailable`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use companion_signing::Credentials;
use tokio_util::sync::CancellationToken;

use crate::{MediaClient, MediaError, PollPolicy, ServiceConfig, VideoRequest};

/// Turns a pet photo into an avatar image.
#[async_trait]
pub trait AvatarGenerator: Send + Sync {
    /// Whether calls can succeed at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Generate an avatar from the image at `image_path`.
    async fn generate_avatar(
        &self,
        image_path: &Path,
        prompt: Option<&str>,
    ) -> Result<Vec<u8>, MediaError>;
}

/// Turns a still image into a short looping video.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Whether calls can succeed at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Animate the image at `image_path`, saving the video under `save_dir`.
    async fn animate(
        &self,
        image_path: &Path,
        save_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<PathBuf, MediaError>;
}

/// Stand-in for a feature that is not configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    /// A disabled feature, with the reason shown to the user.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Why the feature is disabled.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    fn error(&self) -> MediaError {
        MediaError::Unavailable(self.reason.clone())
    }
}

#[async_trait]
impl AvatarGenerator for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    async fn generate_avatar(&self, _: &Path, _: Option<&str>) -> Result<Vec<u8>, MediaError> {
        Err(self.error())
    }
}

#[async_trait]
impl VideoGenerator for Unavailable {
    fn is_available(&self) -> bool {
        false
    }

    async fn animate(&self, _: &Path, _: &Path, _: CancellationToken) -> Result<PathBuf, MediaError> {
        Err(self.error())
    }
}

#[async_trait]
impl AvatarGenerator for MediaClient {
    async fn generate_avatar(
        &self,
        image_path: &Path,
        prompt: Option<&str>,
    ) -> Result<Vec<u8>, MediaError> {
        self.transform_file(image_path, prompt).await
    }
}

/// Video generation backed by [`MediaClient::generate_video`].
#[derive(Debug, Clone)]
pub struct JimengVideo {
    client: MediaClient,
    request: VideoRequest,
    policy: PollPolicy,
}

impl JimengVideo {
    /// Generate with default parameters and polling.
    pub fn new(client: MediaClient) -> Self {
        Self {
            client,
            request: VideoRequest::default(),
            policy: PollPolicy::default(),
        }
    }

    /// Use `request` for every generation.
    pub fn with_request(mut self, request: VideoRequest) -> Self {
        self.request = request;
        self
    }

    /// Poll according to `policy`.
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl VideoGenerator for JimengVideo {
    async fn animate(
        &self,
        image_path: &Path,
        save_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        self.client
            .generate_video(image_path, save_dir, &self.request, &self.policy, cancel)
            .await
    }
}

/// The generation features available to this run of the application.
#[derive(Clone)]
pub struct Capabilities {
    /// Avatar generation
    pub avatar: Arc<dyn AvatarGenerator>,
    /// Video generation
    pub video: Arc<dyn VideoGenerator>,
}

impl Capabilities {
    /// Everything disabled for the same reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let unavailable = Unavailable::new(reason);
        Self {
            avatar: Arc::new(unavailable.clone()),
            video: Arc::new(unavailable),
        }
    }

    /// Select implementations from configuration.
    ///
    /// A feature is live only when it is enabled and complete credentials
    /// are present.
    pub fn from_config(config: &ServiceConfig, credentials: Option<Credentials>) -> Self {
        let Some(credentials) = credentials.filter(Credentials::is_complete) else {
            tracing::info!("no media service credentials, generation features disabled");
            return Self::unavailable("media service credentials are not configured");
        };

        let client = match MediaClient::new(credentials, config.clone()) {
            Ok(client) => client,
            Err(error) => {
                tracing::warn!(%error, "media service disabled");
                return Self::unavailable(error.to_string());
            }
        };

        let avatar: Arc<dyn AvatarGenerator> = if config.avatar_enabled {
            Arc::new(client.clone())
        } else {
            Arc::new(Unavailable::new("avatar generation is disabled"))
        };
        let video: Arc<dyn VideoGenerator> = if config.video_enabled {
            Arc::new(JimengVideo::new(client))
        } else {
            Arc::new(Unavailable::new("video generation is disabled"))
        };

        Self { avatar, video }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("avatar", &self.avatar.is_available())
            .field("video", &self.video.is_available())
            .finish()
    }
}
