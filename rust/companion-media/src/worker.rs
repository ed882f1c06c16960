//! Run a generation in the background so the caller's event loop stays
//! responsive.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::MediaError;
use crate::capability::{AvatarGenerator, VideoGenerator};

/// Handle to a generation running on its own tokio task.
///
/// Dropping the handle does not stop the task; call [`Task::cancel`].
#[derive(Debug)]
pub struct Task<T> {
    cancel: CancellationToken,
    handle: JoinHandle<Result<T, MediaError>>,
}

/// A background video generation.
pub type VideoTask = Task<PathBuf>;

/// A background avatar generation.
pub type AvatarTask = Task<Vec<u8>>;

impl<T: Send + 'static> Task<T> {
    /// Spawn `work`, handing it the token that [`cancel`](Self::cancel) fires.
    pub fn spawn<F, Fut>(work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, MediaError>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(work(cancel.clone()));
        Self { cancel, handle }
    }

    /// Ask the task to stop. It finishes with [`MediaError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the task has finished, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the result.
    pub async fn join(self) -> Result<T, MediaError> {
        match self.handle.await {
            Ok(result) => result,
            Err(error) => Err(MediaError::Worker(error.to_string())),
        }
    }
}

impl VideoTask {
    /// Animate `image_path` in the background.
    pub fn animate(
        generator: Arc<dyn VideoGenerator>,
        image_path: PathBuf,
        save_dir: PathBuf,
    ) -> Self {
        Task::spawn(move |cancel| async move {
            generator.animate(&image_path, &save_dir, cancel).await
        })
    }
}

impl AvatarTask {
    /// Generate an avatar in the background. Cancellation abandons the
    /// in-flight request.
    pub fn generate(
        generator: Arc<dyn AvatarGenerator>,
        image_path: PathBuf,
        prompt: Option<String>,
    ) -> Self {
        Task::spawn(move |cancel| async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(MediaError::Cancelled { operation: "avatar generation".into() }),
                generated = generator.generate_avatar(&image_path, prompt.as_deref()) => generated,
            }
        })
    }
}
