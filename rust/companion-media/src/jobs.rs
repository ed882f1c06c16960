use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::client::{code_text, error_message, read_image, response_code, truncate};
use crate::{MediaClient, MediaError, extract::summarize};

/// Action that submits an image-to-video job.
pub const SUBMIT_ACTION: &str = "CVSync2AsyncSubmitTask";
/// Action that queries a submitted job.
pub const RESULT_ACTION: &str = "CVSync2AsyncGetResult";
/// Model key of the first/last-frame video generator.
pub const VIDEO_REQ_KEY: &str = "jimeng_i2v_first_tail_v30";
/// Prompt used when the caller does not supply one.
pub const DEFAULT_VIDEO_PROMPT: &str = "旋转跳跃";
/// Number of frames generated by default.
pub const DEFAULT_FRAMES: u32 = 121;
/// Delay between result queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Upper bound on the time spent waiting for a job.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(15 * 60);

/// Suffix appended to the image stem to name the downloaded video.
const VIDEO_SUFFIX: &str = "_i2v.mp4";

/// Parameters of an image-to-video generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    /// Motion description
    pub prompt: String,
    /// Random seed, `-1` for a random one
    pub seed: i64,
    /// Number of frames to generate
    pub frames: u32,
}

impl Default for VideoRequest {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_VIDEO_PROMPT.to_string(),
            seed: -1,
            frames: DEFAULT_FRAMES,
        }
    }
}

/// How long to keep asking for a job's result.
///
/// Polling stops at whichever bound is hit first. With both bounds unset,
/// only cancellation ends the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between queries
    pub interval: Duration,
    /// Maximum number of queries
    pub max_attempts: Option<u32>,
    /// Maximum time spent polling
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            max_wait: Some(DEFAULT_MAX_WAIT),
        }
    }
}

impl PollPolicy {
    /// Set the delay between queries.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Give up after `attempts` queries.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Give up once `wait` has elapsed.
    pub fn with_max_wait(mut self, wait: Duration) -> Self {
        self.max_wait = Some(wait);
        self
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
            || self.max_wait.is_some_and(|max| elapsed >= max)
    }
}

/// Progress reported by the service for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Queued or generating
    Pending,
    /// Finished; the result URL should be available
    Done,
    /// Any status this client does not know
    Other(String),
}

impl From<Option<&str>> for JobStatus {
    fn from(status: Option<&str>) -> Self {
        match status {
            Some("done") => JobStatus::Done,
            None | Some("in_queue") | Some("generating") => JobStatus::Pending,
            Some(other) => JobStatus::Other(other.to_string()),
        }
    }
}

/// A single answer to a result query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Service-side task id
    pub id: String,
    /// Reported status
    pub status: JobStatus,
    /// `data.video_url`, when present
    pub video_url: Option<String>,
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    req_key: &'a str,
    binary_data_base64: [&'a str; 2],
    prompt: &'a str,
    seed: i64,
    frames: u32,
}

#[derive(Serialize)]
struct ResultBody<'a> {
    req_key: &'a str,
    task_id: &'a str,
}

impl MediaClient {
    /// Submit a video job using `image` as both first and last frame.
    ///
    /// Returns the task id. Submission is never retried.
    pub async fn submit_video_job(
        &self,
        image: &[u8],
        request: &VideoRequest,
    ) -> Result<String, MediaError> {
        let encoded = STANDARD.encode(image);
        let body = SubmitBody {
            req_key: VIDEO_REQ_KEY,
            binary_data_base64: [encoded.as_str(), encoded.as_str()],
            prompt: &request.prompt,
            seed: request.seed,
            frames: request.frames,
        };

        let response = self.job_reply(SUBMIT_ACTION, &body).await?;
        let task_id = match response.pointer("/data/task_id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(self.unrecognized(&response, summarize(&response)).await),
        };

        tracing::info!(task_id = %task_id, "video job submitted");
        Ok(task_id)
    }

    /// Ask the service once for the state of `job_id`.
    pub async fn query_job(&self, job_id: &str) -> Result<Job, MediaError> {
        let body = ResultBody {
            req_key: VIDEO_REQ_KEY,
            task_id: job_id,
        };
        let response = self.job_reply(RESULT_ACTION, &body).await?;

        Ok(Job {
            id: job_id.to_string(),
            status: response.pointer("/data/status").and_then(Value::as_str).into(),
            video_url: response
                .pointer("/data/video_url")
                .and_then(Value::as_str)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
        })
    }

    /// Poll `job_id` until it is done and return its video URL.
    ///
    /// Failed queries are logged and retried on the next tick. The wait ends
    /// with [`MediaError::Timeout`] when `policy` is exhausted and with
    /// [`MediaError::Cancelled`] as soon as `cancel` fires, even mid-sleep.
    pub async fn wait_for_job(
        &self,
        job_id: &str,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<String, MediaError> {
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let queried = tokio::select! {
                _ = cancel.cancelled() => return Err(MediaError::cancelled(format!("job {}", job_id))),
                queried = self.query_job(job_id) => queried,
            };

            match queried {
                Ok(Job {
                    status: JobStatus::Done,
                    video_url: Some(url),
                    ..
                }) => {
                    tracing::info!(job_id, attempts, "video job done");
                    return Ok(url);
                }
                Ok(Job {
                    status: JobStatus::Done,
                    video_url: None,
                    ..
                }) => {
                    return Err(MediaError::Schema {
                        summary: format!("job {} is done but reported no video_url", job_id),
                    });
                }
                Ok(job) => tracing::debug!(job_id, attempts, status = ?job.status, "video job pending"),
                Err(error) => tracing::warn!(job_id, attempts, %error, "result query failed, retrying"),
            }

            let elapsed = started.elapsed();
            if policy.exhausted(attempts, elapsed) {
                return Err(MediaError::Timeout {
                    job_id: job_id.to_string(),
                    attempts,
                    elapsed,
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(MediaError::cancelled(format!("job {}", job_id))),
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    /// Stream `url` into `dest`, creating its parent directory.
    ///
    /// A partially written file is removed when the download fails.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), MediaError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MediaError::file(parent, e))?;
        }

        let result = self.download_into(url, dest).await;
        if result.is_err() {
            remove_partial(dest).await;
        }
        result
    }

    async fn download_into(&self, url: &str, dest: &Path) -> Result<(), MediaError> {
        let mut response = self
            .http()
            .get(url)
            .timeout(self.config().download_timeout())
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(MediaError::Status {
                status,
                message: format!("download of {} failed", url),
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| MediaError::file(dest, e))?;
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| MediaError::file(dest, e))?;
            written += chunk.len();
        }
        file.flush().await.map_err(|e| MediaError::file(dest, e))?;

        tracing::debug!(url, bytes = written, "download complete");
        Ok(())
    }

    /// Generate a short video from a still image and save it under
    /// `save_dir` as `<stem>_i2v.mp4`.
    pub async fn generate_video(
        &self,
        image_path: &Path,
        save_dir: &Path,
        request: &VideoRequest,
        policy: &PollPolicy,
        cancel: CancellationToken,
    ) -> Result<PathBuf, MediaError> {
        let image = read_image(image_path).await?;
        let dest = video_path_for(image_path, save_dir);

        let job_id = tokio::select! {
            _ = cancel.cancelled() => return Err(MediaError::cancelled("video submission")),
            submitted = self.submit_video_job(&image, request) => submitted?,
        };

        let url = self.wait_for_job(&job_id, policy, &cancel).await?;

        tokio::select! {
            _ = cancel.cancelled() => {
                remove_partial(&dest).await;
                return Err(MediaError::cancelled(format!("download of job {}", job_id)));
            }
            downloaded = self.download(&url, &dest) => downloaded?,
        }

        tracing::info!(path = %dest.display(), "video saved");
        Ok(dest)
    }

    /// POST to a job action and check the reply is a successful JSON body.
    async fn job_reply(&self, action: &str, body: &impl Serialize) -> Result<Value, MediaError> {
        let reply = self
            .post_action(action, body, self.config().job_timeout())
            .await?;
        if !reply.is_ok() {
            return Err(reply.status_error());
        }

        let response = reply.json()?;
        match response_code(&response) {
            Some(code) if self.config().job_success.accepts(code) => Ok(response),
            code => Err(MediaError::Service {
                code: code.map(code_text).unwrap_or_else(|| "none".to_string()),
                message: error_message(&response)
                    .unwrap_or_else(|| truncate(&reply.text, 200)),
            }),
        }
    }
}

/// Where the video generated from `image` is saved.
pub fn video_path_for(image: &Path, save_dir: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    save_dir.join(format!("{}{}", stem, VIDEO_SUFFIX))
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial download"),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => tracing::warn!(path = %path.display(), %error, "could not remove partial download"),
    }
}
