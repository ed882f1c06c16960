//! MP4 to GIF conversion with `ffmpeg`.
//!
//! The pet window plays GIFs rather than video. Conversion uses a single
//! `ffmpeg` run with a generated palette, which keeps colours clean at small
//! sizes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::MediaError;

/// Settings for [`convert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifOptions {
    /// Output frame rate
    pub fps: u32,
    /// Output width in pixels; height keeps the aspect ratio
    pub width: u32,
    /// Longest a conversion may run
    pub timeout: Duration,
    /// The `ffmpeg` executable
    pub ffmpeg: PathBuf,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            fps: 30,
            width: 320,
            timeout: Duration::from_secs(120),
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }
}

impl GifOptions {
    /// Set frame rate and width.
    pub fn with_size(mut self, fps: u32, width: u32) -> Self {
        self.fps = fps;
        self.width = width;
        self
    }

    /// Use a specific `ffmpeg` binary.
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    /// The `-vf` argument.
    pub fn filter_graph(&self) -> String {
        format!(
            "fps={},scale={}:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse",
            self.fps, self.width
        )
    }
}

/// `videos/rex_i2v.mp4` → `<gif_dir>/rex_i2v.gif`.
pub fn gif_path_for(video: &Path, gif_dir: &Path) -> PathBuf {
    let name = video.with_extension("gif");
    let name = name.file_name().unwrap_or(name.as_os_str());
    gif_dir.join(name)
}

/// Convert `video` into a GIF under `gif_dir` and return its path.
///
/// An existing GIF of the same name is overwritten. The GIF plays once.
pub async fn convert(
    video: &Path,
    gif_dir: &Path,
    options: &GifOptions,
) -> Result<PathBuf, MediaError> {
    if !tokio::fs::try_exists(video).await.unwrap_or(false) {
        return Err(MediaError::file(video, "video file does not exist"));
    }
    tokio::fs::create_dir_all(gif_dir)
        .await
        .map_err(|e| MediaError::file(gif_dir, e))?;

    let gif = gif_path_for(video, gif_dir);
    tracing::debug!(video = %video.display(), gif = %gif.display(), "converting to GIF");

    let child = Command::new(&options.ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(video)
        .arg("-vf")
        .arg(options.filter_graph())
        .args(["-loop", "-1"])
        .arg(&gif)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::Conversion(format!(
                "{} not found; install ffmpeg to enable GIF conversion",
                options.ffmpeg.display()
            )),
            _ => MediaError::Conversion(e.to_string()),
        })?;

    let output = tokio::time::timeout(options.timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            MediaError::Conversion(format!("timed out after {:?}", options.timeout))
        })?
        .map_err(|e| MediaError::Conversion(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).into_owned()
        } else {
            stderr.into_owned()
        };
        return Err(MediaError::Conversion(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            detail.trim()
        )));
    }
    if !tokio::fs::try_exists(&gif).await.unwrap_or(false) {
        return Err(MediaError::Conversion(format!(
            "ffmpeg did not produce {}",
            gif.display()
        )));
    }

    tracing::info!(gif = %gif.display(), "GIF ready");
    Ok(gif)
}
