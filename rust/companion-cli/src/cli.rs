use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use companion_media::gif::GifOptions;
use companion_media::{Credentials, PollPolicy, ServiceConfig, VideoRequest};

#[derive(Debug, Parser)]
#[command(name = "companion")]
#[command(bin_name = "companion")]
#[command(about = "Generate avatars and animations for the desktop pet", long_about = None)]
pub struct CompanionCli {
    #[command(flatten)]
    pub service: ServiceArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct ServiceArgs {
    /// Access key of the media service
    #[arg(long, env = "JIMENG_ACCESS_KEY", global = true, hide_env_values = true)]
    pub access_key: Option<String>,

    /// Secret key of the media service
    #[arg(long, env = "JIMENG_SECRET_KEY", global = true, hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Override the service URL
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Save unrecognized service responses here
    #[arg(long, global = true)]
    pub diagnostics_dir: Option<PathBuf>,
}

impl ServiceArgs {
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.access_key, &self.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                Some(Credentials::new(access_key, secret_key)).filter(Credentials::is_complete)
            }
            _ => None,
        }
    }

    pub fn config(&self) -> ServiceConfig {
        let config = match &self.endpoint {
            Some(endpoint) => ServiceConfig::new(endpoint),
            None => ServiceConfig::default(),
        };
        match &self.diagnostics_dir {
            Some(dir) => config.with_diagnostics_dir(dir),
            None => config,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Turn a pet photo into a cartoon avatar
    Avatar {
        /// The photo
        image: PathBuf,

        /// Where to write the avatar
        #[arg(short, long)]
        output: PathBuf,

        /// Replace the default style prompt
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Animate a still image into a short video
    Video {
        /// The still image, used as first and last frame
        image: PathBuf,

        /// Directory the video is saved in
        #[arg(long)]
        save_dir: PathBuf,

        /// Motion prompt
        #[arg(long, default_value = companion_media::DEFAULT_VIDEO_PROMPT)]
        prompt: String,

        /// Random seed, -1 picks one
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        seed: i64,

        /// Number of frames
        #[arg(long, default_value_t = companion_media::DEFAULT_FRAMES)]
        frames: u32,

        /// Seconds between result queries
        #[arg(long, default_value_t = 5)]
        poll_interval: u64,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 900)]
        max_wait: u64,

        /// Also convert the video to a GIF in this directory
        #[arg(long)]
        gif_dir: Option<PathBuf>,
    },

    /// Convert a video into a GIF for the pet window
    Gif {
        /// The MP4 to convert
        video: PathBuf,

        /// Directory the GIF is written to
        #[arg(long)]
        gif_dir: PathBuf,

        #[command(flatten)]
        gif: GifArgs,
    },
}

#[derive(Debug, Args)]
pub struct GifArgs {
    /// Frame rate of the GIF
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Width of the GIF in pixels
    #[arg(long, default_value_t = 320)]
    pub width: u32,
}

impl GifArgs {
    pub fn options(&self) -> GifOptions {
        GifOptions::default().with_size(self.fps, self.width)
    }
}

pub fn video_request(prompt: &str, seed: i64, frames: u32) -> VideoRequest {
    VideoRequest {
        prompt: prompt.to_string(),
        seed,
        frames,
    }
}

pub fn poll_policy(poll_interval: u64, max_wait: u64) -> PollPolicy {
    PollPolicy::default()
        .with_interval(Duration::from_secs(poll_interval))
        .with_max_wait(Duration::from_secs(max_wait))
}
