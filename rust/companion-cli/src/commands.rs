use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use companion_media::capability::AvatarGenerator;
use companion_media::{Capabilities, MediaClient, MediaError, gif};
use tokio_util::sync::CancellationToken;

use crate::{Command, CompanionCli, ServiceArgs, poll_policy, video_request};

/// Run one command to completion, or until `cancel` fires.
///
/// Video generation watches `cancel` itself so it can clean up a partial
/// download; every other step is abandoned as soon as `cancel` fires.
pub async fn run(cli: CompanionCli, cancel: CancellationToken) -> Result<()> {
    match cli.command {
        Command::Avatar {
            image,
            output,
            prompt,
        } => {
            let capabilities =
                Capabilities::from_config(&cli.service.config(), cli.service.credentials());
            until_cancelled(
                &cancel,
                "avatar generation",
                avatar(
                    capabilities.avatar.as_ref(),
                    &image,
                    &output,
                    prompt.as_deref(),
                ),
            )
            .await
        }
        Command::Video {
            image,
            save_dir,
            prompt,
            seed,
            frames,
            poll_interval,
            max_wait,
            gif_dir,
        } => {
            let client = client(&cli.service)?;
            let video = client
                .generate_video(
                    &image,
                    &save_dir,
                    &video_request(&prompt, seed, frames),
                    &poll_policy(poll_interval, max_wait),
                    cancel.clone(),
                )
                .await?;
            println!("{}", video.display());

            if let Some(gif_dir) = gif_dir {
                let options = gif::GifOptions::default();
                let converted = until_cancelled(&cancel, "GIF conversion", async {
                    Ok::<_, anyhow::Error>(gif::convert(&video, &gif_dir, &options).await?)
                })
                .await?;
                println!("{}", converted.display());
            }
            Ok(())
        }
        Command::Gif {
            video,
            gif_dir,
            gif: options,
        } => {
            let options = options.options();
            let converted = until_cancelled(&cancel, "GIF conversion", async {
                Ok::<_, anyhow::Error>(gif::convert(&video, &gif_dir, &options).await?)
            })
            .await?;
            println!("{}", converted.display());
            Ok(())
        }
    }
}

/// Drive `work` unless `cancel` fires first. Dropping `work` aborts any
/// request in flight and kills a running ffmpeg.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    operation: &str,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(MediaError::Cancelled { operation: operation.into() }.into()),
        result = work => result,
    }
}

async fn avatar(
    generator: &dyn AvatarGenerator,
    image: &Path,
    output: &Path,
    prompt: Option<&str>,
) -> Result<()> {
    let bytes = generator.generate_avatar(image, prompt).await?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::info!(path = %output.display(), bytes = bytes.len(), "avatar written");
    println!("{}", output.display());
    Ok(())
}

fn client(service: &ServiceArgs) -> Result<MediaClient> {
    let credentials = service.credentials().ok_or_else(|| {
        anyhow!("Missing credentials: set JIMENG_ACCESS_KEY and JIMENG_SECRET_KEY")
    })?;

    Ok(MediaClient::new(credentials, service.config())?)
}
