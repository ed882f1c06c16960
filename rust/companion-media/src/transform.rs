use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

use crate::client::{code_text, error_message, read_image, response_code};
use crate::{MediaClient, MediaError, Payload};

/// Action of the synchronous image-to-image endpoint.
pub const TRANSFORM_ACTION: &str = "CVProcess";
/// Model key of the avatar transform.
pub const TRANSFORM_REQ_KEY: &str = "jimeng_i2i_v30";
/// Prompt used when the caller does not supply one.
pub const DEFAULT_AVATAR_PROMPT: &str = "将这只宠物转换成可爱的卡通风格头像，保持宠物的主要特征，背景简洁";

#[derive(Serialize)]
struct TransformBody<'a> {
    req_key: &'a str,
    binary_data_base64: [String; 1],
    prompt: &'a str,
    seed: i64,
    scale: f64,
}

impl MediaClient {
    /// Transform an image into a stylised avatar.
    ///
    /// A single attempt is made; failures are reported, not retried.
    pub async fn transform(&self, image: &[u8], prompt: Option<&str>) -> Result<Vec<u8>, MediaError> {
        let prompt = prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_AVATAR_PROMPT);
        let body = TransformBody {
            req_key: TRANSFORM_REQ_KEY,
            binary_data_base64: [STANDARD.encode(image)],
            prompt,
            seed: -1,
            scale: 0.5,
        };

        let reply = self
            .post_action(TRANSFORM_ACTION, &body, self.config().transform_timeout())
            .await?;

        if !reply.is_ok() {
            let error = reply.status_error();
            tracing::warn!(%error, "avatar transform rejected");
            return Err(error);
        }

        let response = reply.json()?;
        if let Some(code) = response_code(&response) {
            if !self.config().transform_success.accepts(code) {
                let message = error_message(&response)
                    .or_else(|| {
                        response
                            .pointer("/response/message")
                            .and_then(|m| m.as_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| crate::extract::summarize(&response));
                let error = MediaError::Service {
                    code: code_text(code),
                    message,
                };
                tracing::warn!(%error, "avatar transform failed");
                return Err(error);
            }
        }

        let payload = Payload::locate(&response);
        tracing::debug!(
            kind = match &payload {
                Payload::Inline(_) => "inline",
                Payload::Remote(_) => "remote",
                Payload::Unrecognized(_) => "unrecognized",
            },
            "located avatar payload"
        );

        let image = self.resolve(payload, &response).await?;
        tracing::info!(bytes = image.len(), "avatar generated");
        Ok(image)
    }

    /// Read `path` and [`transform`](Self::transform) it.
    ///
    /// Nothing is sent when the file cannot be read.
    pub async fn transform_file(
        &self,
        path: &Path,
        prompt: Option<&str>,
    ) -> Result<Vec<u8>, MediaError> {
        let image = read_image(path).await?;
        self.transform(&image, prompt).await
    }
}
