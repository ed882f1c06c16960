#![warn(missing_docs)]

//! Client for the generative-media service used by the desktop companion.
//!
//! Three flows are supported, all authenticated with
//! [`companion_signing`]:
//!
//! - **Avatar transform** ([`MediaClient::transform`]): one synchronous call
//!   that turns a pet photo into a stylised image.
//! - **Image-to-video** ([`MediaClient::generate_video`]): submit a job, poll
//!   until it is done, then stream the resulting MP4 to disk. Polling is
//!   bounded by a [`PollPolicy`] and can be aborted through a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken).
//! - **GIF conversion** ([`gif::convert`]): turn the MP4 into a GIF with
//!   `ffmpeg` so the pet window can play it.
//!
//! Responses from the service are loosely shaped; [`Payload`] locates the
//! generated media inside them.
//!
//! Optional features of the surrounding application are exposed through the
//! [`capability`] traits, which have an explicit [`Unavailable`]
//! implementation for when the service is not configured.
//!
//! # Example
//!
//! ```no_run
//! use companion_media::{Credentials, MediaClient, ServiceConfig};
//!
//! # async fn example() -> Result<(), companion_media::MediaError> {
//! let client = MediaClient::new(
//!     Credentials::new("AKEXAMPLE", "secret"),
//!     ServiceConfig::default(),
//! )?;
//!
//! let avatar = client
//!     .transform_file("pet.jpg".as_ref(), None)
//!     .await?;
//! std::fs::write("avatar.png", avatar).map_err(|e| companion_media::MediaError::file("avatar.png", e))?;
//! # Ok(())
//! # }
//! ```

mod client;
pub use client::*;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod extract;
pub use extract::*;

mod jobs;
pub use jobs::*;

mod transform;
pub use transform::*;

pub mod capability;
pub use capability::{Capabilities, Unavailable};

pub mod gif;
pub mod worker;

pub use companion_signing::Credentials;
