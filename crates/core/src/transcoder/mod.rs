//! Server-side transcoding services.
//!
//! Each request is written into its own [`SandboxDirectory`](crate::sandbox::SandboxDirectory),
//! converted by an external binary selected from a validated recipe table,
//! and read back. The directory is removed on every exit path.
//!
//! - [`RasterTranscoder`]: ImageMagick, with an exiftool preview fallback
//!   for camera raw inputs
//! - [`MediaTranscoder`]: ffmpeg

mod config;
mod error;
mod media;
pub mod process;
mod raster;
mod recipe;
mod traits;

pub use config::TranscoderConfig;
pub use error::TranscodeError;
pub use media::MediaTranscoder;
pub use raster::RasterTranscoder;
pub use recipe::{QualityControl, Recipe, RecipeTable, TranscodeFamily};
pub use traits::{TranscodeOutput, TranscodeRequest, Transcoder};
