//! HTTP surface for the mediaforge transcoding and media-fetch services.

pub mod api;
pub mod metrics;
pub mod state;
