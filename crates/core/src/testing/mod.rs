//! Test doubles shared by unit and integration tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediaforge_core::testing::{MockBehavior, MockCodec};
//!
//! let codec = Arc::new(MockCodec::new(vec![
//!     MockBehavior::Panic,
//!     MockBehavior::Succeed(b"ok".to_vec()),
//! ]));
//! let codecs = CodecRegistry::empty().with(OperationKind::RasterImage, codec.clone());
//! ```

mod mock_codec;
mod recording_sink;
mod static_resolver;

pub use mock_codec::{MockBehavior, MockCodec};
pub use recording_sink::RecordingSink;
pub use static_resolver::StaticResolver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    /// A `width` x `height` PNG with a colour gradient.
    pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                128,
                255,
            ])
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)
            .expect("PNG encoding of an in-memory image");
        out.into_inner()
    }

    /// A small CSV table with a quoted field.
    pub fn csv_fixture() -> &'static str {
        "name,plays\n\"Doe, Jane\",12\nRoe,3\n"
    }
}
