//! * Streaming MP3 writer over LAME.
//! * Write `i16`, `i32`, `f32` or `f64` samples, mono or stereo, to any `Sink`, then close the stream to get the summary header patched in place.

#[doc(inline)]
pub use mp3stream_core::*;

/// * Conversion constants and the compression level mapping
pub mod utils {
    pub use mp3stream_core::config::{CompressionSetting, SUPPORTED_SAMPLE_RATES};
    pub use mp3stream_core::sampleconv::{CLIP_LIMIT, FULL_SCALE, Scaling};
    pub use mp3stream_core::tags::ID3V1_SIZE;
}
