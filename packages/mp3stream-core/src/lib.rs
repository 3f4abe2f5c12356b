mod session;

/// * Errors returned from most of the functions in this library.
pub mod errors;

/// * Turns `i16`, `i32`, `f32` and `f64` input into the encoder's native per-channel arrays.
pub mod sampleconv;

/// * The shape of the stream and the compression settings.
pub mod config;

/// * ID3 metadata for the stream header and trailer.
pub mod tags;

/// * Where the compressed bytes go.
pub mod sink;

/// * The boundary to the MP3 encoder library, and the LAME implementation of it.
pub mod backend;

/// * The MP3 stream writer
pub mod writer;

pub use backend::{EncoderBackend, EncoderInfo, EncoderParams, FrameCapacity};
pub use config::{BitrateMode, FloatConversion, MpegVersion, StreamConfig};
pub use errors::{BackendError, IOErrorInfo, Mp3WriteError};
pub use sampleconv::{ChannelLayout, InputSample, SampleConverter, SampleKind};
pub use session::EncoderSession;
pub use sink::{SeekableSink, SharedSink, Sink, StreamSink};
pub use tags::{StreamTags, TagKind};
pub use writer::{FinalizeReport, HeaderReservation, Mp3Writer, StreamLifecycle};

#[cfg(feature = "mp3enc")]
pub use backend::lame::LameBackend;
