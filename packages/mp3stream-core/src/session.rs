use std::mem;

use tracing::{debug, error, info};

use crate::backend::{EncoderBackend, EncoderInfo, EncoderParams, FrameCapacity};
use crate::config::{BitrateMode, CompressionSetting, DEFAULT_ALGORITHM_QUALITY, FloatConversion, StreamConfig};
use crate::errors::{BackendError, Mp3WriteError};
use crate::sampleconv::{ChannelLayout, InputSample, SampleConverter};
use crate::tags::StreamTags;

/// * The encoder before the first write: the backend has not seen any parameters yet, so every setting can still change.
#[derive(Debug)]
struct ConfiguredEncoder<B>
where
    B: EncoderBackend,
{
    backend: B,
    compression_level: Option<f64>,
}

/// * The encoder after the parameters are locked in.
/// * The scratch buffer and the native channel arrays are allocated once here and reused by every write.
#[derive(Debug)]
struct ConstructedEncoder<B>
where
    B: EncoderBackend,
{
    backend: B,
    capacity: FrameCapacity,
    info: EncoderInfo,
    scratch: Vec<u8>,
    pcm_l: Vec<f32>,
    pcm_r: Vec<f32>,
}

#[derive(Debug)]
enum SessionState<B>
where
    B: EncoderBackend,
{
    Configured(ConfiguredEncoder<B>),
    Constructed(ConstructedEncoder<B>),
    Closed,
}

fn allocate<T: Clone + Default>(len: usize, what: &str) -> Result<Vec<T>, Mp3WriteError> {
    let mut buffer = Vec::<T>::new();
    if let Err(err) = buffer.try_reserve_exact(len) {
        return Err(Mp3WriteError::AllocationFailure(format!("{what} of {len} elements: {err}")));
    }
    buffer.resize(len, T::default());
    Ok(buffer)
}

/// * Owns the encoder backend through its lifecycle: `Configured` until the first write, `Constructed` until close, then `Closed`.
/// * Settings that the backend locks in are only accepted while `Configured`.
#[derive(Debug)]
pub struct EncoderSession<B>
where
    B: EncoderBackend,
{
    config: StreamConfig,
    tags: StreamTags,
    state: SessionState<B>,
}

impl<B> EncoderSession<B>
where
    B: EncoderBackend,
{
    /// * Validates the channel count and the sample rate. Nothing is allocated until `ensure_constructed()`.
    pub fn configure(config: StreamConfig, backend: B) -> Result<Self, Mp3WriteError> {
        config.validate()?;
        Ok(Self {
            config,
            tags: StreamTags::default(),
            state: SessionState::Configured(ConfiguredEncoder {
                backend,
                compression_level: None,
            }),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn tags(&self) -> &StreamTags {
        &self.tags
    }

    /// * The tags can only change before construction, since the backend takes them with the other parameters.
    pub fn tags_mut(&mut self) -> Option<&mut StreamTags> {
        match self.state {
            SessionState::Configured(_) => Some(&mut self.tags),
            _ => None,
        }
    }

    pub fn is_constructed(&self) -> bool {
        matches!(self.state, SessionState::Constructed(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    pub fn capacity(&self) -> Option<FrameCapacity> {
        match &self.state {
            SessionState::Constructed(constructed) => Some(constructed.capacity),
            _ => None,
        }
    }

    pub fn info(&self) -> Option<EncoderInfo> {
        match &self.state {
            SessionState::Constructed(constructed) => Some(constructed.info),
            _ => None,
        }
    }

    /// * Takes a compression level in `[0.0, 1.0]`, `0.0` being the best quality.
    /// * Returns `false` and changes nothing after construction or for a level out of range.
    pub fn set_compression_level(&mut self, level: f64) -> bool {
        let configured = match &mut self.state {
            SessionState::Configured(configured) => configured,
            _ => return false,
        };
        if CompressionSetting::from_level(level, self.config.bitrate_mode, self.config.mpeg_version()).is_none() {
            return false;
        }
        configured.compression_level = Some(level);
        true
    }

    pub fn set_bitrate_mode(&mut self, mode: BitrateMode) -> bool {
        match self.state {
            SessionState::Configured(_) => {
                self.config.bitrate_mode = mode;
                true
            }
            _ => false,
        }
    }

    /// * The conversion of float input may change at any time before close.
    pub fn conversion_mut(&mut self) -> Option<&mut FloatConversion> {
        match self.state {
            SessionState::Closed => None,
            _ => Some(&mut self.config.float_conversion),
        }
    }

    /// * Bytes per second: the configured bitrate for CBR, the minimum legal bitrate for VBR.
    pub fn byterate(&self) -> u32 {
        if let SessionState::Constructed(constructed) = &self.state {
            if let Some(kbps) = constructed.info.bitrate_kbps {
                return kbps * 1000 / 8;
            }
        }
        let version = self.config.mpeg_version();
        let level = match &self.state {
            SessionState::Configured(configured) => configured.compression_level,
            _ => None,
        };
        let kbps = match (self.config.bitrate_mode, level) {
            (BitrateMode::Constant, Some(level)) => match CompressionSetting::from_level(level, BitrateMode::Constant, version) {
                Some(CompressionSetting::Bitrate(kbps)) => kbps,
                _ => 128,
            },
            (BitrateMode::Constant, None) => 128,
            (BitrateMode::Variable, _) => version.bitrate_range().0,
        };
        kbps * 1000 / 8
    }

    fn params(&self, compression_level: Option<f64>) -> EncoderParams {
        EncoderParams {
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            bitrate_mode: self.config.bitrate_mode,
            compression: compression_level.and_then(|level| {
                CompressionSetting::from_level(level, self.config.bitrate_mode, self.config.mpeg_version())
            }),
            algorithm_quality: DEFAULT_ALGORITHM_QUALITY,
            write_summary_header: self.config.seekable,
            tags: self.tags.clone(),
        }
    }

    /// * Locks the parameters in on the first call, then does nothing.
    /// * On failure the session stays `Configured`, so the next write tries again. The retry hands the backend its parameters from scratch, settings changed in between included.
    pub fn ensure_constructed(&mut self) -> Result<FrameCapacity, Mp3WriteError> {
        let compression_level = match &self.state {
            SessionState::Constructed(constructed) => return Ok(constructed.capacity),
            SessionState::Closed => return Err(Mp3WriteError::AlreadyFinished("the encoder session".to_owned())),
            SessionState::Configured(configured) => configured.compression_level,
        };
        let params = self.params(compression_level);
        let SessionState::Configured(configured) = &mut self.state else {
            return Err(Mp3WriteError::AlreadyFinished("the encoder session".to_owned()));
        };

        let locked = configured
            .backend
            .configure(&params)
            .and_then(|_| configured.backend.lock_parameters());
        let capacity = match locked {
            Ok(capacity) => capacity,
            Err(err) => {
                error!(code = err.code, function = err.function, "Failed to initialize the encoder: {err}");
                return Err(Mp3WriteError::ConstructionFailure(err.to_string()));
            }
        };
        let scratch = allocate::<u8>(capacity.max_output_bytes, "the scratch buffer")?;
        let pcm_l = allocate::<f32>(capacity.max_samples, "the left channel buffer")?;
        let pcm_r = match self.config.layout() {
            ChannelLayout::Mono => Vec::new(),
            ChannelLayout::Stereo => allocate::<f32>(capacity.max_samples, "the right channel buffer")?,
        };

        let SessionState::Configured(configured) = mem::replace(&mut self.state, SessionState::Closed) else {
            return Err(Mp3WriteError::AlreadyFinished("the encoder session".to_owned()));
        };
        let backend = configured.backend;
        let info = backend.info();
        info!(
            version = %info.version,
            sample_rate = info.sample_rate,
            channel_mode = %info.channel_mode,
            bitrate_mode = ?info.bitrate_mode,
            bitrate_kbps = ?info.bitrate_kbps,
            vbr_quality = ?info.vbr_quality,
            encoder_delay = ?info.encoder_delay,
            summary_header = info.writes_summary_header,
            max_samples = capacity.max_samples,
            "Initialized the encoder."
        );
        self.state = SessionState::Constructed(ConstructedEncoder {
            backend,
            capacity,
            info,
            scratch,
            pcm_l,
            pcm_r,
        });
        Ok(capacity)
    }

    /// * Converts one slice of interleaved input and encodes it.
    /// * `input` must not hold more frames than the capacity; the surplus is left unconverted.
    /// * Returns the frames consumed and the compressed bytes, which borrow the scratch buffer until the next call.
    pub fn encode_chunk<S>(&mut self, converter: &SampleConverter<S>, input: &[S]) -> Result<(usize, &[u8]), Mp3WriteError>
    where
        S: InputSample,
    {
        let constructed = match &mut self.state {
            SessionState::Constructed(constructed) => constructed,
            SessionState::Configured(_) => return Err(Mp3WriteError::EncodeFailure("The encoder is not constructed yet".to_owned())),
            SessionState::Closed => return Err(Mp3WriteError::AlreadyFinished("the encoder session".to_owned())),
        };
        let frames = converter.convert(input, &mut constructed.pcm_l, &mut constructed.pcm_r);
        let right = match converter.layout() {
            ChannelLayout::Mono => None,
            ChannelLayout::Stereo => Some(&constructed.pcm_r[..frames]),
        };
        match constructed.backend.encode(&constructed.pcm_l[..frames], right, &mut constructed.scratch) {
            Ok(produced) => match constructed.scratch.get(..produced) {
                Some(bytes) => Ok((frames, bytes)),
                None => Err(Self::overrun(produced, constructed.scratch.len())),
            },
            Err(err) => Err(Self::encode_failure(err)),
        }
    }

    fn encode_failure(err: BackendError) -> Mp3WriteError {
        error!(code = err.code, function = err.function, "Encoder error: {err}");
        Mp3WriteError::EncodeFailure(err.to_string())
    }

    fn overrun(produced: usize, capacity: usize) -> Mp3WriteError {
        error!(produced, capacity, "The encoder reported more bytes than the scratch buffer holds.");
        Mp3WriteError::EncodeFailure(format!("{produced} bytes reported for a buffer of {capacity}"))
    }

    /// * Drains what the encoder still holds. Nothing to drain on a session that never got constructed.
    pub fn flush(&mut self) -> Result<&[u8], Mp3WriteError> {
        match &mut self.state {
            SessionState::Constructed(constructed) => match constructed.backend.flush(&mut constructed.scratch) {
                Ok(produced) => match constructed.scratch.get(..produced) {
                    Some(bytes) => Ok(bytes),
                    None => Err(Self::overrun(produced, constructed.scratch.len())),
                },
                Err(err) => Err(Self::encode_failure(err)),
            },
            _ => Ok(&[]),
        }
    }

    /// * The trailer, in a buffer of exactly its size. `None` if the encoder has no trailer.
    pub fn trailer(&self) -> Result<Option<Vec<u8>>, Mp3WriteError> {
        match &self.state {
            SessionState::Constructed(constructed) => {
                let len = constructed.backend.trailer_len();
                if len == 0 {
                    return Ok(None);
                }
                let mut buffer = allocate::<u8>(len, "the trailer buffer")?;
                let fetched = constructed.backend.fetch_trailer(&mut buffer);
                buffer.truncate(fetched);
                Ok(Some(buffer))
            }
            _ => Ok(None),
        }
    }

    /// * The whole-stream summary header, in a buffer of exactly its size. `None` if the encoder writes none.
    pub fn summary_header(&self) -> Result<Option<Vec<u8>>, Mp3WriteError> {
        match &self.state {
            SessionState::Constructed(constructed) => {
                let len = constructed.backend.summary_header_len();
                if len == 0 {
                    return Ok(None);
                }
                let mut buffer = allocate::<u8>(len, "the summary header buffer")?;
                let fetched = constructed.backend.fetch_summary_header(&mut buffer);
                buffer.truncate(fetched);
                Ok(Some(buffer))
            }
            _ => Ok(None),
        }
    }

    /// * Releases the backend and every buffer. Safe to call on a session that never got constructed, and more than once.
    pub fn close(&mut self) {
        match mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Closed => (),
            SessionState::Configured(_) => debug!("Closed an encoder session that was never constructed."),
            SessionState::Constructed(_) => debug!("Released the encoder."),
        }
    }
}
