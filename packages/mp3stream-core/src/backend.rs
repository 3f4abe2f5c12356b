use std::fmt::{self, Debug, Display, Formatter};

use crate::config::{BitrateMode, CompressionSetting, MpegVersion, DEFAULT_ALGORITHM_QUALITY};
use crate::errors::BackendError;
use crate::tags::StreamTags;

/// * How many MPEG frames of samples one encode call may take.
pub const FRAMES_PER_CALL: usize = 4;

/// * Everything the encoder library is told before its parameters are locked in.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderParams {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate_mode: BitrateMode,
    pub compression: Option<CompressionSetting>,
    pub algorithm_quality: u8,

    /// * Whether the encoder should leave room for the summary header (Xing/LAME info frame) at the start of the stream.
    pub write_summary_header: bool,

    pub tags: StreamTags,
}

impl EncoderParams {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bitrate_mode: BitrateMode::Variable,
            compression: None,
            algorithm_quality: DEFAULT_ALGORITHM_QUALITY,
            write_summary_header: true,
            tags: StreamTags::default(),
        }
    }

    pub fn mpeg_version(&self) -> MpegVersion {
        MpegVersion::from_sample_rate(self.sample_rate)
    }
}

/// * What one encode call can take and give back, only known after the parameters are locked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCapacity {
    /// * Maximum samples per channel in one encode call
    pub max_samples: usize,

    /// * Worst-case bytes one encode or flush call can produce
    pub max_output_bytes: usize,
}

impl FrameCapacity {
    /// * LAME's documented worst case: `1.25 * samples + 7200` bytes.
    pub fn worst_case_output(samples: usize) -> usize {
        samples + samples.div_ceil(4) + 7200
    }

    pub fn for_version(version: MpegVersion) -> Self {
        let max_samples = version.frame_size() * FRAMES_PER_CALL;
        Self {
            max_samples,
            max_output_bytes: Self::worst_case_output(max_samples),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Mono,
    Stereo,
    JointStereo,
}

impl Display for ChannelMode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Mono => write!(f, "mono"),
            Self::Stereo => write!(f, "stereo"),
            Self::JointStereo => write!(f, "joint-stereo"),
        }
    }
}

/// * A summary of the locked-in encoder, for the log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncoderInfo {
    pub version: MpegVersion,
    pub sample_rate: u32,
    pub channel_mode: ChannelMode,
    pub bitrate_mode: BitrateMode,
    pub bitrate_kbps: Option<u32>,
    pub vbr_quality: Option<f32>,
    pub encoder_delay: Option<u32>,
    pub writes_summary_header: bool,
}

/// * The narrow call contract of the external MP3 encoder.
/// * Native samples are `f32` in the range of a 16-bit integer, one array per channel.
/// * The bitstream is opaque here: the writer only routes the bytes.
pub trait EncoderBackend: Debug {
    /// * Hands over the stream parameters.
    /// * Called again when a construction failed after `lock_parameters()` succeeded: whatever that lock built is dropped and the new parameters replace it.
    fn configure(&mut self, params: &EncoderParams) -> Result<(), BackendError>;

    /// * Locks in the parameters and reports the per-call capacity.
    fn lock_parameters(&mut self) -> Result<FrameCapacity, BackendError>;

    /// * Only meaningful after `lock_parameters()`.
    fn info(&self) -> EncoderInfo;

    /// * Encodes `left.len()` samples per channel into `out`, returns the bytes produced, which can be zero while the encoder fills its own frame.
    /// * `right` is `None` for mono.
    fn encode(&mut self, left: &[f32], right: Option<&[f32]>, out: &mut [u8]) -> Result<usize, BackendError>;

    /// * Drains the samples the encoder is still holding.
    fn flush(&mut self, out: &mut [u8]) -> Result<usize, BackendError>;

    /// * Size of the whole-stream summary header, `0` if there's none.
    fn summary_header_len(&self) -> usize;

    /// * Fills `buffer` with the summary header, returns the bytes written.
    fn fetch_summary_header(&self, buffer: &mut [u8]) -> usize;

    /// * Size of the trailer to append after all compressed data, `0` if there's none.
    fn trailer_len(&self) -> usize;

    fn fetch_trailer(&self, buffer: &mut [u8]) -> usize;
}

impl<B> EncoderBackend for Box<B>
where
    B: EncoderBackend + ?Sized,
{
    fn configure(&mut self, params: &EncoderParams) -> Result<(), BackendError> {(**self).configure(params)}
    fn lock_parameters(&mut self) -> Result<FrameCapacity, BackendError> {(**self).lock_parameters()}
    fn info(&self) -> EncoderInfo {(**self).info()}
    fn encode(&mut self, left: &[f32], right: Option<&[f32]>, out: &mut [u8]) -> Result<usize, BackendError> {(**self).encode(left, right, out)}
    fn flush(&mut self, out: &mut [u8]) -> Result<usize, BackendError> {(**self).flush(out)}
    fn summary_header_len(&self) -> usize {(**self).summary_header_len()}
    fn fetch_summary_header(&self, buffer: &mut [u8]) -> usize {(**self).fetch_summary_header(buffer)}
    fn trailer_len(&self) -> usize {(**self).trailer_len()}
    fn fetch_trailer(&self, buffer: &mut [u8]) -> usize {(**self).fetch_trailer(buffer)}
}

/// * The LAME backend
#[cfg(feature = "mp3enc")]
pub mod lame {
    use super::*;
    use crate::sampleconv::FULL_SCALE;
    use crate::tags::ID3V1_SIZE;

    use mp3lame_encoder::{Bitrate, Builder, DualPcm, Encoder, FlushNoGap, Mode, MonoPcm, Quality, VbrMode};

    const LAME_BITRATES: [(u32, Bitrate); 16] = [
        (8, Bitrate::Kbps8),
        (16, Bitrate::Kbps16),
        (24, Bitrate::Kbps24),
        (32, Bitrate::Kbps32),
        (40, Bitrate::Kbps40),
        (48, Bitrate::Kbps48),
        (64, Bitrate::Kbps64),
        (80, Bitrate::Kbps80),
        (96, Bitrate::Kbps96),
        (112, Bitrate::Kbps112),
        (128, Bitrate::Kbps128),
        (160, Bitrate::Kbps160),
        (192, Bitrate::Kbps192),
        (224, Bitrate::Kbps224),
        (256, Bitrate::Kbps256),
        (320, Bitrate::Kbps320),
    ];

    fn to_lame_quality(quality: u8) -> Quality {
        match quality {
            0 => Quality::Best,
            1 => Quality::SecondBest,
            2 => Quality::NearBest,
            3 => Quality::VeryNice,
            4 => Quality::Nice,
            5 => Quality::Good,
            6 => Quality::Decent,
            7 => Quality::Ok,
            8 => Quality::SecondWorst,
            _ => Quality::Worst,
        }
    }

    /// * The legal LAME bitrate nearest to `kbps` within the range of the MPEG version.
    pub fn snap_bitrate(kbps: u32, version: MpegVersion) -> (u32, Bitrate) {
        let (lowest, highest) = version.bitrate_range();
        let mut best = LAME_BITRATES[0];
        let mut best_distance = u32::MAX;
        for (rate, bitrate) in LAME_BITRATES.iter().copied() {
            if rate < lowest || rate > highest {
                continue;
            }
            let distance = rate.abs_diff(kbps);
            if distance < best_distance {
                best = (rate, bitrate);
                best_distance = distance;
            }
        }
        best
    }

    impl From<mp3lame_encoder::BuildError> for BackendError {
        fn from(err: mp3lame_encoder::BuildError) -> Self {
            #[allow(unreachable_patterns)]
            let code = match err {
                mp3lame_encoder::BuildError::Generic => Self::GENERIC,
                mp3lame_encoder::BuildError::NoMem => Self::NO_MEM,
                mp3lame_encoder::BuildError::BadBRate => Self::BAD_BITRATE,
                mp3lame_encoder::BuildError::BadSampleFreq => Self::BAD_SAMPLE_FREQ,
                mp3lame_encoder::BuildError::InternalError => Self::INTERNAL,
                mp3lame_encoder::BuildError::Other(c_int) => c_int as i32,
                _ => Self::GENERIC,
            };
            Self::new(code, "lame_init_params")
        }
    }

    impl From<mp3lame_encoder::EncodeError> for BackendError {
        fn from(err: mp3lame_encoder::EncodeError) -> Self {
            #[allow(unreachable_patterns)]
            let code = match err {
                mp3lame_encoder::EncodeError::BufferTooSmall => Self::BUFFER_TOO_SMALL,
                mp3lame_encoder::EncodeError::NoMem => Self::NO_MEM,
                mp3lame_encoder::EncodeError::InvalidState => Self::INTERNAL,
                mp3lame_encoder::EncodeError::PsychoAcoustic => Self::PSYCHO_ACOUSTIC,
                mp3lame_encoder::EncodeError::Other(c_int) => c_int as i32,
                _ => Self::GENERIC,
            };
            Self::new(code, "lame_encode_buffer_ieee_float")
        }
    }

    /// * `EncoderBackend` over `mp3lame-encoder`.
    /// * The crate gives no access to LAME's Xing/Info frame, so that frame is switched off and the summary header is always empty.
    /// * The ID3v1 trailer is packed from the tags passed in `EncoderParams`.
    pub struct LameBackend {
        params: Option<EncoderParams>,
        encoder: Option<Encoder>,
        info: Option<EncoderInfo>,
        trailer: Option<[u8; ID3V1_SIZE]>,
        pcm_l: Vec<f32>,
        pcm_r: Vec<f32>,
        staging: Vec<u8>,
    }

    impl LameBackend {
        pub fn new() -> Self {
            Self {
                params: None,
                encoder: None,
                info: None,
                trailer: None,
                pcm_l: Vec::new(),
                pcm_r: Vec::new(),
                staging: Vec::new(),
            }
        }

        fn build(params: &EncoderParams) -> Result<(Encoder, EncoderInfo), BackendError> {
            let mut builder = match Builder::new() {
                Some(builder) => builder,
                None => return Err(BackendError::new(BackendError::NO_MEM, "lame_init")),
            };
            let version = params.mpeg_version();
            let channel_mode = match params.channels {
                1 => ChannelMode::Mono,
                _ => ChannelMode::JointStereo,
            };

            builder.set_num_channels(params.channels as u8)?;
            builder.set_sample_rate(params.sample_rate)?;
            builder.set_mode(match channel_mode {
                ChannelMode::Mono => Mode::Mono,
                ChannelMode::Stereo => Mode::Stereo,
                ChannelMode::JointStereo => Mode::JointStereo,
            })?;
            builder.set_quality(to_lame_quality(params.algorithm_quality))?;
            builder.set_to_write_vbr_tag(false)?;

            let mut bitrate_kbps = None;
            let mut vbr_quality = None;
            match params.bitrate_mode {
                BitrateMode::Constant => {
                    builder.set_vbr_mode(VbrMode::Off)?;
                    if let Some(CompressionSetting::Bitrate(kbps)) = params.compression {
                        let (rate, bitrate) = snap_bitrate(kbps, version);
                        builder.set_brate(bitrate)?;
                        bitrate_kbps = Some(rate);
                    }
                }
                BitrateMode::Variable => {
                    builder.set_vbr_mode(VbrMode::Mt)?;
                    if let Some(CompressionSetting::VbrQuality(quality)) = params.compression {
                        let step = quality.round().clamp(0.0, 9.0) as u8;
                        builder.set_vbr_quality(to_lame_quality(step))?;
                        vbr_quality = Some(step as f32);
                    }
                }
            }

            let encoder = builder.build()?;
            Ok((
                encoder,
                EncoderInfo {
                    version,
                    sample_rate: params.sample_rate,
                    channel_mode,
                    bitrate_mode: params.bitrate_mode,
                    bitrate_kbps,
                    vbr_quality,
                    encoder_delay: None,
                    writes_summary_header: false,
                },
            ))
        }

        fn renormalize(native: &[f32], buffer: &mut Vec<f32>) {
            buffer.clear();
            buffer.extend(native.iter().map(|s| s / FULL_SCALE));
        }

        fn take_staged(&mut self, out: &mut [u8], produced: usize) -> Result<usize, BackendError> {
            if produced > out.len() {
                return Err(BackendError::new(BackendError::BUFFER_TOO_SMALL, "lame_encode_buffer_ieee_float"));
            }
            out[..produced].copy_from_slice(&self.staging[..produced]);
            Ok(produced)
        }
    }

    impl Default for LameBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    impl EncoderBackend for LameBackend {
        fn configure(&mut self, params: &EncoderParams) -> Result<(), BackendError> {
            self.encoder = None;
            self.info = None;
            self.trailer = params.tags.to_id3v1();
            self.params = Some(params.clone());
            Ok(())
        }

        fn lock_parameters(&mut self) -> Result<FrameCapacity, BackendError> {
            let params = match &self.params {
                Some(params) => params,
                None => return Err(BackendError::new(BackendError::INTERNAL, "lame_init_params")),
            };
            let (encoder, info) = Self::build(params)?;
            let max_samples = info.version.frame_size() * FRAMES_PER_CALL;
            self.encoder = Some(encoder);
            self.info = Some(info);
            Ok(FrameCapacity {
                max_samples,
                max_output_bytes: mp3lame_encoder::max_required_buffer_size(max_samples),
            })
        }

        fn info(&self) -> EncoderInfo {
            match (self.info, &self.params) {
                (Some(info), _) => info,
                (None, params) => {
                    let params = params.clone().unwrap_or_else(|| EncoderParams::new(44100, 2));
                    EncoderInfo {
                        version: params.mpeg_version(),
                        sample_rate: params.sample_rate,
                        channel_mode: if params.channels == 1 {ChannelMode::Mono} else {ChannelMode::JointStereo},
                        bitrate_mode: params.bitrate_mode,
                        bitrate_kbps: None,
                        vbr_quality: None,
                        encoder_delay: None,
                        writes_summary_header: false,
                    }
                }
            }
        }

        fn encode(&mut self, left: &[f32], right: Option<&[f32]>, out: &mut [u8]) -> Result<usize, BackendError> {
            let encoder = match self.encoder.as_mut() {
                Some(encoder) => encoder,
                None => return Err(BackendError::new(BackendError::INTERNAL, "lame_encode_buffer_ieee_float")),
            };
            Self::renormalize(left, &mut self.pcm_l);
            self.staging.clear();
            self.staging.reserve(out.len());
            let produced = match right {
                None => encoder.encode_to_vec(MonoPcm(&self.pcm_l), &mut self.staging)?,
                Some(right) => {
                    Self::renormalize(right, &mut self.pcm_r);
                    encoder.encode_to_vec(
                        DualPcm {
                            left: &self.pcm_l,
                            right: &self.pcm_r,
                        },
                        &mut self.staging,
                    )?
                }
            };
            self.take_staged(out, produced)
        }

        fn flush(&mut self, out: &mut [u8]) -> Result<usize, BackendError> {
            let encoder = match self.encoder.as_mut() {
                Some(encoder) => encoder,
                None => return Ok(0),
            };
            self.staging.clear();
            self.staging.reserve(out.len());
            let produced = encoder
                .flush_to_vec::<FlushNoGap>(&mut self.staging)
                .map_err(|err| BackendError::new(BackendError::from(err).code, "lame_encode_flush"))?;
            self.take_staged(out, produced)
        }

        fn summary_header_len(&self) -> usize {
            0
        }

        fn fetch_summary_header(&self, _buffer: &mut [u8]) -> usize {
            0
        }

        fn trailer_len(&self) -> usize {
            match self.trailer {
                Some(_) if self.encoder.is_some() => ID3V1_SIZE,
                _ => 0,
            }
        }

        fn fetch_trailer(&self, buffer: &mut [u8]) -> usize {
            match &self.trailer {
                Some(trailer) if buffer.len() >= ID3V1_SIZE => {
                    buffer[..ID3V1_SIZE].copy_from_slice(trailer);
                    ID3V1_SIZE
                }
                _ => 0,
            }
        }
    }

    impl Debug for LameBackend {
        fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
            fmt.debug_struct("LameBackend")
                .field("params", &self.params)
                .field("constructed", &self.encoder.is_some())
                .field("info", &self.info)
                .finish_non_exhaustive()
        }
    }

}
