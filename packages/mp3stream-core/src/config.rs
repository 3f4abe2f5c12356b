use std::fmt::{self, Display, Formatter};

use crate::errors::Mp3WriteError;
use crate::sampleconv::ChannelLayout;

/// * The sample rates LAME can write without resampling.
pub const SUPPORTED_SAMPLE_RATES: [u32; 9] = [8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000];

/// * LAME's algorithm quality, `0` is the best and slowest, `9` the worst.
pub const DEFAULT_ALGORITHM_QUALITY: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitrateMode {
    Constant,
    Variable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

impl MpegVersion {
    pub fn from_sample_rate(sample_rate: u32) -> Self {
        match sample_rate {
            32000.. => Self::Mpeg1,
            16000.. => Self::Mpeg2,
            _ => Self::Mpeg25,
        }
    }

    /// * Samples per channel in one MPEG Layer III frame
    pub fn frame_size(&self) -> usize {
        match self {
            Self::Mpeg1 => 1152,
            Self::Mpeg2 | Self::Mpeg25 => 576,
        }
    }

    /// * The legal bitrate range in kbps
    pub fn bitrate_range(&self) -> (u32, u32) {
        match self {
            Self::Mpeg1 => (32, 320),
            Self::Mpeg2 | Self::Mpeg25 => (8, 160),
        }
    }
}

impl Display for MpegVersion {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Mpeg1 => write!(f, "MPEG-1"),
            Self::Mpeg2 => write!(f, "MPEG-2"),
            Self::Mpeg25 => write!(f, "MPEG-2.5"),
        }
    }
}

/// * How floating point input is brought to the native range.
/// * `clipping` selects the clamping conversion: out-of-range floats are hard clamped instead of passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatConversion {
    pub normalize_float: bool,
    pub normalize_double: bool,
    pub clipping: bool,
}

impl Default for FloatConversion {
    fn default() -> Self {
        Self {
            normalize_float: true,
            normalize_double: true,
            clipping: true,
        }
    }
}

/// * The shape of the stream. Fixed once the encoder is constructed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    pub channels: u16,
    pub sample_rate: u32,
    pub bitrate_mode: BitrateMode,

    /// * Whether the summary header can be patched at close. A writer clears it when its sink can't seek.
    pub seekable: bool,

    pub float_conversion: FloatConversion,
}

impl StreamConfig {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            bitrate_mode: BitrateMode::Variable,
            seekable: true,
            float_conversion: FloatConversion::default(),
        }
    }

    pub fn validate(&self) -> Result<(), Mp3WriteError> {
        if ChannelLayout::from_channels(self.channels).is_none() {
            return Err(Mp3WriteError::InvalidFormat(format!(
                "Invalid channels: {}. Only 1 and 2 are accepted.",
                self.channels
            )));
        }
        if !SUPPORTED_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(Mp3WriteError::InvalidFormat(format!(
                "Unsupported sample rate: {}. Must be one of {:?}.",
                self.sample_rate, SUPPORTED_SAMPLE_RATES
            )));
        }
        Ok(())
    }

    pub fn layout(&self) -> ChannelLayout {
        match self.channels {
            1 => ChannelLayout::Mono,
            _ => ChannelLayout::Stereo,
        }
    }

    pub fn mpeg_version(&self) -> MpegVersion {
        MpegVersion::from_sample_rate(self.sample_rate)
    }
}

/// * What a compression level resolves to for the current bitrate mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompressionSetting {
    /// CBR bitrate in kbps
    Bitrate(u32),
    /// VBR quality, `0.0` best to `10.0` worst
    VbrQuality(f32),
}

impl CompressionSetting {
    /// * Maps a compression level in `[0.0, 1.0]` (0 is the best quality) onto the encoder's own scale.
    /// * Returns `None` for a level out of range.
    pub fn from_level(level: f64, mode: BitrateMode, version: MpegVersion) -> Option<Self> {
        if !(0.0..=1.0).contains(&level) {
            return None;
        }
        Some(match mode {
            BitrateMode::Constant => match version {
                MpegVersion::Mpeg1 => Self::Bitrate((320.0 - level * 288.0) as u32),
                MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => Self::Bitrate((160.0 - level * 152.0) as u32),
            },
            BitrateMode::Variable => Self::VbrQuality((level * 10.0) as f32),
        })
    }
}
