use std::{
    any::type_name,
    fmt::{self, Debug, Formatter},
};

use crate::config::FloatConversion;

/// * The full scale of the encoder's native input: floats in the range of a 16-bit integer.
pub const FULL_SCALE: f32 = 32768.0;

/// * Floats are clamped to `[-CLIP_LIMIT, CLIP_LIMIT]` when clipping is on.
pub const CLIP_LIMIT: f32 = 32768.0;

/// * The four numeric representations a caller can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Int16,
    Int32,
    Float32,
    Float64,
}

impl SampleKind {
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn from_channels(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(Self::Mono),
            2 => Some(Self::Stereo),
            _ => None,
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

/// * How one input sample becomes a native one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scaling {
    /// Integers: widening copy, no scaling.
    Widen,
    /// Floats: multiply by `factor`, then optionally hard clamp to the clip limit.
    Float { factor: f32, clip: bool },
}

impl Scaling {
    pub fn for_kind(kind: SampleKind, conversion: &FloatConversion) -> Self {
        let normalize = match kind {
            SampleKind::Int16 | SampleKind::Int32 => return Self::Widen,
            SampleKind::Float32 => conversion.normalize_float,
            SampleKind::Float64 => conversion.normalize_double,
        };
        Self::Float {
            factor: if normalize { FULL_SCALE } else { 1.0 },
            clip: conversion.clipping,
        }
    }
}

#[inline(always)]
fn clip(value: f32) -> f32 {
    if value > CLIP_LIMIT {
        CLIP_LIMIT
    } else if value < -CLIP_LIMIT {
        -CLIP_LIMIT
    } else {
        value
    }
}

/// * A sample type the writer accepts. Implemented for `i16`, `i32`, `f32` and `f64`.
pub trait InputSample: Debug + Sized + Clone + Copy + 'static {
    const KIND: SampleKind;
    fn to_native(self, scaling: Scaling) -> f32;
}

macro_rules! impl_input_sample_int {
    ($type:ty, $kind:expr) => {
        impl InputSample for $type {
            const KIND: SampleKind = $kind;
            #[inline(always)]
            fn to_native(self, _scaling: Scaling) -> f32 {
                self as f32
            }
        }
    };
}

impl_input_sample_int!(i16, SampleKind::Int16);
impl_input_sample_int!(i32, SampleKind::Int32);

impl InputSample for f32 {
    const KIND: SampleKind = SampleKind::Float32;
    #[inline(always)]
    fn to_native(self, scaling: Scaling) -> f32 {
        match scaling {
            Scaling::Widen => self,
            Scaling::Float { factor, clip: false } => self * factor,
            Scaling::Float { factor, clip: true } => clip(self * factor),
        }
    }
}

impl InputSample for f64 {
    const KIND: SampleKind = SampleKind::Float64;
    #[inline(always)]
    fn to_native(self, scaling: Scaling) -> f32 {
        match scaling {
            Scaling::Widen => self as f32,
            Scaling::Float { factor, clip: false } => (self * factor as f64) as f32,
            Scaling::Float { factor, clip: true } => clip((self * factor as f64) as f32),
        }
    }
}

type ConvertFn<S> = fn(&[S], Scaling, &mut [f32], &mut [f32]) -> usize;

fn convert_mono<S: InputSample>(input: &[S], scaling: Scaling, left: &mut [f32], _right: &mut [f32]) -> usize {
    let frames = input.len().min(left.len());
    for (dst, src) in left[..frames].iter_mut().zip(&input[..frames]) {
        *dst = src.to_native(scaling);
    }
    frames
}

fn convert_stereo<S: InputSample>(input: &[S], scaling: Scaling, left: &mut [f32], right: &mut [f32]) -> usize {
    let frames = (input.len() / 2).min(left.len()).min(right.len());
    for ((l, r), frame) in left[..frames]
        .iter_mut()
        .zip(right[..frames].iter_mut())
        .zip(input[..frames * 2].chunks_exact(2))
    {
        *l = frame[0].to_native(scaling);
        *r = frame[1].to_native(scaling);
    }
    frames
}

/// * Converts interleaved input of one sample type into the encoder's per-channel native arrays.
/// * The mono/stereo path and the scaling are chosen once, when the converter is created at the start of a write.
#[derive(Clone, Copy)]
pub struct SampleConverter<S>
where
    S: InputSample,
{
    layout: ChannelLayout,
    scaling: Scaling,
    convert: ConvertFn<S>,
}

impl<S> SampleConverter<S>
where
    S: InputSample,
{
    pub fn new(layout: ChannelLayout, conversion: &FloatConversion) -> Self {
        Self {
            layout,
            scaling: Scaling::for_kind(S::KIND, conversion),
            convert: match layout {
                ChannelLayout::Mono => convert_mono::<S>,
                ChannelLayout::Stereo => convert_stereo::<S>,
            },
        }
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn scaling(&self) -> Scaling {
        self.scaling
    }

    /// * Converts as many whole frames as both the input and the output arrays can hold.
    /// * Reads at most `frames * channels` input elements. `right` is untouched for mono.
    /// * Returns the number of frames converted.
    pub fn convert(&self, input: &[S], left: &mut [f32], right: &mut [f32]) -> usize {
        (self.convert)(input, self.scaling, left, right)
    }
}

impl<S> Debug for SampleConverter<S>
where
    S: InputSample,
{
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.debug_struct(&format!("SampleConverter<{}>", type_name::<S>()))
            .field("layout", &self.layout)
            .field("scaling", &self.scaling)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversion(normalize: bool, clipping: bool) -> FloatConversion {
        FloatConversion {
            normalize_float: normalize,
            normalize_double: normalize,
            clipping,
        }
    }

    #[test]
    fn integers_are_copied_without_scaling() {
        let conv = SampleConverter::<i16>::new(ChannelLayout::Mono, &conversion(true, true));
        let mut left = [0.0f32; 4];
        let mut right: [f32; 0] = [];
        assert_eq!(conv.convert(&[i16::MIN, -1, 0, i16::MAX], &mut left, &mut right), 4);
        assert_eq!(left, [-32768.0, -1.0, 0.0, 32767.0]);

        let conv = SampleConverter::<i32>::new(ChannelLayout::Mono, &conversion(true, true));
        let mut left = [0.0f32; 2];
        conv.convert(&[100_000, -7], &mut left, &mut []);
        assert_eq!(left, [100_000.0, -7.0]);
    }

    #[test]
    fn stereo_is_deinterleaved() {
        let conv = SampleConverter::<i16>::new(ChannelLayout::Stereo, &conversion(true, true));
        let mut left = [0.0f32; 3];
        let mut right = [0.0f32; 3];
        assert_eq!(conv.convert(&[1, -1, 2, -2, 3, -3], &mut left, &mut right), 3);
        assert_eq!(left, [1.0, 2.0, 3.0]);
        assert_eq!(right, [-1.0, -2.0, -3.0]);
    }

    #[test]
    fn floats_are_normalized_on_request() {
        let conv = SampleConverter::<f32>::new(ChannelLayout::Mono, &conversion(true, true));
        let mut left = [0.0f32; 2];
        conv.convert(&[0.5, -0.25], &mut left, &mut []);
        assert_eq!(left, [16384.0, -8192.0]);

        let conv = SampleConverter::<f64>::new(ChannelLayout::Mono, &conversion(false, true));
        conv.convert(&[1234.0, -5.5], &mut left, &mut []);
        assert_eq!(left, [1234.0, -5.5]);
    }

    #[test]
    fn clipping_clamps_to_the_limit_with_sign() {
        let mut left = [0.0f32; 3];
        let mut right = [0.0f32; 3];

        let conv = SampleConverter::<f32>::new(ChannelLayout::Mono, &conversion(true, true));
        conv.convert(&[1.5, -3.0, 1.0], &mut left, &mut right);
        assert_eq!(left, [CLIP_LIMIT, -CLIP_LIMIT, 32768.0]);

        let conv = SampleConverter::<f64>::new(ChannelLayout::Stereo, &conversion(true, true));
        conv.convert(&[1.5, -1.5, 0.5, 2.0, -9.0, 0.0], &mut left, &mut right);
        assert_eq!(left, [CLIP_LIMIT, 16384.0, -CLIP_LIMIT]);
        assert_eq!(right, [-CLIP_LIMIT, CLIP_LIMIT, 0.0]);

        let conv = SampleConverter::<f64>::new(ChannelLayout::Stereo, &conversion(false, true));
        conv.convert(&[40000.0, -40000.0], &mut left[..1], &mut right[..1]);
        assert_eq!((left[0], right[0]), (CLIP_LIMIT, -CLIP_LIMIT));
    }

    #[test]
    fn no_clipping_lets_values_through() {
        let conv = SampleConverter::<f32>::new(ChannelLayout::Mono, &conversion(true, false));
        let mut left = [0.0f32; 1];
        conv.convert(&[1.5], &mut left, &mut []);
        assert_eq!(left[0], 49152.0);
    }

    #[test]
    fn never_reads_past_the_frames_that_fit() {
        let conv = SampleConverter::<i16>::new(ChannelLayout::Stereo, &conversion(true, true));
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];
        // Five whole frames and a dangling sample, only two frames of room.
        let input = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
        assert_eq!(conv.convert(&input, &mut left, &mut right), 2);
        assert_eq!(left, [1.0, 3.0]);
        assert_eq!(right, [2.0, 4.0]);

        let mut left = [0.0f32; 8];
        let mut right = [0.0f32; 8];
        assert_eq!(conv.convert(&input, &mut left, &mut right), 5);
        assert_eq!(right[4], 10.0);
        assert_eq!(right[5], 0.0);
    }

    #[test]
    fn scaling_is_chosen_per_kind() {
        let c = FloatConversion { normalize_float: true, normalize_double: false, clipping: false };
        assert_eq!(Scaling::for_kind(SampleKind::Int16, &c), Scaling::Widen);
        assert_eq!(Scaling::for_kind(SampleKind::Int32, &c), Scaling::Widen);
        assert_eq!(Scaling::for_kind(SampleKind::Float32, &c), Scaling::Float { factor: FULL_SCALE, clip: false });
        assert_eq!(Scaling::for_kind(SampleKind::Float64, &c), Scaling::Float { factor: 1.0, clip: false });
    }
}
