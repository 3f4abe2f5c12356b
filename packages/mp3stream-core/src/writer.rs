use std::io;

use tracing::{debug, error, info, warn};

use crate::backend::{EncoderBackend, FrameCapacity};
use crate::config::{BitrateMode, StreamConfig};
use crate::errors::Mp3WriteError;
use crate::sampleconv::{InputSample, SampleConverter};
use crate::session::EncoderSession;
use crate::sink::Sink;
use crate::tags::{StreamTags, TagKind};

/// * The lifecycle of the stream. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLifecycle {
    /// Nothing written yet, every setting can still change.
    Open,
    Writing,
    Closing,
    Closed,
}

/// * Where the summary header goes: the offset of the first compressed byte, recorded when the stream header is written.
/// * Only exists on a seekable sink, and is consumed exactly once at close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderReservation {
    pub offset: u64,
}

/// * What `close()` managed to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeReport {
    /// * Bytes the encoder flushed and the sink accepted
    pub flushed_bytes: usize,

    /// * Bytes of the trailer the sink accepted
    pub trailer_bytes: usize,

    /// * Whether the summary header was written over its reservation
    pub header_patched: bool,
}

/// * The MP3 stream writer
/// * Takes interleaved samples of any `InputSample` type, slices them to what one encode call can take, and forwards the compressed bytes to the sink in input order.
/// * The encoder is constructed on the first write, so `set_compression_level()` and friends work until then.
/// * `close()` flushes the encoder, appends the trailer and, when the sink can seek, writes the summary header back over its reservation.
#[derive(Debug)]
pub struct Mp3Writer<B, K>
where
    B: EncoderBackend,
    K: Sink,
{
    session: EncoderSession<B>,
    sink: K,
    lifecycle: StreamLifecycle,
    reservation: Option<HeaderReservation>,
    frames_written: u64,
    last_error: Option<Mp3WriteError>,
}

impl<B, K> Mp3Writer<B, K>
where
    B: EncoderBackend,
    K: Sink,
{
    /// * A sink that can't seek turns the summary header off right here, it's never found out at close.
    pub fn new(sink: K, mut config: StreamConfig, backend: B) -> Result<Self, Mp3WriteError> {
        config.seekable &= sink.is_seekable();
        if !config.seekable {
            debug!("The sink can't seek, no summary header will be written.");
        }
        Ok(Self {
            session: EncoderSession::configure(config, backend)?,
            sink,
            lifecycle: StreamLifecycle::Open,
            reservation: None,
            frames_written: 0,
            last_error: None,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        self.session.config()
    }

    pub fn tags(&self) -> &StreamTags {
        self.session.tags()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn lifecycle(&self) -> StreamLifecycle {
        self.lifecycle
    }

    pub fn is_constructed(&self) -> bool {
        self.session.is_constructed()
    }

    pub fn frame_capacity(&self) -> Option<FrameCapacity> {
        self.session.capacity()
    }

    pub fn reservation(&self) -> Option<HeaderReservation> {
        self.reservation
    }

    /// * Frames consumed so far, one sample per channel each
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn samples_written(&self) -> u64 {
        self.frames_written * self.config().channels as u64
    }

    /// * The encode failure that cut the last short write, if any.
    pub fn last_error(&self) -> Option<&Mp3WriteError> {
        self.last_error.as_ref()
    }

    pub fn byterate(&self) -> u32 {
        self.session.byterate()
    }

    pub fn set_compression_level(&mut self, level: f64) -> bool {
        self.session.set_compression_level(level)
    }

    pub fn set_bitrate_mode(&mut self, mode: BitrateMode) -> bool {
        self.session.set_bitrate_mode(mode)
    }

    /// * Tags go out with the stream header on the first write, so they can't change after it.
    pub fn set_tag(&mut self, kind: TagKind, value: &str) -> bool {
        if self.lifecycle != StreamLifecycle::Open {
            return false;
        }
        match self.session.tags_mut() {
            Some(tags) => {
                tags.set(kind, value);
                true
            }
            None => false,
        }
    }

    pub fn set_float_normalization(&mut self, normalize: bool) -> bool {
        match self.session.conversion_mut() {
            Some(conversion) => {
                conversion.normalize_float = normalize;
                true
            }
            None => false,
        }
    }

    pub fn set_double_normalization(&mut self, normalize: bool) -> bool {
        match self.session.conversion_mut() {
            Some(conversion) => {
                conversion.normalize_double = normalize;
                true
            }
            None => false,
        }
    }

    pub fn set_clipping(&mut self, clipping: bool) -> bool {
        match self.session.conversion_mut() {
            Some(conversion) => {
                conversion.clipping = clipping;
                true
            }
            None => false,
        }
    }

    /// * Writes `bytes` and logs when the sink took less. A short write is not an error here.
    fn forward(sink: &mut K, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        let accepted = match sink.write(bytes) {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!("Sink write failed: {err}");
                0
            }
        };
        if accepted != bytes.len() {
            warn!("*** Warning : short write ({accepted} != {})", bytes.len());
        }
        accepted
    }

    /// * Constructs the encoder, writes the stream header and records where the compressed data starts.
    /// * Every fallible step runs before the first byte reaches the sink, so an `Err` here leaves the sink untouched.
    fn begin_stream(&mut self) -> Result<(), Mp3WriteError> {
        self.session.ensure_constructed()?;
        let header = self.session.tags().to_id3v2()?;
        let writes_summary_header = self.session.info().is_some_and(|info| info.writes_summary_header);
        let start = if self.config().seekable && writes_summary_header {
            Some(self.sink.tell()?)
        } else {
            None
        };
        let mut accepted = 0usize;
        if let Some(header) = header {
            debug!(size = header.len(), "Writing the ID3v2 header.");
            accepted = self.sink.write(&header)?;
            if accepted != header.len() {
                warn!("*** Warning : short write ({accepted} != {})", header.len());
            }
        }
        if let Some(start) = start {
            let offset = start + accepted as u64;
            debug!(offset, "Reserved the summary header.");
            self.reservation = Some(HeaderReservation { offset });
        }
        self.lifecycle = StreamLifecycle::Writing;
        Ok(())
    }

    /// * Writes interleaved samples and returns how many were consumed, counting every channel.
    /// * A trailing partial frame is ignored.
    /// * An encode failure stops the write short: the samples before it are reported, the error is kept in `last_error()`.
    /// * `Err` means nothing was consumed: the encoder or the stream header could not be set up, or the stream is closed.
    pub fn write_samples<S>(&mut self, samples: &[S]) -> Result<usize, Mp3WriteError>
    where
        S: InputSample,
    {
        match self.lifecycle {
            StreamLifecycle::Closing | StreamLifecycle::Closed => {
                return Err(Mp3WriteError::AlreadyFinished("the MP3 stream".to_owned()));
            }
            StreamLifecycle::Open => self.begin_stream()?,
            StreamLifecycle::Writing => (),
        }
        let capacity = self.session.ensure_constructed()?;
        self.last_error = None;
        let config = *self.session.config();
        let channels = config.channels as usize;
        let converter = SampleConverter::<S>::new(config.layout(), &config.float_conversion);

        let total_frames = samples.len() / channels;
        let max_frames = capacity.max_samples.max(1);
        let mut frames_done = 0usize;
        while frames_done < total_frames {
            let frames = (total_frames - frames_done).min(max_frames);
            let slice = &samples[frames_done * channels..(frames_done + frames) * channels];
            match self.session.encode_chunk(&converter, slice) {
                Ok((converted, bytes)) => {
                    Self::forward(&mut self.sink, bytes);
                    if converted == 0 {
                        break;
                    }
                    frames_done += converted;
                }
                Err(err) => {
                    self.last_error = Some(err);
                    break;
                }
            }
        }
        self.frames_written += frames_done as u64;
        Ok(frames_done * channels)
    }

    pub fn write_i16(&mut self, samples: &[i16]) -> Result<usize, Mp3WriteError> {
        self.write_samples(samples)
    }

    pub fn write_i32(&mut self, samples: &[i32]) -> Result<usize, Mp3WriteError> {
        self.write_samples(samples)
    }

    pub fn write_f32(&mut self, samples: &[f32]) -> Result<usize, Mp3WriteError> {
        self.write_samples(samples)
    }

    pub fn write_f64(&mut self, samples: &[f64]) -> Result<usize, Mp3WriteError> {
        self.write_samples(samples)
    }

    /// * Seeks to the reservation, writes the summary header and seeks back to `end`.
    /// * Returns `false` without writing if the sink didn't land exactly on the reservation.
    fn patch_summary_header(&mut self, reservation: HeaderReservation, header: &[u8], end: u64) -> io::Result<bool> {
        let landed = self.sink.seek(reservation.offset)?;
        if landed != reservation.offset {
            warn!(offset = reservation.offset, landed, "Skipped the summary header: the seek did not land on its offset.");
            self.sink.seek(end)?;
            return Ok(false);
        }
        let accepted = self.sink.write(header)?;
        if accepted != header.len() {
            warn!("*** Warning : short write ({accepted} != {})", header.len());
        }
        self.sink.seek(end)?;
        Ok(true)
    }

    fn finalize(&mut self) -> Result<FinalizeReport, Mp3WriteError> {
        let mut report = FinalizeReport::default();

        match self.session.flush() {
            Ok(bytes) => report.flushed_bytes = Self::forward(&mut self.sink, bytes),
            Err(err) => {
                if err.is_out_of_memory() {
                    return Err(err);
                }
                self.last_error = Some(err);
            }
        }

        if let Some(trailer) = self.session.trailer()? {
            info!(size = trailer.len(), "Writing ID3v1 trailer.");
            report.trailer_bytes = Self::forward(&mut self.sink, &trailer);
        }

        if let Some(reservation) = self.reservation.take() {
            if !self.sink.is_seekable() {
                debug!("{}", Mp3WriteError::NotSeekable);
                return Ok(report);
            }
            if let Some(header) = self.session.summary_header()? {
                info!(offset = reservation.offset, size = header.len(), "Writing the summary header.");
                let patched = self
                    .sink
                    .tell()
                    .and_then(|end| self.patch_summary_header(reservation, &header, end));
                match patched {
                    Ok(patched) => report.header_patched = patched,
                    Err(err) => warn!("Skipped the summary header: {err}"),
                }
            }
        }
        Ok(report)
    }

    /// * Flushes the encoder, appends the trailer, patches the summary header, then releases the encoder.
    /// * The encoder is released even when an earlier step failed.
    /// * Closing again returns an empty report and does nothing.
    pub fn close(&mut self) -> Result<FinalizeReport, Mp3WriteError> {
        match self.lifecycle {
            StreamLifecycle::Closing | StreamLifecycle::Closed => return Ok(FinalizeReport::default()),
            StreamLifecycle::Open | StreamLifecycle::Writing => self.lifecycle = StreamLifecycle::Closing,
        }
        let result = self.finalize();
        self.session.close();
        self.reservation = None;
        if let Err(err) = self.sink.flush() {
            warn!("Failed to flush the sink: {err}");
        }
        self.lifecycle = StreamLifecycle::Closed;
        result
    }
}

impl<B, K> Drop for Mp3Writer<B, K>
where
    B: EncoderBackend,
    K: Sink,
{
    fn drop(&mut self) {
        if self.lifecycle == StreamLifecycle::Closed {
            return;
        }
        if let Err(err) = self.close() {
            error!("Failed to finish the MP3 stream: {err}");
        }
    }
}
