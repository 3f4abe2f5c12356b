#![allow(dead_code)]

use std::{
    cell::RefCell,
    io::{self, Cursor, Seek, SeekFrom, Write},
    rc::Rc,
};

use mp3stream_core::{
    BackendError, BitrateMode, EncoderBackend, EncoderInfo, EncoderParams, FrameCapacity, MpegVersion, Sink,
    backend::ChannelMode,
};

/// Bytes the mock emits per completed MPEG frame.
pub const FRAME_BYTES: usize = 104;

/// What the mock saw, readable after the writer took the mock.
#[derive(Debug, Default)]
pub struct MockLog {
    pub params: Option<EncoderParams>,
    pub lock_calls: usize,
    pub chunk_frames: Vec<usize>,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub flush_calls: usize,
    pub trailer_fetches: usize,
    pub header_fetches: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockScript {
    /// Overrides the capacity derived from the sample rate.
    pub max_samples: Option<usize>,
    pub fail_lock: bool,
    /// Zero-based index of the encode call that fails.
    pub fail_encode_on_call: Option<usize>,
    pub fail_flush: bool,
    pub summary_header: Option<Vec<u8>>,
    pub trailer: Option<Vec<u8>>,
    /// Lies about the trailer size.
    pub trailer_len: Option<usize>,
}

/// A scripted encoder: one `FRAME_BYTES` frame per `frame_size` samples, deterministic content.
#[derive(Debug)]
pub struct MockBackend {
    pub script: MockScript,
    pub log: Rc<RefCell<MockLog>>,
    params: Option<EncoderParams>,
    locked: bool,
    pending: usize,
    frames_out: usize,
    placeholder_emitted: bool,
}

impl MockBackend {
    pub fn new(script: MockScript) -> (Self, Rc<RefCell<MockLog>>) {
        let log = Rc::new(RefCell::new(MockLog::default()));
        (
            Self {
                script,
                log: log.clone(),
                params: None,
                locked: false,
                pending: 0,
                frames_out: 0,
                placeholder_emitted: false,
            },
            log,
        )
    }

    fn frame_size(&self) -> usize {
        self.version().frame_size()
    }

    fn version(&self) -> MpegVersion {
        self.params.as_ref().map_or(MpegVersion::Mpeg1, |p| p.mpeg_version())
    }

    fn writes_summary_header(&self) -> bool {
        self.script.summary_header.is_some() && self.params.as_ref().is_some_and(|p| p.write_summary_header)
    }

    fn emit_frames(&mut self, count: usize, out: &mut [u8], mut at: usize) -> Result<usize, BackendError> {
        if at + count * FRAME_BYTES > out.len() {
            return Err(BackendError::new(BackendError::BUFFER_TOO_SMALL, "mock_encode"));
        }
        for _ in 0..count {
            let frame = &mut out[at..at + FRAME_BYTES];
            frame.fill(0xAA);
            frame[0] = 0xFF;
            frame[1] = 0xFB;
            frame[2] = (self.frames_out % 251) as u8;
            self.frames_out += 1;
            at += FRAME_BYTES;
        }
        Ok(at)
    }
}

impl EncoderBackend for MockBackend {
    fn configure(&mut self, params: &EncoderParams) -> Result<(), BackendError> {
        self.params = Some(params.clone());
        self.log.borrow_mut().params = Some(params.clone());
        Ok(())
    }

    fn lock_parameters(&mut self) -> Result<FrameCapacity, BackendError> {
        self.log.borrow_mut().lock_calls += 1;
        if self.script.fail_lock {
            return Err(BackendError::new(BackendError::BAD_SAMPLE_FREQ, "mock_init_params"));
        }
        self.locked = true;
        Ok(match self.script.max_samples {
            Some(max_samples) => FrameCapacity {
                max_samples,
                max_output_bytes: FrameCapacity::worst_case_output(max_samples),
            },
            None => FrameCapacity::for_version(self.version()),
        })
    }

    fn info(&self) -> EncoderInfo {
        let params = self.params.clone().unwrap_or_else(|| EncoderParams::new(44100, 1));
        EncoderInfo {
            version: params.mpeg_version(),
            sample_rate: params.sample_rate,
            channel_mode: if params.channels == 1 { ChannelMode::Mono } else { ChannelMode::JointStereo },
            bitrate_mode: params.bitrate_mode,
            bitrate_kbps: match params.bitrate_mode {
                BitrateMode::Constant => Some(128),
                BitrateMode::Variable => None,
            },
            vbr_quality: None,
            encoder_delay: Some(576),
            writes_summary_header: self.writes_summary_header(),
        }
    }

    fn encode(&mut self, left: &[f32], right: Option<&[f32]>, out: &mut [u8]) -> Result<usize, BackendError> {
        assert!(self.locked, "encode before lock");
        {
            let mut log = self.log.borrow_mut();
            let call = log.chunk_frames.len();
            if self.script.fail_encode_on_call == Some(call) {
                return Err(BackendError::new(BackendError::PSYCHO_ACOUSTIC, "mock_encode"));
            }
            log.chunk_frames.push(left.len());
            log.left.extend_from_slice(left);
            if let Some(right) = right {
                assert_eq!(right.len(), left.len());
                log.right.extend_from_slice(right);
            }
        }
        let mut at = 0;
        if self.writes_summary_header() && !self.placeholder_emitted {
            let len = self.script.summary_header.as_ref().map_or(0, |h| h.len());
            out[..len].fill(0);
            at = len;
            self.placeholder_emitted = true;
        }
        self.pending += left.len();
        let frames = self.pending / self.frame_size();
        self.pending %= self.frame_size();
        self.emit_frames(frames, out, at)
    }

    fn flush(&mut self, out: &mut [u8]) -> Result<usize, BackendError> {
        self.log.borrow_mut().flush_calls += 1;
        if self.script.fail_flush {
            return Err(BackendError::new(BackendError::GENERIC, "mock_flush"));
        }
        let frames = if self.pending > 0 { 1 } else { 0 };
        self.pending = 0;
        self.emit_frames(frames, out, 0)
    }

    fn summary_header_len(&self) -> usize {
        if self.writes_summary_header() {
            self.script.summary_header.as_ref().map_or(0, |h| h.len())
        } else {
            0
        }
    }

    fn fetch_summary_header(&self, buffer: &mut [u8]) -> usize {
        self.log.borrow_mut().header_fetches += 1;
        match &self.script.summary_header {
            Some(header) if self.writes_summary_header() => {
                buffer[..header.len()].copy_from_slice(header);
                header.len()
            }
            _ => 0,
        }
    }

    fn trailer_len(&self) -> usize {
        match self.script.trailer_len {
            Some(len) => len,
            None => self.script.trailer.as_ref().map_or(0, |t| t.len()),
        }
    }

    fn fetch_trailer(&self, buffer: &mut [u8]) -> usize {
        self.log.borrow_mut().trailer_fetches += 1;
        match &self.script.trailer {
            Some(trailer) => {
                buffer[..trailer.len()].copy_from_slice(trailer);
                trailer.len()
            }
            None => 0,
        }
    }
}

/// A seekable sink over a cursor that counts seeks and can land `skew` bytes off target.
#[derive(Debug, Default)]
pub struct ProbeSink {
    pub cursor: Cursor<Vec<u8>>,
    pub seekable: bool,
    pub skew: u64,
    pub seeks: Vec<u64>,
    /// Accepts at most this many bytes per write.
    pub write_limit: Option<usize>,
    /// How many of the next writes fail outright, writing nothing.
    pub failing_writes: usize,
    /// How many of the next `tell()` calls fail.
    pub failing_tells: usize,
}

impl ProbeSink {
    pub fn seekable() -> Self {
        Self { seekable: true, ..Default::default() }
    }

    pub fn pipe() -> Self {
        Self::default()
    }

    pub fn data(&self) -> &[u8] {
        self.cursor.get_ref()
    }
}

impl Sink for ProbeSink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write refused"));
        }
        let n = self.write_limit.map_or(bytes.len(), |limit| limit.min(bytes.len()));
        self.cursor.write_all(&bytes[..n])?;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        self.seeks.push(offset);
        if !self.seekable {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "pipe"));
        }
        let target = if offset == self.cursor.get_ref().len() as u64 { offset } else { offset + self.skew };
        self.cursor.seek(SeekFrom::Start(target))
    }

    fn tell(&mut self) -> io::Result<u64> {
        if self.failing_tells > 0 {
            self.failing_tells -= 1;
            return Err(io::Error::other("tell refused"));
        }
        Ok(self.cursor.position())
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
