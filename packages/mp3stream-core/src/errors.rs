use std::{
    error,
    fmt::{self, Display, Formatter},
    io::{self, ErrorKind},
};

/// * The error info from `std::io::Error` but this must contains the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IOErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl IOErrorInfo {
    pub fn new(kind: ErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

/// * The error code returned by the encoder library, with the name of the call that returned it.
/// * Negative codes are LAME's own (`-1` generic, `-2` out of memory, `-3` bad bitrate, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendError {
    pub code: i32,
    pub function: &'static str,
}

impl BackendError {
    pub const GENERIC: i32 = -1;
    pub const NO_MEM: i32 = -2;
    pub const BAD_BITRATE: i32 = -3;
    pub const BAD_SAMPLE_FREQ: i32 = -4;
    pub const INTERNAL: i32 = -5;
    pub const BUFFER_TOO_SMALL: i32 = -6;
    pub const PSYCHO_ACOUSTIC: i32 = -7;

    pub fn new(code: i32, function: &'static str) -> Self {
        Self { code, function }
    }

    pub fn get_message_from_code(code: i32) -> &'static str {
        match code {
            Self::GENERIC => "Generic error",
            Self::NO_MEM => "No enough memory",
            Self::BAD_BITRATE => "Bad bit rate",
            Self::BAD_SAMPLE_FREQ => "Bad sample rate",
            Self::INTERNAL => "Internal error",
            Self::BUFFER_TOO_SMALL => "Buffer is too small",
            Self::PSYCHO_ACOUSTIC => "Psycho acoustic problems",
            _ => "Other error",
        }
    }
}

impl error::Error for BackendError {}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "Code: {}, function: {}, message: {}",
            self.code,
            self.function,
            Self::get_message_from_code(self.code)
        )
    }
}

/// The error info for writing an MP3 stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mp3WriteError {
    /// Bad channel count or sample rate at configuration.
    InvalidFormat(String),
    /// The encoder rejected the parameter lock-in.
    ConstructionFailure(String),
    /// A scratch, trailer or header buffer could not be obtained.
    AllocationFailure(String),
    /// The encoder returned an error code mid-stream.
    EncodeFailure(String),
    /// A header patch was requested on a sink that can't seek.
    NotSeekable,
    IOError(IOErrorInfo),
    TagError(String),
    AlreadyFinished(String),
}

impl Mp3WriteError {
    /// * Whether the error came from a failed allocation, the one finalization failure that aborts the remaining steps.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::AllocationFailure(_))
    }
}

impl error::Error for Mp3WriteError {}

impl Display for Mp3WriteError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::InvalidFormat(info) => write!(f, "Invalid format: {info}"),
            Self::ConstructionFailure(info) => write!(f, "Failed to initialize the encoder: {info}"),
            Self::AllocationFailure(info) => write!(f, "Out of memory: {info}"),
            Self::EncodeFailure(info) => write!(f, "Encode failed: {info}"),
            Self::NotSeekable => write!(f, "The output is not seekable"),
            Self::IOError(ioerror) => write!(f, "IO error: {:?}", ioerror),
            Self::TagError(info) => write!(f, "Tag error: {info}"),
            Self::AlreadyFinished(info) => write!(f, "Already finished writing {info}"),
        }
    }
}

impl From<io::Error> for Mp3WriteError {
    fn from(ioerr: io::Error) -> Self {
        Mp3WriteError::IOError(IOErrorInfo {
            kind: ioerr.kind(),
            message: ioerr.to_string(),
        })
    }
}

impl From<id3::Error> for Mp3WriteError {
    fn from(err: id3::Error) -> Self {
        Mp3WriteError::TagError(err.to_string())
    }
}

impl From<std::collections::TryReserveError> for Mp3WriteError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Mp3WriteError::AllocationFailure(err.to_string())
    }
}
