use std::cell::Cell;
use std::error;
use std::fmt;
use std::io;

/// Legacy numeric error codes, kept for callers that want the C-style query.
pub mod codes {
    pub const SUCCESS: i32 = 0;
    pub const FILE_OPEN_FAILURE: i32 = 1;
    pub const FILE_READ_FAILURE: i32 = 2;
    pub const CHUNK_TOO_LARGE: i32 = 3;
    pub const BAD_CODEBOOK: i32 = 4;
    pub const INVALID_PIC_SIZE: i32 = 5;
    pub const NO_MEMORY: i32 = 6;
    pub const BAD_VQ_STREAM: i32 = 7;
    pub const INVALID_DIMENSION: i32 = 8;
    pub const RENDER_PROBLEM: i32 = 9;
    pub const CLIENT_PROBLEM: i32 = 10;
}

/// `DecodeError` enumerates all failures reported by the RoQ decoder.
#[derive(Debug)]
pub enum DecodeError {
    /// The source could not be opened.
    FileOpen(io::Error),
    /// The source ran out of bytes mid-read.
    FileRead(io::Error),
    /// The file does not begin with a RoQ signature chunk.
    BadSignature,
    /// A chunk declared a payload larger than the 64 KiB cap.
    ChunkTooLarge(u32),
    /// A codebook chunk's size does not match its cell counts.
    BadCodebook,
    /// Width or height is not divisible by 16.
    InvalidPicSize,
    /// Width or height is outside the 8..=1024 range.
    InvalidDimension,
    /// A VQ chunk did not consume its payload correctly.
    BadVqStream,
}

impl DecodeError {
    pub fn code(&self) -> i32 {
        match *self {
            DecodeError::FileOpen(_) => codes::FILE_OPEN_FAILURE,
            DecodeError::FileRead(_) => codes::FILE_READ_FAILURE,
            DecodeError::BadSignature => codes::FILE_READ_FAILURE,
            DecodeError::ChunkTooLarge(_) => codes::CHUNK_TOO_LARGE,
            DecodeError::BadCodebook => codes::BAD_CODEBOOK,
            DecodeError::InvalidPicSize => codes::INVALID_PIC_SIZE,
            DecodeError::InvalidDimension => codes::INVALID_DIMENSION,
            DecodeError::BadVqStream => codes::BAD_VQ_STREAM,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DecodeError::FileOpen(ref err) => write!(f, "failed to open source: {}", err),
            DecodeError::FileRead(ref err) => write!(f, "read failed: {}", err),
            DecodeError::BadSignature => f.write_str("missing RoQ signature chunk"),
            DecodeError::ChunkTooLarge(size) => write!(f, "chunk payload of {} bytes exceeds cap", size),
            DecodeError::BadCodebook => f.write_str("codebook chunk size does not match cell counts"),
            DecodeError::InvalidPicSize => f.write_str("width and height must be divisible by 16"),
            DecodeError::InvalidDimension => f.write_str("width and height must be within 8..=1024"),
            DecodeError::BadVqStream => f.write_str("malformed VQ chunk"),
        }
    }
}

impl error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            DecodeError::FileOpen(ref err) => Some(err),
            DecodeError::FileRead(ref err) => Some(err),
            _ => None,
        }
    }
}

thread_local! {
    static LAST_ERROR: Cell<i32> = Cell::new(codes::SUCCESS);
}

/// The legacy code of the most recent decoder error on this thread.
pub fn last_error_code() -> i32 {
    LAST_ERROR.with(|code| code.get())
}

// Stamps the thread-local code on the way out of a public decoder call.
pub(crate) fn record(err: DecodeError) -> DecodeError {
    LAST_ERROR.with(|code| code.set(err.code()));
    err
}
