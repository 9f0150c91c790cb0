use std::error;
use std::fmt;

use crate::frame::VideoFrame;

/// Error string reported by a sink implementation.
#[derive(Debug)]
pub struct SinkError(pub String);

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl error::Error for SinkError {}

impl From<String> for SinkError {
    fn from(message: String) -> SinkError {
        SinkError(message)
    }
}

impl From<&str> for SinkError {
    fn from(message: &str) -> SinkError {
        SinkError(message.to_string())
    }
}

/// Renderer contract: owns the two presentation slots (textures), receives
/// the full `stride * texture_height` RGB565 surface on upload, and presents
/// a previously uploaded slot. Upload and present run on different threads
/// but never concurrently for the same sink.
pub trait VideoSink: Send {
    /// Called once with the stream geometry before any upload.
    fn prepare(
        &mut self,
        width: usize,
        height: usize,
        stride: usize,
        texture_height: usize,
    ) -> Result<(), SinkError>;

    /// Copies the decoded surface into the given slot (0 or 1).
    fn upload(&mut self, slot: usize, frame: &VideoFrame) -> Result<(), SinkError>;

    /// Presents the given slot.
    fn present(&mut self, slot: usize) -> Result<(), SinkError>;
}

/// PCM output contract: a pull-style driver fed at 22050 Hz with 1 or 2
/// interleaved channels of little-endian signed 16-bit samples.
pub trait AudioSink: Send {
    fn start(&mut self, rate: u32, channels: u8) -> Result<(), SinkError>;

    fn stop(&mut self);

    /// Number of PCM bytes the sink can accept right now.
    fn wanted(&self) -> usize;

    fn submit(&mut self, pcm: &[u8]) -> Result<(), SinkError>;

    fn set_volume(&mut self, volume: u8);
}
