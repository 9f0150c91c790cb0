use std::fs::File;
use std::io::SeekFrom;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use log::debug;

use crate::audio;
use crate::chunk::{self, ChunkHeader};
use crate::codebook::{Codebook, Luts};
use crate::error::{self, DecodeError};
use crate::frame::{FramePair, Geometry, VideoFrame};
use crate::source::ByteSource;
use crate::video::unpack_vq;

pub type VideoCallback<'a> = Box<dyn FnMut(&VideoFrame) + Send + 'a>;
pub type AudioCallback<'a> = Box<dyn FnMut(&[u8], u8) + Send + 'a>;

struct VideoState {
    geometry: Geometry,
    frames: FramePair,
}

/// Decoder for the RoQ container: chunk dispatch, codebook maintenance,
/// VQ frame reconstruction and DPCM audio decode. Output is delivered
/// through the installed callbacks, one video frame and/or one audio block
/// per successful `decode` call.
pub struct Decoder<'a> {
    source: ByteSource<'a>,
    video: Option<VideoState>,
    framerate: u16,
    current_frame: u32,
    looping: bool,
    has_ended: bool,
    channels: u8,
    luts: Luts,
    codebook: Codebook,
    pcm: Vec<u8>,
    video_cb: Option<VideoCallback<'a>>,
    audio_cb: Option<AudioCallback<'a>>,
}

impl<'a> Decoder<'a> {
    pub fn with_filename<P: AsRef<Path>>(path: P) -> Result<Decoder<'a>, DecodeError> {
        let source = match ByteSource::with_filename(path) {
            Ok(source) => source,
            Err(err) => {
                return Err(error::record(err));
            }
        };
        Decoder::new(source)
    }

    pub fn with_file(file: File) -> Result<Decoder<'a>, DecodeError> {
        let source = match ByteSource::with_file(file) {
            Ok(source) => source,
            Err(err) => {
                return Err(error::record(err));
            }
        };
        Decoder::new(source)
    }

    pub fn with_memory(bytes: Vec<u8>) -> Result<Decoder<'a>, DecodeError> {
        Decoder::new(ByteSource::with_memory(bytes))
    }

    pub fn with_memory_ref(bytes: &'a [u8]) -> Result<Decoder<'a>, DecodeError> {
        Decoder::new(ByteSource::with_memory_ref(bytes))
    }

    pub fn new(mut source: ByteSource<'a>) -> Result<Decoder<'a>, DecodeError> {
        // the file must open with the signature chunk
        let header = chunk::read_header(&mut source).map_err(error::record)?;
        if header.id != chunk::ROQ_SIGNATURE || header.size != chunk::SIGNATURE_SIZE {
            return Err(error::record(DecodeError::BadSignature));
        }
        let framerate = header.arg;

        // scan forward for the info chunk; a stream without one carries no
        // video and is still playable for its audio
        let mut video = None;
        while !source.eof() {
            let header = chunk::read_header(&mut source).map_err(error::record)?;
            if header.id != chunk::ROQ_INFO {
                source
                    .seek(SeekFrom::Current(header.size as i64))
                    .map_err(error::record)?;
                continue;
            }

            let buf = source.read(header.size as usize).map_err(error::record)?;
            if buf.len() < 4 {
                return Err(error::record(DecodeError::InvalidPicSize));
            }
            let width = LittleEndian::read_u16(&buf[0..2]) as usize;
            let height = LittleEndian::read_u16(&buf[2..4]) as usize;

            if width % 16 != 0 || height % 16 != 0 {
                return Err(error::record(DecodeError::InvalidPicSize));
            }
            if width < 8 || width > 1024 || height < 8 || height > 1024 {
                return Err(error::record(DecodeError::InvalidDimension));
            }

            let geometry = Geometry::new(width, height);
            debug!(
                "info: {}x{}, {}x{} macroblocks, texture {}x{}",
                width, height, geometry.mb_width, geometry.mb_height, geometry.stride, geometry.texture_height
            );

            let frames = FramePair::new(geometry.surface_len());
            video = Some(VideoState { geometry, frames });
            break;
        }

        // rewind to the first post-signature chunk
        source
            .seek(SeekFrom::Start(chunk::CHUNK_HEADER_SIZE as u64))
            .map_err(error::record)?;

        Ok(Decoder {
            source,
            video,
            framerate,
            current_frame: 0,
            looping: false,
            has_ended: false,
            channels: 0,
            luts: Luts::new(),
            codebook: Codebook::new(),
            pcm: Vec::new(),
            video_cb: None,
            audio_cb: None,
        })
    }

    /// Installs the frame callback. Captured state doubles as the user
    /// pointer of the C-style interface.
    pub fn set_video_callback<F>(self: &mut Decoder<'a>, callback: F)
    where
        F: FnMut(&VideoFrame) + Send + 'a,
    {
        self.video_cb = Some(Box::new(callback));
    }

    /// Installs the PCM callback; arguments are the interleaved
    /// little-endian samples and the channel count.
    pub fn set_audio_callback<F>(self: &mut Decoder<'a>, callback: F)
    where
        F: FnMut(&[u8], u8) + Send + 'a,
    {
        self.audio_cb = Some(Box::new(callback));
    }

    /// Decodes until one video frame and one audio block (for whichever
    /// callbacks are installed) have been delivered. Returns false once the
    /// stream has ended; with looping enabled the end rewinds transparently.
    pub fn decode(self: &mut Decoder<'a>) -> Result<bool, DecodeError> {
        let decode_video = self.video_cb.is_some();
        let decode_audio = self.audio_cb.is_some();

        if !decode_video && !decode_audio {
            // nothing to decode for
            return Ok(false);
        }

        if self.source.eof() {
            self.handle_end();
        }
        if self.has_ended {
            return Ok(false);
        }

        let mut video_decoded = false;
        let mut audio_decoded = false;
        let mut video_ended = false;
        let mut wraps = 0;

        loop {
            if self.source.eof() {
                self.handle_end();
                if self.has_ended {
                    break;
                }
                // looping: rewound to the start. Deliver anything this call
                // already produced instead of decoding into the next cycle,
                // and give up after one fruitless full pass so a stream with
                // nothing decodable cannot spin forever.
                if video_decoded || audio_decoded {
                    break;
                }
                wraps += 1;
                if wraps > 1 {
                    self.has_ended = true;
                    break;
                }
                continue;
            }

            let header = chunk::read_header(&mut self.source).map_err(error::record)?;

            match header.id {
                chunk::ROQ_INFO | chunk::ROQ_JPEG | chunk::ROQ_PACKET => {
                    self.skip(header)?;
                }
                chunk::ROQ_SIGNATURE => {
                    // size field is a sentinel, no payload to skip
                }
                chunk::ROQ_QUAD_CODEBOOK => {
                    if !decode_video {
                        self.skip(header)?;
                    } else if decode_audio && !audio_decoded && (video_decoded || video_ended) {
                        // leave the codebook for the next call so each call
                        // keeps pairing one frame with one audio block
                        self.source
                            .seek(SeekFrom::Current(-(chunk::CHUNK_HEADER_SIZE as i64)))
                            .map_err(error::record)?;
                        audio_decoded = true;
                    } else {
                        let payload = self.source.read(header.size as usize).map_err(error::record)?;
                        self.codebook
                            .unpack(&self.luts, payload, header.arg)
                            .map_err(error::record)?;
                    }
                }
                chunk::ROQ_QUAD_VQ => {
                    if !decode_video {
                        self.skip(header)?;
                    } else {
                        let payload = self.source.read(header.size as usize).map_err(error::record)?;
                        match self.video.as_mut() {
                            Some(video) => {
                                let (this, last) = video.frames.advance();
                                match unpack_vq(this, last, &self.codebook, &video.geometry, payload, header.arg) {
                                    Ok(()) => {
                                        video_decoded = true;
                                        if let Some(callback) = self.video_cb.as_mut() {
                                            let geometry = &video.geometry;
                                            callback(&VideoFrame {
                                                data: video.frames.this(),
                                                width: geometry.width,
                                                height: geometry.height,
                                                stride: geometry.stride,
                                                texture_height: geometry.texture_height,
                                            });
                                        }
                                    }
                                    Err(err) => {
                                        // drop the frame and treat the video
                                        // stream as finished
                                        error::record(err);
                                        video_ended = true;
                                    }
                                }
                            }
                            None => {
                                // VQ data without an info chunk
                                error::record(DecodeError::BadVqStream);
                                video_ended = true;
                            }
                        }
                    }
                }
                chunk::ROQ_SOUND_MONO => {
                    if !decode_audio {
                        self.skip(header)?;
                    } else {
                        let payload = self.source.read(header.size as usize).map_err(error::record)?;
                        self.channels = 1;
                        audio::decode_mono(header.arg, payload, &mut self.pcm);
                        audio_decoded = true;
                        if let Some(callback) = self.audio_cb.as_mut() {
                            callback(&self.pcm, 1);
                        }
                    }
                }
                chunk::ROQ_SOUND_STEREO => {
                    if !decode_audio {
                        self.skip(header)?;
                    } else {
                        let payload = self.source.read(header.size as usize).map_err(error::record)?;
                        self.channels = 2;
                        audio::decode_stereo(header.arg, payload, &mut self.pcm);
                        audio_decoded = true;
                        if let Some(callback) = self.audio_cb.as_mut() {
                            callback(&self.pcm, 2);
                        }
                    }
                }
                _ => {
                    debug!(
                        "unhandled chunk (id: {:#06x}, size: {}, arg: {})",
                        header.id, header.size, header.arg
                    );
                    self.skip(header)?;
                }
            }

            let need_video = decode_video && !video_decoded && !video_ended;
            let need_audio = decode_audio && !audio_decoded;
            if !need_video && !need_audio {
                break;
            }
        }

        if video_ended {
            self.handle_end();
            return Ok(false);
        }
        if self.has_ended {
            // the source ran out before the call completed
            return Ok(video_decoded || audio_decoded);
        }

        self.current_frame += 1;
        Ok(true)
    }

    /// Rewinds to the first post-signature chunk and clears the end state.
    pub fn rewind(self: &mut Decoder<'a>) -> Result<(), DecodeError> {
        self.current_frame = 0;
        self.loop_rewind()
    }

    // Rewind without resetting the frame counter, so looped playback keeps
    // counting up across cycles.
    fn loop_rewind(&mut self) -> Result<(), DecodeError> {
        if let Some(video) = self.video.as_mut() {
            video.frames.reset();
        }
        self.has_ended = false;
        self.source
            .seek(SeekFrom::Start(chunk::CHUNK_HEADER_SIZE as u64))
            .map_err(error::record)
    }

    pub fn width(self: &Decoder<'a>) -> usize {
        match self.video.as_ref() {
            Some(video) => video.geometry.width,
            None => 0,
        }
    }

    pub fn height(self: &Decoder<'a>) -> usize {
        match self.video.as_ref() {
            Some(video) => video.geometry.height,
            None => 0,
        }
    }

    pub fn stride(self: &Decoder<'a>) -> usize {
        match self.video.as_ref() {
            Some(video) => video.geometry.stride,
            None => 0,
        }
    }

    pub fn texture_height(self: &Decoder<'a>) -> usize {
        match self.video.as_ref() {
            Some(video) => video.geometry.texture_height,
            None => 0,
        }
    }

    pub fn framerate(self: &Decoder<'a>) -> u16 {
        return self.framerate;
    }

    pub fn current_frame(self: &Decoder<'a>) -> u32 {
        return self.current_frame;
    }

    /// Channel count of the most recent audio chunk (0 before the first).
    pub fn channels(self: &Decoder<'a>) -> u8 {
        return self.channels;
    }

    pub fn has_ended(self: &Decoder<'a>) -> bool {
        return self.has_ended;
    }

    pub fn get_loop(self: &Decoder<'a>) -> bool {
        return self.looping;
    }

    pub fn set_loop(self: &mut Decoder<'a>, looping: bool) {
        self.looping = looping;
    }

    fn skip(&mut self, header: ChunkHeader) -> Result<(), DecodeError> {
        self.source
            .seek(SeekFrom::Current(header.size as i64))
            .map_err(error::record)
    }

    fn handle_end(&mut self) {
        if self.looping {
            if self.loop_rewind().is_err() {
                self.has_ended = true;
            }
        } else {
            self.has_ended = true;
        }
    }
}
