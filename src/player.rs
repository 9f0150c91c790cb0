use std::error;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};

use crate::audio::SAMPLE_RATE;
use crate::clock::PacingClock;
use crate::dec::Decoder;
use crate::error::DecodeError;
use crate::ring::RingBuffer;
use crate::sink::{AudioSink, SinkError, VideoSink};
use crate::slots::{Acquire, FrameSlots};

const AUDIO_RING_CAPACITY: usize = 1024 * 1024;
const AUDIO_POLL_INTERVAL: Duration = Duration::from_millis(10);
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(5);
const SLOT_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug)]
pub enum PlayerError {
    /// The decoder reported a failure while being driven.
    Source(DecodeError),
    /// The source could not be opened as a RoQ stream.
    Format(DecodeError),
    /// The PCM sink could not be brought up.
    SndInit(SinkError),
    /// The renderer sink could not be brought up.
    Render(SinkError),
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PlayerError::Source(ref err) => write!(f, "decode failed: {}", err),
            PlayerError::Format(ref err) => write!(f, "format init failed: {}", err),
            PlayerError::SndInit(ref err) => write!(f, "sound init failed: {}", err),
            PlayerError::Render(ref err) => write!(f, "render init failed: {}", err),
        }
    }
}

impl error::Error for PlayerError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            PlayerError::Source(ref err) => Some(err),
            PlayerError::Format(ref err) => Some(err),
            PlayerError::SndInit(ref err) => Some(err),
            PlayerError::Render(ref err) => Some(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Status {
    Null = 0,
    Ready,
    Streaming,
    Pausing,
    Stopping,
    Resuming,
    Done,
    Error,
}

impl Status {
    fn from_u8(value: u8) -> Status {
        match value {
            0 => Status::Null,
            1 => Status::Ready,
            2 => Status::Streaming,
            3 => Status::Pausing,
            4 => Status::Stopping,
            5 => Status::Resuming,
            6 => Status::Done,
            _ => Status::Error,
        }
    }
}

struct Shared {
    audio_status: AtomicU8,
    video_status: AtomicU8,
    paused: AtomicBool,
    stop_requested: AtomicBool,
    playing_loop: AtomicBool,
    channels: AtomicU8,
    ring: Mutex<RingBuffer>,
    slots: FrameSlots,
}

impl Shared {
    fn new() -> Shared {
        Shared {
            audio_status: AtomicU8::new(Status::Null as u8),
            video_status: AtomicU8::new(Status::Null as u8),
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            playing_loop: AtomicBool::new(false),
            channels: AtomicU8::new(0),
            ring: Mutex::new(RingBuffer::with_capacity(AUDIO_RING_CAPACITY)),
            slots: FrameSlots::new(),
        }
    }

    fn audio_status(&self) -> Status {
        Status::from_u8(self.audio_status.load(Ordering::Acquire))
    }

    fn video_status(&self) -> Status {
        Status::from_u8(self.video_status.load(Ordering::Acquire))
    }

    fn set_audio_status(&self, status: Status) {
        self.audio_status.store(status as u8, Ordering::Release);
    }

    fn set_video_status(&self, status: Status) {
        self.video_status.store(status as u8, Ordering::Release);
    }

    fn paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn request_pause(&self) {
        self.paused.store(true, Ordering::Release);
        let audio = self.audio_status();
        if audio != Status::Ready && audio != Status::Pausing {
            self.set_audio_status(Status::Pausing);
        }
        let video = self.video_status();
        if video != Status::Ready && video != Status::Pausing {
            self.set_video_status(Status::Pausing);
        }
    }

    fn request_stop(&self) {
        self.paused.store(true, Ordering::Release);
        self.stop_requested.store(true, Ordering::Release);
        let audio = self.audio_status();
        if audio != Status::Ready && audio != Status::Stopping {
            self.set_audio_status(Status::Stopping);
        }
        let video = self.video_status();
        if video != Status::Ready && video != Status::Stopping {
            self.set_video_status(Status::Stopping);
        }
    }

    fn request_resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.set_audio_status(Status::Resuming);
        self.set_video_status(Status::Resuming);
    }
}

/// Cloneable control surface for a running player, safe to use from the
/// frame callback or another thread while `play` is blocking.
#[derive(Clone)]
pub struct PlayerHandle {
    shared: Arc<Shared>,
    audio_sink: Arc<Mutex<dyn AudioSink>>,
}

impl PlayerHandle {
    pub fn pause(&self) {
        self.shared.request_pause();
    }

    pub fn resume(&self) {
        self.shared.request_resume();
    }

    /// Stops playback and rewinds; the rewind is applied by the play loop.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    pub fn volume(&self, volume: i32) {
        let volume = volume.clamp(0, 255) as u8;
        self.audio_sink.lock().unwrap().set_volume(volume);
    }

    pub fn is_playing(&self) -> bool {
        self.shared.audio_status() == Status::Streaming
    }
}

/// Playback coordinator: owns the decoder and two worker threads. The audio
/// worker feeds the PCM sink from a ring buffer; the video worker presents
/// uploaded frame slots on the stream's frame deadline. `play` drives the
/// decoder on the calling thread.
pub struct Player<'a> {
    decoder: Decoder<'a>,
    shared: Arc<Shared>,
    audio_sink: Arc<Mutex<dyn AudioSink>>,
    audio_worker: Option<JoinHandle<()>>,
    video_worker: Option<JoinHandle<()>>,
}

impl<'a> Player<'a> {
    /// Opens `path` as a RoQ stream and builds a player around it. Decoder
    /// creation failures surface as `Format` errors.
    pub fn with_filename<P, V, A>(path: P, video_sink: V, audio_sink: A) -> Result<Player<'a>, PlayerError>
    where
        P: AsRef<Path>,
        V: VideoSink + 'static,
        A: AudioSink + 'static,
    {
        let decoder = Decoder::with_filename(path).map_err(PlayerError::Format)?;
        Player::new(decoder, video_sink, audio_sink)
    }

    pub fn new<V, A>(mut decoder: Decoder<'a>, video_sink: V, audio_sink: A) -> Result<Player<'a>, PlayerError>
    where
        V: VideoSink + 'static,
        A: AudioSink + 'static,
    {
        let shared = Arc::new(Shared::new());
        let video_sink: Arc<Mutex<dyn VideoSink>> = Arc::new(Mutex::new(video_sink));
        let audio_sink: Arc<Mutex<dyn AudioSink>> = Arc::new(Mutex::new(audio_sink));

        if decoder.width() > 0 {
            video_sink
                .lock()
                .unwrap()
                .prepare(
                    decoder.width(),
                    decoder.height(),
                    decoder.stride(),
                    decoder.texture_height(),
                )
                .map_err(PlayerError::Render)?;
        }

        // frame delivery: claim an empty slot, upload, hand it to the
        // render worker
        {
            let shared = shared.clone();
            let sink = video_sink.clone();
            let mut load_index: usize = 0;
            decoder.set_video_callback(move |frame| {
                let acquired = loop {
                    match shared.slots.load.acquire_timeout(SLOT_WAIT) {
                        Acquire::Acquired => break true,
                        Acquire::Closed => break false,
                        Acquire::TimedOut => {
                            // drop the frame rather than stall a pause or
                            // teardown
                            if shared.paused()
                                || matches!(shared.video_status(), Status::Done | Status::Error)
                            {
                                break false;
                            }
                        }
                    }
                };
                if !acquired {
                    return;
                }

                let slot = load_index & 1;
                if let Err(err) = sink.lock().unwrap().upload(slot, frame) {
                    error!("frame upload failed: {}", err);
                    shared.set_video_status(Status::Error);
                    shared.slots.load.release();
                    return;
                }
                load_index += 1;
                shared.slots.ready.release();
            });
        }

        // PCM delivery: append to the ring, yielding while it is full
        {
            let shared = shared.clone();
            decoder.set_audio_callback(move |pcm, channels| {
                shared.channels.store(channels, Ordering::Release);
                loop {
                    {
                        let mut ring = shared.ring.lock().unwrap();
                        if !ring.overflow(pcm.len()) {
                            ring.write(pcm);
                            return;
                        }
                    }
                    match shared.audio_status() {
                        Status::Streaming | Status::Resuming | Status::Pausing => {
                            thread::yield_now();
                        }
                        _ => return,
                    }
                }
            });
        }

        let audio_worker = {
            let shared = shared.clone();
            let sink = audio_sink.clone();
            thread::Builder::new()
                .name("roq-audio".to_string())
                .spawn(move || audio_worker(shared, sink))
                .map_err(|err| PlayerError::SndInit(SinkError(format!("audio worker spawn failed: {}", err))))?
        };

        let video_worker = {
            let shared = shared.clone();
            let sink = video_sink.clone();
            let framerate = decoder.framerate() as u32;
            thread::Builder::new()
                .name("roq-video".to_string())
                .spawn(move || video_worker(shared, sink, framerate))
                .map_err(|err| PlayerError::Render(SinkError(format!("video worker spawn failed: {}", err))))?
        };

        shared.set_audio_status(Status::Ready);
        shared.set_video_status(Status::Ready);

        Ok(Player {
            decoder,
            shared,
            audio_sink,
            audio_worker: Some(audio_worker),
            video_worker: Some(video_worker),
        })
    }

    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle {
            shared: self.shared.clone(),
            audio_sink: self.audio_sink.clone(),
        }
    }

    /// Plays until the stream ends or playback is stopped, invoking
    /// `frame_cb` once per iteration for input polling. Re-entry while a
    /// play loop is already running only resumes the workers.
    pub fn play<F>(self: &mut Player<'a>, mut frame_cb: F) -> Result<(), PlayerError>
    where
        F: FnMut(),
    {
        if self.shared.audio_status() == Status::Streaming {
            return Ok(());
        }

        self.shared.request_resume();

        if self.shared.playing_loop.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let result = loop {
            frame_cb();

            // shutdown while playing
            if self.shared.audio_status() == Status::Done || self.shared.video_status() == Status::Done {
                break Ok(());
            }

            if self.shared.stop_requested.swap(false, Ordering::AcqRel) {
                if let Err(err) = self.decoder.rewind() {
                    break Err(PlayerError::Source(err));
                }
            }

            if self.shared.paused() {
                thread::sleep(STATUS_POLL_INTERVAL);
            } else if let Err(err) = self.decoder.decode() {
                self.shared.request_stop();
                break Err(PlayerError::Source(err));
            }

            if self.decoder.has_ended() {
                break Ok(());
            }
        };

        self.shared.playing_loop.store(false, Ordering::Release);
        result
    }

    pub fn pause(&self) {
        self.shared.request_pause();
    }

    pub fn resume(&self) {
        self.shared.request_resume();
    }

    /// Stops playback and rewinds the decoder to the start.
    pub fn stop(&mut self) {
        self.shared.request_stop();
        if !self.shared.playing_loop.load(Ordering::Acquire) {
            self.shared.stop_requested.store(false, Ordering::Release);
            if let Err(err) = self.decoder.rewind() {
                error!("rewind failed: {}", err);
            }
        }
    }

    pub fn volume(&self, volume: i32) {
        let volume = volume.clamp(0, 255) as u8;
        self.audio_sink.lock().unwrap().set_volume(volume);
    }

    pub fn is_playing(&self) -> bool {
        self.shared.audio_status() == Status::Streaming
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.decoder.set_loop(looping);
    }

    pub fn get_loop(&self) -> bool {
        self.decoder.get_loop()
    }

    pub fn has_ended(&self) -> bool {
        self.decoder.has_ended()
    }

    /// Joins both workers and releases the sinks. Also runs on drop.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        self.shared.set_audio_status(Status::Done);
        self.shared.set_video_status(Status::Done);
        self.shared.slots.close();

        if let Some(worker) = self.audio_worker.take() {
            let _ = worker.join();
        }
        if let Some(worker) = self.video_worker.take() {
            let _ = worker.join();
        }

        self.shared.ring.lock().unwrap().clear();
    }
}

impl Drop for Player<'_> {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

fn audio_worker(shared: Arc<Shared>, sink: Arc<Mutex<dyn AudioSink>>) {
    let mut scratch = vec![0u8; 32 * 1024];
    let mut started = false;

    loop {
        match shared.audio_status() {
            Status::Done | Status::Error => break,
            Status::Resuming => {
                if !started {
                    let channels = shared.channels.load(Ordering::Acquire);
                    if channels != 0 {
                        match sink.lock().unwrap().start(SAMPLE_RATE, channels) {
                            Ok(()) => started = true,
                            Err(err) => {
                                error!("pcm sink start failed: {}", err);
                                shared.set_audio_status(Status::Error);
                                continue;
                            }
                        }
                    }
                    // channel count unknown until the first audio chunk; the
                    // sink starts from the streaming state once it is known
                }
                shared.set_audio_status(Status::Streaming);
            }
            Status::Pausing => {
                if started {
                    sink.lock().unwrap().stop();
                    started = false;
                }
                shared.set_audio_status(Status::Ready);
            }
            Status::Stopping => {
                if started {
                    sink.lock().unwrap().stop();
                    started = false;
                }
                shared.ring.lock().unwrap().clear();
                shared.set_audio_status(Status::Ready);
            }
            Status::Streaming => {
                if !started {
                    let channels = shared.channels.load(Ordering::Acquire);
                    if channels != 0 {
                        match sink.lock().unwrap().start(SAMPLE_RATE, channels) {
                            Ok(()) => started = true,
                            Err(err) => {
                                error!("pcm sink start failed: {}", err);
                                shared.set_audio_status(Status::Error);
                                continue;
                            }
                        }
                    } else {
                        thread::sleep(AUDIO_POLL_INTERVAL);
                        continue;
                    }
                }

                let wanted = sink.lock().unwrap().wanted();
                if wanted > 0 {
                    let count = {
                        let mut ring = shared.ring.lock().unwrap();
                        if ring.underflow(1) {
                            0
                        } else {
                            let count = wanted.min(ring.len()).min(scratch.len());
                            ring.read(&mut scratch[..count]);
                            count
                        }
                    };
                    if count > 0 {
                        if let Err(err) = sink.lock().unwrap().submit(&scratch[..count]) {
                            error!("pcm submit failed: {}", err);
                            shared.set_audio_status(Status::Error);
                            continue;
                        }
                    }
                }
                thread::sleep(AUDIO_POLL_INTERVAL);
            }
            Status::Null | Status::Ready => thread::sleep(STATUS_POLL_INTERVAL),
        }
    }

    sink.lock().unwrap().stop();
    debug!("audio worker exited");
}

fn video_worker(shared: Arc<Shared>, sink: Arc<Mutex<dyn VideoSink>>, framerate: u32) {
    let mut pacing = PacingClock::new(framerate);
    let mut render_index: usize = 0;

    loop {
        match shared.video_status() {
            Status::Done | Status::Error => break,
            Status::Resuming => shared.set_video_status(Status::Streaming),
            Status::Pausing | Status::Stopping => shared.set_video_status(Status::Ready),
            Status::Streaming => match shared.slots.ready.acquire_timeout(SLOT_WAIT) {
                Acquire::Acquired => {
                    pacing.wait_frame();
                    let slot = render_index & 1;
                    if let Err(err) = sink.lock().unwrap().present(slot) {
                        error!("present failed: {}", err);
                        shared.set_video_status(Status::Error);
                        continue;
                    }
                    pacing.mark();
                    render_index += 1;
                    shared.slots.load.release();
                }
                Acquire::TimedOut => {}
                Acquire::Closed => break,
            },
            Status::Null | Status::Ready => thread::sleep(STATUS_POLL_INTERVAL),
        }
    }

    // unblock the producer if it is waiting on a slot
    shared.slots.close();
    debug!("video worker exited");
}
