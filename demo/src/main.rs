extern crate roq_rs;

use std::env;
use std::sync::{Arc, Mutex};

use roq_rs::dec::Decoder;

use sdl2::audio::{AudioQueue, AudioSpecDesired};
use sdl2::pixels::Color;
use sdl2::pixels::PixelFormatEnum;
use sdl2::rect::Rect;
use sdl2::{event::Event, render};

fn main() {
    let path = env::args().nth(1).unwrap_or_else(|| "test.roq".to_string());

    let mut decoder = Decoder::with_filename(&path).unwrap();
    decoder.set_loop(true);

    let width = decoder.width();
    let height = decoder.height();
    let stride = decoder.stride();
    let texture_height = decoder.texture_height();
    assert!(width > 0, "stream has no video");

    println!(
        "{}: {}x{} @ {} fps (texture {}x{})",
        path,
        width,
        height,
        decoder.framerate(),
        stride,
        texture_height
    );

    // decoded output lands in shared buffers; the main loop feeds SDL from them
    let frame_buf: Arc<Mutex<Option<Vec<u16>>>> = Arc::new(Mutex::new(None));
    let audio_buf: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));

    {
        let frame_buf = frame_buf.clone();
        decoder.set_video_callback(move |frame| {
            *frame_buf.lock().unwrap() = Some(frame.data.to_vec());
        });
    }

    {
        let audio_buf = audio_buf.clone();
        decoder.set_audio_callback(move |pcm, _channels| {
            let mut buf = audio_buf.lock().unwrap();
            for pair in pcm.chunks_exact(2) {
                buf.push(i16::from_le_bytes([pair[0], pair[1]]));
            }
        });
    }

    let sdl_context = sdl2::init().unwrap();
    let video_subsystem = sdl_context.video().unwrap();
    let audio_subsystem = sdl_context.audio().unwrap();
    let timer_subsystem = sdl_context.timer().unwrap();

    let window = video_subsystem
        .window("RoQ Codec Test", width as u32, height as u32)
        .position_centered()
        .build()
        .unwrap();

    let mut canvas = window.into_canvas().present_vsync().build().unwrap();

    canvas.set_draw_color(Color::RGB(0, 0, 0));
    canvas.clear();
    canvas.present();

    // RoQ audio is always 22050 Hz; open a stereo queue and upmix mono
    let desired_spec = AudioSpecDesired {
        freq: Some(22050),
        channels: Some(2),
        samples: Some(2048),
    };
    let device: AudioQueue<i16> = audio_subsystem.open_queue(None, &desired_spec).unwrap();
    let mut audio_started = false;

    let tex_creator = canvas.texture_creator();
    let mut tex = tex_creator
        .create_texture(
            PixelFormatEnum::RGB565,
            render::TextureAccess::Streaming,
            stride as u32,
            texture_height as u32,
        )
        .unwrap();

    let mut event_pump = sdl_context.event_pump().unwrap();

    let frame_interval = 1.0 / decoder.framerate().max(1) as f64;
    let mut frametimer = timer_subsystem.performance_counter();
    let mut accum = 0.0f64;
    let mut pixel_bytes = vec![0u8; stride * texture_height * 2];

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'running,
                _ => {}
            }
        }

        let new_frametimer = timer_subsystem.performance_counter();
        let delta = (new_frametimer - frametimer) as f64 / timer_subsystem.performance_frequency() as f64;
        frametimer = new_frametimer;

        accum += delta;
        while accum >= frame_interval {
            if !decoder.decode().unwrap() {
                break 'running;
            }
            accum -= frame_interval;
        }

        if let Some(pixels) = frame_buf.lock().unwrap().take() {
            for (bytes, pixel) in pixel_bytes.chunks_exact_mut(2).zip(&pixels) {
                bytes.copy_from_slice(&pixel.to_le_bytes());
            }
            tex.update(None, &pixel_bytes, stride * 2).unwrap();
        }

        {
            let mut buf = audio_buf.lock().unwrap();
            if !buf.is_empty() {
                if decoder.channels() == 1 {
                    let stereo: Vec<i16> = buf.iter().flat_map(|&sample| [sample, sample]).collect();
                    device.queue(&stereo);
                } else {
                    device.queue(&buf);
                }
                buf.clear();
            }
        }

        // let some audio buffer up before starting playback
        if !audio_started && device.size() > 16384 {
            device.resume();
            audio_started = true;
        }

        canvas.clear();
        canvas
            .copy(&tex, Rect::new(0, 0, width as u32, height as u32), None)
            .unwrap();
        canvas.present();
    }
}
