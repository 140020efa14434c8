//! Chimebox frontend.
//!
//! Renders the modeled toy: the three indicator LEDs as lamps in a small
//! window, the PWM compare-register history as audio through rodio. The
//! engine runs entirely on virtual time; this loop advances one 60 Hz frame
//! of it per displayed frame, so the toy plays in real time.
//!
//! Two execution modes:
//!
//! - **GUI mode** (default): LED panel + audio. Keys: Space=Pause,
//!   Backspace (hold)=Rewind, M=Mute, F=Filter toggle, D=State dump,
//!   Esc=Quit.
//! - **Headless mode** (`--headless`): no window, no audio device; runs N
//!   frames and prints per-second state lines. Works on machines with no
//!   display at all.
//!
//! The composition itself has no runtime knobs — the flags and keys only
//! select how the host renders it.

use chimebox_core::savestate::ChimeboxState;
use chimebox_core::snapshot::{RewindBuffer, Snapshot};
use chimebox_core::{Chimebox, Led};
use minifb::{Key, Scale, ScaleMode, Window, WindowOptions};
use std::collections::VecDeque;
use std::env;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Audio output sample rate in Hz
const AUDIO_SAMPLE_RATE: u32 = 44100;
/// Output amplitude scale (0.0–1.0)
const AUDIO_VOLUME: f32 = 0.25;
/// LED panel dimensions
const PANEL_WIDTH: usize = 360;
const PANEL_HEIGHT: usize = 160;
/// Frames between rewind snapshots (30 = two per second)
const SNAPSHOT_INTERVAL: u32 = 30;
/// Rewind ring capacity (600 snapshots = 5 minutes)
const REWIND_CAPACITY: usize = 600;

// ─── Audio source ───────────────────────────────────────────────────────────

/// Mono audio source draining PCM rendered by the engine from a shared
/// ring buffer; emits silence when the ring runs dry (pause, mute, rewind).
struct PanelSource {
    ring: Arc<Mutex<VecDeque<f32>>>,
    sample_rate: u32,
}

impl Iterator for PanelSource {
    type Item = f32;
    fn next(&mut self) -> Option<f32> {
        if let Ok(mut ring) = self.ring.try_lock() {
            if let Some(s) = ring.pop_front() {
                return Some(s);
            }
        }
        Some(0.0)
    }
}

impl rodio::Source for PanelSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }
    fn channels(&self) -> u16 {
        1
    }
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

fn setup_audio(
    ring: Arc<Mutex<VecDeque<f32>>>,
) -> Option<(rodio::OutputStream, rodio::OutputStreamHandle, rodio::Sink)> {
    match rodio::OutputStream::try_default() {
        Ok((stream, handle)) => match rodio::Sink::try_new(&handle) {
            Ok(sink) => {
                let source = PanelSource { ring, sample_rate: AUDIO_SAMPLE_RATE };
                sink.append(source);
                Some((stream, handle, sink))
            }
            Err(e) => {
                eprintln!("Warning: audio sink: {}", e);
                None
            }
        },
        Err(e) => {
            eprintln!("Warning: audio device: {}", e);
            None
        }
    }
}

// ─── Panel drawing ──────────────────────────────────────────────────────────

fn shade(color: u32, k: f32) -> u32 {
    let k = k.clamp(0.0, 1.0);
    let r = (((color >> 16) & 0xff) as f32 * k) as u32;
    let g = (((color >> 8) & 0xff) as f32 * k) as u32;
    let b = ((color & 0xff) as f32 * k) as u32;
    (r << 16) | (g << 8) | b
}

fn fill_circle(buf: &mut [u32], cx: i32, cy: i32, r: i32, color: u32) {
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                let x = cx + dx;
                let y = cy + dy;
                if x >= 0 && y >= 0 && (x as usize) < PANEL_WIDTH && (y as usize) < PANEL_HEIGHT {
                    buf[y as usize * PANEL_WIDTH + x as usize] = color;
                }
            }
        }
    }
}

/// Draw the lamp panel: three LEDs, a PWM level meter, and small status
/// glyphs for pause/rewind.
fn draw_panel(buf: &mut [u32], leds: &[f32; 3], pwm: u8, paused: bool, rewinding: bool) {
    for px in buf.iter_mut() {
        *px = 0x0c0c10;
    }

    // Lamps: green, red, blue, brightness-smoothed by the caller
    let colors = [0x30e060u32, 0xe04040, 0x4878f0];
    for (i, &c) in colors.iter().enumerate() {
        let cx = 70 + i as i32 * 110;
        fill_circle(buf, cx, 64, 26, shade(c, 0.10 + 0.90 * leds[i]));
    }

    // PWM level meter along the bottom
    let span = PANEL_WIDTH - 40;
    let fill = pwm as usize * span / 255;
    for y in 124..138 {
        for x in 0..span {
            buf[y * PANEL_WIDTH + 20 + x] = if x < fill { 0xc8c89a } else { 0x26262c };
        }
    }

    if paused {
        // Two vertical bars, top-left
        for y in 10..26 {
            for x in 10..14 {
                buf[y * PANEL_WIDTH + x] = 0xd0d0d0;
            }
            for x in 18..22 {
                buf[y * PANEL_WIDTH + x] = 0xd0d0d0;
            }
        }
    }
    if rewinding {
        // Left-pointing triangle, top-left
        for dy in 0i32..16 {
            let half = (8 - (dy - 8).abs()) * 2;
            for dx in 0..half {
                let x = 10 + dx;
                let y = 10 + dy;
                buf[y as usize * PANEL_WIDTH + x as usize] = 0xd0d0d0;
            }
        }
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn usage(program: &str) {
    eprintln!("Chimebox v0.2.0 - wavetable chime toy");
    eprintln!("Usage: {} [options]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --headless           Run without window or audio device");
    eprintln!("  --frames N           Frames to run in headless mode (default 600)");
    eprintln!("  --mute               Start with audio muted");
    eprintln!("  --no-filter          Disable the speaker-model audio filters");
    eprintln!("  --debug              Show per-frame diagnostics for the first frames");
    eprintln!();
    eprintln!("GUI keys: Space=Pause  Backspace(hold)=Rewind  M=Mute");
    eprintln!("          F=Filter toggle  D=State dump  Esc=Quit");
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut headless = false;
    let mut mute = false;
    let mut debug = false;
    let mut no_filter = false;
    let mut frames: usize = 600;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--headless" => headless = true,
            "--mute" => mute = true,
            "--debug" => debug = true,
            "--no-filter" => no_filter = true,
            "--frames" => {
                i += 1;
                frames = match args.get(i).and_then(|s| s.parse().ok()) {
                    Some(n) => n,
                    None => {
                        eprintln!("--frames needs a number");
                        std::process::exit(1);
                    }
                };
            }
            "-h" | "--help" => {
                usage(&args[0]);
                return;
            }
            other => {
                eprintln!("Unknown option: {}", other);
                usage(&args[0]);
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut cb = Chimebox::new();
    cb.debug = debug;
    if no_filter {
        cb.port.audio.filters_enabled = false;
    }

    if headless {
        run_headless(&mut cb, frames);
    } else {
        run_gui(&mut cb, mute);
    }
}

// ─── GUI mode ───────────────────────────────────────────────────────────────

fn run_gui(cb: &mut Chimebox, start_muted: bool) {
    let mut window = Window::new(
        "Chimebox",
        PANEL_WIDTH,
        PANEL_HEIGHT,
        WindowOptions {
            scale: Scale::X2,
            scale_mode: ScaleMode::AspectRatioStretch,
            resize: true,
            ..Default::default()
        },
    )
    .expect("Failed to create window");
    window.set_target_fps(60);

    let audio_ring: Arc<Mutex<VecDeque<f32>>> =
        Arc::new(Mutex::new(VecDeque::with_capacity(16384)));
    let mut muted = start_muted;
    let mut _audio = if !muted { setup_audio(audio_ring.clone()) } else { None };
    let mut pcm_buf: Vec<f32> = Vec::with_capacity(4096);

    let mut rewind = RewindBuffer::new(REWIND_CAPACITY, SNAPSHOT_INTERVAL);
    let mut buf = vec![0u32; PANEL_WIDTH * PANEL_HEIGHT];
    let mut led_display = [0.0f32; 3];
    let mut paused = false;
    let mut prev_space = false;
    let mut prev_m = false;
    let mut prev_f = false;
    let mut prev_d = false;
    let mut fps_frames: u64 = 0;
    let mut last_fps_time = Instant::now();

    while window.is_open() && !window.is_key_down(Key::Escape) {
        // Pause (Space)
        let space = window.is_key_down(Key::Space);
        if space && !prev_space {
            paused = !paused;
        }
        prev_space = space;

        // Mute (M)
        let m = window.is_key_down(Key::M);
        if m && !prev_m {
            muted = !muted;
            if muted {
                _audio = None;
                if let Ok(mut ring) = audio_ring.lock() {
                    ring.clear();
                }
            } else {
                _audio = setup_audio(audio_ring.clone());
            }
        }
        prev_m = m;

        // Audio filter toggle (F)
        let f = window.is_key_down(Key::F);
        if f && !prev_f {
            cb.port.audio.toggle_filters();
            eprintln!(
                "Audio filters: {}",
                if cb.port.audio.filters_enabled { "on" } else { "off" }
            );
        }
        prev_f = f;

        // State dump (D)
        let d = window.is_key_down(Key::D);
        if d && !prev_d {
            eprintln!(
                "--- {} (rewind: {} snapshots, {} bytes) ---",
                cb.dump_state(),
                rewind.len(),
                rewind.memory_usage()
            );
        }
        prev_d = d;

        // Rewind (hold Backspace): pop one snapshot per displayed frame
        let rewinding = window.is_key_down(Key::Backspace);
        if rewinding {
            if let Some(snap) = rewind.pop() {
                match ChimeboxState::from_bytes(&snap.bytes) {
                    Ok(state) => cb.load_state(&state),
                    Err(e) => eprintln!("Warning: rewind: {}", e),
                }
            }
        } else if !paused {
            cb.run_frame();

            if rewind.tick_frame() {
                match cb.save_state().to_bytes() {
                    Ok(bytes) => rewind.push(Snapshot { frame: cb.frame_count(), bytes }),
                    Err(e) => eprintln!("Warning: snapshot: {}", e),
                }
            }

            if !muted && cb.port.audio.needs_render() {
                cb.port.audio.render_samples(
                    &mut pcm_buf,
                    AUDIO_SAMPLE_RATE,
                    chimebox_core::CLOCK_HZ,
                    AUDIO_VOLUME,
                );
                if let Ok(mut ring) = audio_ring.lock() {
                    // Limit buffer to avoid latency buildup
                    let max_buf = AUDIO_SAMPLE_RATE as usize / 5; // ~200ms
                    if ring.len() < max_buf {
                        ring.extend(pcm_buf.iter());
                    }
                }
            }
        }

        // Smooth the lamp brightness toward the modeled levels
        for led in Led::ALL {
            let target = if cb.port.led(led) { 1.0 } else { 0.0 };
            let disp = &mut led_display[led.index()];
            *disp += (target - *disp) * 0.35;
        }

        draw_panel(&mut buf, &led_display, cb.port.pwm(), paused, rewinding);
        window
            .update_with_buffer(&buf, PANEL_WIDTH, PANEL_HEIGHT)
            .expect("update");

        fps_frames += 1;
        if last_fps_time.elapsed() >= Duration::from_secs(2) {
            let fps = fps_frames as f64 / last_fps_time.elapsed().as_secs_f64();
            let ms = if muted { " [MUTE]" } else { "" };
            let ps = if paused { " [PAUSE]" } else { "" };
            window.set_title(&format!(
                "Chimebox - pass {} - {:.0} FPS{}{}",
                cb.seq.passes() + 1,
                fps,
                ms,
                ps
            ));
            fps_frames = 0;
            last_fps_time = Instant::now();
        }
    }
}

// ─── Headless mode ──────────────────────────────────────────────────────────

fn run_headless(cb: &mut Chimebox, frames: usize) {
    println!(
        "chimebox headless: {} frames ({:.1} s of virtual time)",
        frames,
        frames as f64 / 60.0
    );
    for frame in 1..=frames {
        cb.run_frame();
        if frame % 60 == 0 {
            println!("t={:4}s {}", frame / 60, cb.dump_state());
        }
    }
    println!("--- summary ---");
    println!(
        "ticks={} samples={} wraps={} advances={} passes={}",
        cb.seq.tick(),
        cb.seq.dbg_samples,
        cb.seq.dbg_wraps,
        cb.seq.dbg_advances,
        cb.seq.passes()
    );
    println!("final: {}", cb.dump_state());
}
