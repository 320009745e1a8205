//! Emulator entry point.
//!
//! The main thread owns the window: it collects keyboard state into the
//! shared controller snapshot, turns mouse clicks into light-gun pointer
//! events, presents frames from the frame channel, and keeps the audio
//! stream alive. The emulation itself runs on a spawned thread and is joined
//! before teardown.
//! Usage: lumen [--zapper] [--fps N] [--trace] path/to/game.nes

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use ansi_term::Colour::Red;
use clap::Parser;
use crossbeam_channel::Sender;
use log::{info, warn};
use minifb::{Key, MouseButton, MouseMode, Window, WindowOptions};
use rodio::{OutputStream, Source};

use lumen::audio::{RING_CAPACITY, RingSource, audio_ring};
use lumen::bus::NesBus;
use lumen::cartridge::cartridge::Cartridge;
use lumen::controller::{
    BUTTON_A, BUTTON_B, BUTTON_DOWN, BUTTON_LEFT, BUTTON_RIGHT, BUTTON_SELECT, BUTTON_START,
    BUTTON_UP, ControllerState,
};
use lumen::cpu::cpu::CPU;
use lumen::emulator::{Emulator, FrameBudget, PointerEvent};
use lumen::frame::{FRAME_HEIGHT, FRAME_PIXELS, FRAME_WIDTH, frame_channel};

#[derive(Parser)]
#[command(name = "lumen", about = "A threaded NES emulator", version)]
struct Args {
    /// Path to an iNES (.nes) ROM image
    rom: PathBuf,

    /// Connect the light gun to controller port 2
    #[arg(long)]
    zapper: bool,

    /// Target emulation frame rate
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Print a nestest-style CPU trace to stdout
    #[arg(long)]
    trace: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", Red.bold().paint("error:"));
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let cart = Cartridge::load(&args.rom)?;
    info!("loaded {}: {}", args.rom.display(), cart.describe());

    let controllers = ControllerState::new();
    let (frame_tx, frame_rx) = frame_channel();
    let (audio_tx, audio_rx) = audio_ring(RING_CAPACITY);
    let (pointer_tx, pointer_rx) = crossbeam_channel::unbounded();
    let running = Arc::new(AtomicBool::new(true));
    let budget = FrameBudget::new(args.fps);

    let mut cpu = CPU::new(NesBus::new(cart, controllers.clone(), args.zapper));
    cpu.trace = args.trace;
    cpu.reset();

    let mut emulator = Emulator::new(cpu, frame_tx, audio_tx, pointer_rx, budget);
    let emu_running = Arc::clone(&running);
    let emulation = thread::spawn(move || emulator.run(&emu_running));

    // Keep the stream handle alive for the life of the window; the device
    // pulls from the ring on its own cadence and rodio stops on drop. A
    // missing audio device degrades to a silent run rather than an exit.
    let _stream = match OutputStream::try_default() {
        Ok((stream, handle)) => {
            handle.play_raw(RingSource::new(audio_rx).convert_samples())?;
            Some(stream)
        }
        Err(e) => {
            warn!("audio unavailable, continuing without sound: {e}");
            None
        }
    };

    let mut window = Window::new(
        "lumen",
        FRAME_WIDTH,
        FRAME_HEIGHT,
        WindowOptions {
            resize: true,
            scale: minifb::Scale::X2,
            scale_mode: minifb::ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        },
    )?;
    window.set_target_fps(60);

    let mut frame = vec![0u32; FRAME_PIXELS];
    let mut pointer_down = false;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        controllers.set(poll_buttons(&window));
        if args.zapper {
            poll_pointer(&window, &pointer_tx, &mut pointer_down);
        }

        frame_rx.acquire(&mut frame);
        window.update_with_buffer(&frame, FRAME_WIDTH, FRAME_HEIGHT)?;
    }

    running.store(false, Ordering::Release);
    emulation
        .join()
        .map_err(|_| "emulation thread panicked")?;
    Ok(())
}

/// Collect the keyboard into a fresh controller snapshot.
fn poll_buttons(window: &Window) -> u16 {
    const KEYMAP: [(Key, u16); 8] = [
        (Key::X, BUTTON_A),
        (Key::Z, BUTTON_B),
        (Key::RightShift, BUTTON_SELECT),
        (Key::Enter, BUTTON_START),
        (Key::Up, BUTTON_UP),
        (Key::Down, BUTTON_DOWN),
        (Key::Left, BUTTON_LEFT),
        (Key::Right, BUTTON_RIGHT),
    ];
    let mut bits = 0;
    for (key, button) in KEYMAP {
        if window.is_key_down(key) {
            bits |= button;
        }
    }
    bits
}

/// Turn left-button edges into light-gun pointer events, mapping window
/// coordinates into the 256×240 frame space.
fn poll_pointer(window: &Window, events: &Sender<PointerEvent>, pointer_down: &mut bool) {
    let down = window.get_mouse_down(MouseButton::Left);
    if down && !*pointer_down {
        if let Some((x, y)) = frame_coords(window) {
            // Dropped events just mean the emulation thread is gone.
            let _ = events.send(PointerEvent::Down { x, y });
            *pointer_down = true;
        }
    } else if !down && *pointer_down {
        let _ = events.send(PointerEvent::Up);
        *pointer_down = false;
    }
}

fn frame_coords(window: &Window) -> Option<(u8, u8)> {
    let (w, h) = window.get_size();
    if w == 0 || h == 0 {
        return None;
    }
    let (mx, my) = window.get_unscaled_mouse_pos(MouseMode::Discard)?;
    let x = (mx * FRAME_WIDTH as f32 / w as f32).clamp(0.0, 255.0) as u8;
    let y = (my * FRAME_HEIGHT as f32 / h as f32).clamp(0.0, 239.0) as u8;
    Some((x, y))
}
