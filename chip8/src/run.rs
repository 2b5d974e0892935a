use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use log::info;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;

use chip8_core::constants::TIMER_HZ;
use chip8_core::Chip8;
use chip8_display::Display;

use crate::keymap::keymap;

/// How many frames run back to back while fast-forward is held
const FAST_FORWARD: u32 = 4;

pub struct Settings {
    /// Instructions executed per second
    pub ips: u32,
    /// Size multiplier for each pixel of the window
    pub scale: u32,
}

pub fn run(rom: &Path, settings: Settings) -> anyhow::Result<()> {
    let mut chip8: Chip8 = Chip8::new();

    // Load ROM
    let file = File::open(rom).with_context(|| format!("unable to open {}", rom.display()))?;
    let mut reader = BufReader::new(file);
    chip8
        .load_rom(&mut reader)
        .with_context(|| format!("unable to load {}", rom.display()))?;

    // Get SDL2 context
    let sdl = sdl2::init().map_err(|e| anyhow!(e))?;
    let mut display = Display::new(&sdl, settings.scale)?;
    let mut events = sdl.event_pump().map_err(|e| anyhow!(e))?;

    // Instructions are batched into frames, one timer tick per frame
    let frame_time = Duration::from_secs(1) / TIMER_HZ;
    let steps_per_frame = (settings.ips / TIMER_HZ).max(1);
    info!(
        "Running at {} instructions per second ({} per frame)",
        settings.ips, steps_per_frame
    );

    // Whether or not the frame rate should be respected
    let mut fast_forward = false;

    'event: loop {
        let frame_start = Instant::now();

        // Handle input
        for event in events.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'event,
                Event::KeyDown {
                    keycode: Some(key), ..
                } => match (key, keymap(key)) {
                    (_, Some(kc)) => chip8.key_press(kc)?,
                    (Keycode::Space, _) => fast_forward = true,
                    _ => continue,
                },
                Event::KeyUp {
                    keycode: Some(key), ..
                } => match (key, keymap(key)) {
                    (_, Some(kc)) => chip8.key_release(kc)?,
                    (Keycode::Space, _) => fast_forward = false,
                    _ => continue,
                },
                _ => continue,
            };
        }

        // Update state
        let frames = if fast_forward { FAST_FORWARD } else { 1 };
        for _ in 0..frames {
            for _ in 0..steps_per_frame {
                chip8.step().context("emulation stopped")?;
            }
            chip8.tick();
        }

        // If the draw flag is set, unset it and render the current frame
        if let Some(frame) = chip8.take_frame() {
            display.render(frame)?;
        }

        // Handle timing
        let elapsed = frame_start.elapsed();
        if frame_time > elapsed {
            std::thread::sleep(frame_time - elapsed);
        }
    }

    Ok(())
}
