use std::io::Read;

use log::{debug, error, info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::constants::{KEY_COUNT, MAX_ROM_SIZE, MEMORY_SIZE, PROGRAM_START};
use crate::error::{Diagnostic, Error, Fault, Result};
use crate::input::{Detached, Input};
use crate::instruction::Instruction;
use crate::state::{FrameBuffer, Keypad, Mode, State};

type DiagnosticHook = Box<dyn FnMut(&Diagnostic) + Send>;

/// The outcome of a single call to `Chip8::step`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cycle {
    Executed(Instruction),
    /// The opcode names no instruction; it was skipped.
    Unmapped(u16),
    /// Suspended on `FX0A`; nothing was fetched.
    AwaitingKey,
}

/// # Chip-8
/// Chip-8 is a virtual machine and corresponding interpreted language.
///
/// Tracks:
///  - current `state`
///  - the injected `input` source polled before each instruction
///  - the fault that halted execution, if any
///
/// Supplies interfaces for:
/// - loading roms
/// - pressing and releasing keys
/// - stepping the CPU one instruction at a time
/// - advancing its timers
/// - inspecting its frame buffer for rendering by some display
///
/// The host decides how often to `step` (the instruction rate) and calls
/// `tick` at 60Hz. Both take `&mut self` and so never interleave.
pub struct Chip8<I: Input = Detached> {
    state: State,
    input: I,
    rng: StdRng,
    halted: Option<Fault>,
    diagnostic_hook: Option<DiagnosticHook>,
}

impl Chip8 {
    pub fn new() -> Self {
        Chip8::with_input(Detached)
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Input> Chip8<I> {
    /// Creates a Chip-8 that reads its keypad from `input`.
    pub fn with_input(input: I) -> Self {
        Chip8 {
            state: State::new(),
            input,
            rng: StdRng::from_entropy(),
            halted: None,
            diagnostic_hook: None,
        }
    }

    /// Seeds the random number generator behind `CXNN`, making runs repeatable.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Registers a callback for non-fatal conditions such as unmapped opcodes.
    pub fn set_diagnostic_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&Diagnostic) + Send + 'static,
    {
        self.diagnostic_hook = Some(Box::new(hook));
    }

    /// Resets and copies `rom` into memory at 0x200.
    /// A ROM that doesn't fit is rejected and memory is left untouched.
    pub fn load_program(&mut self, rom: &[u8]) -> Result<()> {
        if rom.len() > MAX_ROM_SIZE {
            return Err(Error::OversizedRom { len: rom.len() });
        }
        self.reset();
        let start = PROGRAM_START as usize;
        self.state.memory[start..start + rom.len()].copy_from_slice(rom);
        info!("Loaded ROM [size: {}]", rom.len());
        Ok(())
    }

    /// Load a rom from a source file
    ///
    /// # Arguments
    /// * `reader` a file reader that contains a ROM
    pub fn load_rom(&mut self, reader: &mut dyn Read) -> Result<()> {
        let mut rom = Vec::with_capacity(MAX_ROM_SIZE);
        reader.read_to_end(&mut rom)?;
        self.load_program(&rom)
    }

    /// Restores the power-on state: font loaded, program memory cleared,
    /// PC at 0x200, screen blank. Clears any halting fault.
    pub fn reset(&mut self) {
        self.state = State::new();
        self.halted = None;
    }

    /// Advances the CPU by a single instruction
    /// - does nothing while awaiting a keypress
    /// - polls the input source for a fresh keypad
    /// - gets and executes the next opcode
    ///
    /// A fault halts the CPU; it stays halted until `reset` or `load_program`.
    pub fn step(&mut self) -> Result<Cycle> {
        if let Some(fault) = self.halted {
            return Err(Error::Halted(fault));
        }
        if let Mode::WaitingForKey { .. } = self.state.mode {
            return Ok(Cycle::AwaitingKey);
        }
        if let Some(keypad) = self.input.poll() {
            self.state.keypad = keypad;
        }

        let pc = self.state.pc;
        let op = match self.get_op() {
            Ok(op) => op,
            Err(fault) => return Err(self.halt(fault)),
        };

        let instruction = match Instruction::decode(op) {
            Some(instruction) => instruction,
            None => {
                self.report(Diagnostic::UnmappedOpcode { pc, opcode: op });
                self.state.pc += 0x2;
                return Ok(Cycle::Unmapped(op));
            }
        };

        debug!("{:03X}: {:04X} {}", pc, op, instruction);
        match instruction.execute(&self.state, &mut self.rng) {
            Ok(next) => {
                self.state = next;
                trace!(
                    "v{:02X?} i{:03X} pc{:03X} sp{}",
                    self.state.v,
                    self.state.i,
                    self.state.pc,
                    self.state.sp
                );
                Ok(Cycle::Executed(instruction))
            }
            Err(fault) => Err(self.halt(fault)),
        }
    }

    /// Decrements both timers towards 0; call at 60Hz
    pub fn tick(&mut self) {
        self.state.delay_timer = self.state.delay_timer.saturating_sub(1);
        self.state.sound_timer = self.state.sound_timer.saturating_sub(1);
    }

    /// Whether the sound timer is running and a tone should play
    pub fn sound_active(&self) -> bool {
        self.state.sound_timer > 0
    }

    /// Replaces the pressed status of every key
    pub fn set_keypad(&mut self, keypad: Keypad) {
        self.state.keypad = keypad;
    }

    /// Resumes a CPU suspended on `FX0A`, storing `key` in the waiting
    /// register. Does nothing when no instruction is waiting.
    pub fn notify_key_pressed(&mut self, key: u8) -> Result<()> {
        check_key(key)?;
        if let Mode::WaitingForKey { register } = self.state.mode {
            self.state.v[register as usize] = key;
            self.state.pc += 0x2;
            self.state.mode = Mode::Running;
        }
        Ok(())
    }

    /// Set the pressed status of key, resuming the CPU if it awaits a key
    ///
    /// # Arguments
    /// * `key` the 8-bit representation of the key that was pressed
    pub fn key_press(&mut self, key: u8) -> Result<()> {
        check_key(key)?;
        self.state.keypad[key as usize] = true;
        self.notify_key_pressed(key)
    }

    /// Unset the pressed status of key
    ///
    /// # Arguments
    /// * `key` the 8-bit representation of the key that was released
    pub fn key_release(&mut self, key: u8) -> Result<()> {
        check_key(key)?;
        self.state.keypad[key as usize] = false;
        Ok(())
    }

    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.state.frame_buffer
    }

    /// Returns the FrameBuffer if the display should be redrawn.
    /// Subsequent calls return `None` until the next clear or draw.
    pub fn take_frame(&mut self) -> Option<&FrameBuffer> {
        if self.state.draw_flag {
            self.state.draw_flag = false;
            Some(&self.state.frame_buffer)
        } else {
            None
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// The fault that halted the CPU, if it is halted
    pub fn fault(&self) -> Option<Fault> {
        self.halted
    }

    /// Gets the opcode currently pointed at by the pc.
    /// Memory is stored as bytes, but opcodes are 16 bits so we combine two subsequent bytes.
    fn get_op(&self) -> std::result::Result<u16, Fault> {
        let pc = self.state.pc as usize;
        if pc + 1 >= MEMORY_SIZE {
            return Err(Fault::PcOutOfRange { pc: self.state.pc });
        }
        Ok(u16::from_be_bytes([
            self.state.memory[pc],
            self.state.memory[pc + 1],
        ]))
    }

    fn halt(&mut self, fault: Fault) -> Error {
        error!("{}", fault);
        self.halted = Some(fault);
        Error::Fault(fault)
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        warn!("{:?}", diagnostic);
        if let Some(hook) = self.diagnostic_hook.as_mut() {
            hook(&diagnostic);
        }
    }
}

fn check_key(key: u8) -> Result<()> {
    if key as usize >= KEY_COUNT {
        return Err(Error::InvalidKey(key));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SPRITE_SHEET;
    use std::sync::{Arc, Mutex};

    fn with_program(program: &[u8]) -> Chip8 {
        let mut chip8 = Chip8::new().with_seed(1);
        chip8.load_program(program).unwrap();
        chip8
    }

    #[test]
    fn test_chip8_gets_op() {
        let mut chip8 = Chip8::new();
        chip8.state.memory[0x200..0x202].copy_from_slice(&[0xAA, 0xBB]);
        assert_eq!(chip8.get_op(), Ok(0xAABB));
    }

    #[test]
    fn test_fetch_past_memory_halts() {
        let mut chip8 = with_program(&[0x1F, 0xFF]);
        chip8.step().unwrap();
        assert_eq!(chip8.state.pc, 0xFFF);
        assert!(matches!(
            chip8.step(),
            Err(Error::Fault(Fault::PcOutOfRange { pc: 0xFFF }))
        ));
    }

    #[test]
    fn test_jump_on_fresh_engine() {
        let mut chip8 = with_program(&[0x12, 0x42]);
        let cycle = chip8.step().unwrap();
        assert_eq!(cycle, Cycle::Executed(Instruction::Jp(0x242)));
        assert_eq!(chip8.state.pc, 0x242);
    }

    #[test]
    fn test_load_register_advances_pc() {
        let mut chip8 = with_program(&[0x6A, 0x3B]);
        chip8.step().unwrap();
        assert_eq!(chip8.state.v[0xA], 0x3B);
        assert_eq!(chip8.state.pc, 0x202);
    }

    #[test]
    fn test_waits_for_key_until_notified() {
        let mut chip8 = with_program(&[0xF3, 0x0A]);
        chip8.step().unwrap();
        assert_eq!(chip8.mode(), Mode::WaitingForKey { register: 0x3 });
        for _ in 0..10 {
            assert_eq!(chip8.step().unwrap(), Cycle::AwaitingKey);
            assert_eq!(chip8.state.pc, 0x200);
        }
        chip8.notify_key_pressed(4).unwrap();
        assert_eq!(chip8.mode(), Mode::Running);
        assert_eq!(chip8.state.v[0x3], 4);
        assert_eq!(chip8.state.pc, 0x202);
    }

    #[test]
    fn test_captures_key_presses() {
        let mut chip8 = with_program(&[0xF1, 0x0A]);
        chip8.step().unwrap();
        chip8.key_press(0xE).unwrap();
        assert_eq!(chip8.mode(), Mode::Running);
        assert_eq!(chip8.state.v[0x1], 0xE);
        assert!(chip8.state.keypad[0xE]);
        chip8.key_release(0xE).unwrap();
        assert!(!chip8.state.keypad[0xE]);
    }

    #[test]
    fn test_notify_without_wait_is_ignored() {
        let mut chip8 = with_program(&[0x00, 0xE0]);
        chip8.notify_key_pressed(0x5).unwrap();
        assert_eq!(chip8.state.pc, 0x200);
        assert_eq!(chip8.state.v, [0; 16]);
    }

    #[test]
    fn test_rejects_keys_off_the_pad() {
        let mut chip8 = Chip8::new();
        assert!(matches!(chip8.key_press(0x10), Err(Error::InvalidKey(0x10))));
        assert!(matches!(
            chip8.notify_key_pressed(0xFF),
            Err(Error::InvalidKey(0xFF))
        ));
    }

    #[test]
    fn test_unmapped_opcode_is_skipped_and_reported() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut chip8 = with_program(&[0x01, 0x23, 0x60, 0x07]);
        chip8.set_diagnostic_hook(move |d| sink.lock().unwrap().push(*d));

        assert_eq!(chip8.step().unwrap(), Cycle::Unmapped(0x0123));
        assert_eq!(chip8.state.pc, 0x202);
        chip8.step().unwrap();
        assert_eq!(chip8.state.v[0x0], 0x07);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Diagnostic::UnmappedOpcode {
                pc: 0x200,
                opcode: 0x0123
            }]
        );
    }

    #[test]
    fn test_stack_overflow_halts() {
        // 0x200: CALL 0x200, recursing forever
        let mut chip8 = with_program(&[0x22, 0x00]);
        for _ in 0..16 {
            chip8.step().unwrap();
        }
        assert!(matches!(
            chip8.step(),
            Err(Error::Fault(Fault::StackOverflow { pc: 0x200 }))
        ));
        assert_eq!(chip8.state.pc, 0x200);
        assert_eq!(chip8.fault(), Some(Fault::StackOverflow { pc: 0x200 }));
        assert!(matches!(chip8.step(), Err(Error::Halted(_))));
    }

    #[test]
    fn test_stack_underflow_halts_until_reset() {
        let mut chip8 = with_program(&[0x00, 0xEE]);
        assert!(matches!(
            chip8.step(),
            Err(Error::Fault(Fault::StackUnderflow { pc: 0x200 }))
        ));
        assert!(matches!(chip8.step(), Err(Error::Halted(_))));
        assert!(chip8.is_halted());
        chip8.reset();
        assert!(!chip8.is_halted());
        assert_eq!(chip8.fault(), None);
    }

    #[test]
    fn test_subroutine_round_trip() {
        // 0x200: CALL 0x206; 0x202: LD V1, 0x02; 0x204: JP 0x204
        // 0x206: LD V0, 0x01; 0x208: RET
        let mut chip8 = with_program(&[0x22, 0x06, 0x61, 0x02, 0x12, 0x04, 0x60, 0x01, 0x00, 0xEE]);
        for _ in 0..4 {
            chip8.step().unwrap();
        }
        assert_eq!(chip8.state.v[0x0], 0x01);
        assert_eq!(chip8.state.v[0x1], 0x02);
        assert_eq!(chip8.state.pc, 0x204);
        assert_eq!(chip8.state.sp, 0);
    }

    #[test]
    fn test_load_program_round_trip() {
        let rom: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let chip8 = with_program(&rom);
        assert_eq!(chip8.state.memory[0x200..0x200 + rom.len()], rom[..]);
    }

    #[test]
    fn test_load_program_accepts_full_program_memory() {
        let rom = vec![0xAB; MAX_ROM_SIZE];
        let chip8 = with_program(&rom);
        assert_eq!(chip8.state.memory[0xFFF], 0xAB);
    }

    #[test]
    fn test_load_program_rejects_oversized_rom() {
        let mut chip8 = with_program(&[0x12, 0x34]);
        let rom = vec![0; MAX_ROM_SIZE + 1];
        assert!(matches!(
            chip8.load_program(&rom),
            Err(Error::OversizedRom { len }) if len == MAX_ROM_SIZE + 1
        ));
        assert_eq!(chip8.state.memory[0x200..0x202], [0x12, 0x34]);
    }

    #[test]
    fn test_load_rom_from_reader() {
        let mut chip8 = Chip8::new();
        let mut reader: &[u8] = &[0x00, 0xE0];
        chip8.load_rom(&mut reader).unwrap();
        assert_eq!(chip8.state.memory[0x200..0x202], [0x00, 0xE0]);
    }

    #[test]
    fn test_reset_restores_power_on_state() {
        let mut chip8 = with_program(&[0x60, 0x05, 0xD0, 0x05]);
        chip8.step().unwrap();
        chip8.step().unwrap();
        chip8.reset();
        assert_eq!(chip8.state.pc, 0x200);
        assert_eq!(chip8.state.v, [0; 16]);
        assert_eq!(chip8.state.memory[0x000..0x050], SPRITE_SHEET);
        assert!(chip8.state.memory[0x200..].iter().all(|&b| b == 0));
        assert!(chip8.frame_buffer().iter().flatten().all(|&p| !p));
    }

    #[test]
    fn test_tick_floors_timers_at_zero() {
        let mut chip8 = Chip8::new();
        chip8.state.delay_timer = 2;
        chip8.state.sound_timer = 1;
        assert!(chip8.sound_active());
        chip8.tick();
        assert_eq!((chip8.state.delay_timer, chip8.state.sound_timer), (1, 0));
        assert!(!chip8.sound_active());
        chip8.tick();
        chip8.tick();
        assert_eq!((chip8.state.delay_timer, chip8.state.sound_timer), (0, 0));
    }

    #[test]
    fn test_take_frame_once_per_draw() {
        let mut chip8 = with_program(&[0x00, 0xE0, 0x00, 0xE0]);
        assert!(chip8.take_frame().is_none());
        chip8.step().unwrap();
        assert!(chip8.take_frame().is_some());
        assert!(chip8.take_frame().is_none());
        chip8.step().unwrap();
        assert!(chip8.take_frame().is_some());
    }

    #[test]
    fn test_polls_injected_input_before_each_instruction() {
        // 0x200: LD V0, 0x7; 0x202: SKP V0; 0x204: LD V1, 0x1; 0x206: LD V2, 0x2
        let program = [0x60, 0x07, 0xE0, 0x9E, 0x61, 0x01, 0x62, 0x02];
        let mut polls = 0;
        let input = move || {
            polls += 1;
            let mut keypad = [false; KEY_COUNT];
            keypad[0x7] = polls >= 2;
            Some(keypad)
        };
        let mut chip8 = Chip8::with_input(input).with_seed(1);
        chip8.load_program(&program).unwrap();
        chip8.step().unwrap();
        chip8.step().unwrap();
        assert_eq!(chip8.state.pc, 0x206);
        chip8.step().unwrap();
        assert_eq!(chip8.state.v[0x1], 0x0);
        assert_eq!(chip8.state.v[0x2], 0x2);
    }

    #[test]
    fn test_set_keypad_feeds_skips() {
        // 0x200: SKNP V0
        let mut chip8 = with_program(&[0xE0, 0xA1]);
        let mut keypad = [false; KEY_COUNT];
        keypad[0x0] = true;
        chip8.set_keypad(keypad);
        chip8.step().unwrap();
        assert_eq!(chip8.state.pc, 0x202);
    }

    #[test]
    fn test_seeded_rnd_is_repeatable() {
        let run = || {
            let mut chip8 = with_program(&[0xC0, 0xFF]);
            chip8.step().unwrap();
            chip8.state.v[0x0]
        };
        assert_eq!(run(), run());
    }
}
