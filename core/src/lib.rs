//! A CHIP-8 virtual machine core: memory, registers, timers, a monochrome
//! frame buffer and a 16-key keypad, driven one instruction at a time.
//!
//! Rendering, audio and wall-clock pacing belong to the host.

pub use chip8::{Chip8, Cycle};
pub use error::{Diagnostic, Error, Fault, Result};
pub use input::{Detached, Input};
pub use instruction::Instruction;
pub use state::{FrameBuffer, Keypad, Mode, State};

mod chip8;
pub mod constants;
mod error;
mod input;
mod instruction;
mod opcode;
mod operations;
pub mod state;
