use thiserror::Error;

use crate::constants::MAX_ROM_SIZE;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the host by the `Chip8` control surface.
#[derive(Debug, Error)]
pub enum Error {
    #[error("ROM is {len} bytes but at most {max} bytes fit in program memory", max = MAX_ROM_SIZE)]
    OversizedRom { len: usize },
    #[error("failed to read ROM: {0}")]
    Io(#[from] std::io::Error),
    #[error("key {0:#X} is not on the keypad")]
    InvalidKey(u8),
    #[error(transparent)]
    Fault(#[from] Fault),
    #[error("emulation halted by an earlier fault: {0}")]
    Halted(Fault),
}

/// Conditions that stop execution. The engine refuses to step again until it
/// is reset or a new program is loaded.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("call at {pc:#05X} exceeds the maximum stack depth")]
    StackOverflow { pc: u16 },
    #[error("return at {pc:#05X} with an empty call stack")]
    StackUnderflow { pc: u16 },
    #[error("instruction at {pc:#05X} accesses {len} bytes from {addr:#05X}, past the end of memory")]
    MemoryOutOfRange { pc: u16, addr: u16, len: u16 },
    #[error("program counter {pc:#05X} is outside addressable memory")]
    PcOutOfRange { pc: u16 },
}

/// Conditions reported to the diagnostic hook without stopping execution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// No instruction matches `opcode`; it was skipped.
    UnmappedOpcode { pc: u16, opcode: u16 },
}
