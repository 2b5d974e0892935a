use std::fmt;

use ::rand::{Rng, RngCore};

use crate::error::Fault;
use crate::opcode::Opcode;
use crate::operations::*;
use crate::state::State;

/// A decoded Chip-8 instruction with its operands.
///
/// Register operands are indices into V0..VF, addresses are 12-bit.
/// Variants follow the conventional assembler mnemonics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    Cls,
    /// 00EE
    Ret,
    /// 1NNN
    Jp(u16),
    /// 2NNN
    Call(u16),
    /// 3XNN
    SeByte(usize, u8),
    /// 4XNN
    SneByte(usize, u8),
    /// 5XY0
    SeReg(usize, usize),
    /// 6XNN
    LdByte(usize, u8),
    /// 7XNN
    AddByte(usize, u8),
    /// 8XY0
    LdReg(usize, usize),
    /// 8XY1
    Or(usize, usize),
    /// 8XY2
    And(usize, usize),
    /// 8XY3
    Xor(usize, usize),
    /// 8XY4
    AddReg(usize, usize),
    /// 8XY5
    Sub(usize, usize),
    /// 8XY6
    Shr(usize),
    /// 8XY7
    Subn(usize, usize),
    /// 8XYE
    Shl(usize),
    /// 9XY0
    SneReg(usize, usize),
    /// ANNN
    LdI(u16),
    /// BNNN
    JpV0(u16),
    /// CXNN
    Rnd(usize, u8),
    /// DXYN
    Drw(usize, usize, u8),
    /// EX9E
    Skp(usize),
    /// EXA1
    Sknp(usize),
    /// FX07
    LdVxDt(usize),
    /// FX0A
    LdVxK(usize),
    /// FX15
    LdDtVx(usize),
    /// FX18
    LdStVx(usize),
    /// FX1E
    AddI(usize),
    /// FX29
    LdF(usize),
    /// FX33
    LdB(usize),
    /// FX55
    LdIVx(usize),
    /// FX65
    LdVxI(usize),
}

impl Instruction {
    /// Selects the Instruction for an opcode by its leading nibble.
    /// Returns `None` for opcodes that name no instruction.
    pub fn decode(op: u16) -> Option<Self> {
        use Instruction::*;

        let instruction = match op.family() {
            0x0 => return Self::decode_system(op),
            0x1 => Jp(op.nnn()),
            0x2 => Call(op.nnn()),
            0x3 => SeByte(op.x(), op.nn()),
            0x4 => SneByte(op.x(), op.nn()),
            0x5 if op.n() == 0x0 => SeReg(op.x(), op.y()),
            0x6 => LdByte(op.x(), op.nn()),
            0x7 => AddByte(op.x(), op.nn()),
            0x8 => return Self::decode_alu(op),
            0x9 if op.n() == 0x0 => SneReg(op.x(), op.y()),
            0xA => LdI(op.nnn()),
            0xB => JpV0(op.nnn()),
            0xC => Rnd(op.x(), op.nn()),
            0xD => Drw(op.x(), op.y(), op.n()),
            0xE => return Self::decode_key(op),
            0xF => return Self::decode_misc(op),
            _ => return None,
        };
        Some(instruction)
    }

    /// 0x0 family: only the fixed opcodes 00E0 and 00EE.
    fn decode_system(op: u16) -> Option<Self> {
        match op {
            0x00E0 => Some(Instruction::Cls),
            0x00EE => Some(Instruction::Ret),
            _ => None,
        }
    }

    /// 0x8 family: register arithmetic, selected by the trailing nibble.
    fn decode_alu(op: u16) -> Option<Self> {
        use Instruction::*;

        let (x, y) = (op.x(), op.y());
        match op.n() {
            0x0 => Some(LdReg(x, y)),
            0x1 => Some(Or(x, y)),
            0x2 => Some(And(x, y)),
            0x3 => Some(Xor(x, y)),
            0x4 => Some(AddReg(x, y)),
            0x5 => Some(Sub(x, y)),
            0x6 => Some(Shr(x)),
            0x7 => Some(Subn(x, y)),
            0xE => Some(Shl(x)),
            _ => None,
        }
    }

    /// 0xE family: keypad skips, selected by the trailing byte.
    fn decode_key(op: u16) -> Option<Self> {
        match op.nn() {
            0x9E => Some(Instruction::Skp(op.x())),
            0xA1 => Some(Instruction::Sknp(op.x())),
            _ => None,
        }
    }

    /// 0xF family: timers, I register and memory, selected by the trailing byte.
    fn decode_misc(op: u16) -> Option<Self> {
        use Instruction::*;

        let x = op.x();
        match op.nn() {
            0x07 => Some(LdVxDt(x)),
            0x0A => Some(LdVxK(x)),
            0x15 => Some(LdDtVx(x)),
            0x18 => Some(LdStVx(x)),
            0x1E => Some(AddI(x)),
            0x29 => Some(LdF(x)),
            0x33 => Some(LdB(x)),
            0x55 => Some(LdIVx(x)),
            0x65 => Some(LdVxI(x)),
            _ => None,
        }
    }

    /// Applies the instruction to `state`, returning the next state.
    /// `rng` supplies the random byte for `Rnd`.
    pub fn execute(self, state: &State, rng: &mut dyn RngCore) -> Result<State, Fault> {
        use Instruction::*;

        let next = match self {
            Cls => clr(state),
            Ret => rts(state)?,
            Jp(addr) => jump(state, addr),
            Call(addr) => call(state, addr)?,
            SeByte(x, nn) => ske(state, x, nn),
            SneByte(x, nn) => skne(state, x, nn),
            SeReg(x, y) => skre(state, x, y),
            LdByte(x, nn) => load(state, x, nn),
            AddByte(x, nn) => add(state, x, nn),
            LdReg(x, y) => mv(state, x, y),
            Or(x, y) => or(state, x, y),
            And(x, y) => and(state, x, y),
            Xor(x, y) => xor(state, x, y),
            AddReg(x, y) => add_carry(state, x, y),
            Sub(x, y) => sub(state, x, y),
            Shr(x) => shr(state, x),
            Subn(x, y) => subn(state, x, y),
            Shl(x) => shl(state, x),
            SneReg(x, y) => skrne(state, x, y),
            LdI(addr) => loadi(state, addr),
            JpV0(addr) => jumpi(state, addr),
            Rnd(x, nn) => rand(state, x, nn, rng.gen()),
            Drw(x, y, n) => draw(state, x, y, n)?,
            Skp(x) => skpr(state, x),
            Sknp(x) => skup(state, x),
            LdVxDt(x) => moved(state, x),
            LdVxK(x) => keyd(state, x),
            LdDtVx(x) => loadd(state, x),
            LdStVx(x) => loads(state, x),
            AddI(x) => addi(state, x),
            LdF(x) => ldspr(state, x),
            LdB(x) => bcd(state, x)?,
            LdIVx(x) => stor(state, x)?,
            LdVxI(x) => read(state, x)?,
        };
        Ok(next)
    }
}

/// Assembler-style listing, e.g. `LD V1, 0x22`.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        match *self {
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Jp(addr) => write!(f, "JP {:#05X}", addr),
            Call(addr) => write!(f, "CALL {:#05X}", addr),
            SeByte(x, nn) => write!(f, "SE V{:X}, {:#04X}", x, nn),
            SneByte(x, nn) => write!(f, "SNE V{:X}, {:#04X}", x, nn),
            SeReg(x, y) => write!(f, "SE V{:X}, V{:X}", x, y),
            LdByte(x, nn) => write!(f, "LD V{:X}, {:#04X}", x, nn),
            AddByte(x, nn) => write!(f, "ADD V{:X}, {:#04X}", x, nn),
            LdReg(x, y) => write!(f, "LD V{:X}, V{:X}", x, y),
            Or(x, y) => write!(f, "OR V{:X}, V{:X}", x, y),
            And(x, y) => write!(f, "AND V{:X}, V{:X}", x, y),
            Xor(x, y) => write!(f, "XOR V{:X}, V{:X}", x, y),
            AddReg(x, y) => write!(f, "ADD V{:X}, V{:X}", x, y),
            Sub(x, y) => write!(f, "SUB V{:X}, V{:X}", x, y),
            Shr(x) => write!(f, "SHR V{:X}", x),
            Subn(x, y) => write!(f, "SUBN V{:X}, V{:X}", x, y),
            Shl(x) => write!(f, "SHL V{:X}", x),
            SneReg(x, y) => write!(f, "SNE V{:X}, V{:X}", x, y),
            LdI(addr) => write!(f, "LD I, {:#05X}", addr),
            JpV0(addr) => write!(f, "JP V0, {:#05X}", addr),
            Rnd(x, nn) => write!(f, "RND V{:X}, {:#04X}", x, nn),
            Drw(x, y, n) => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            Skp(x) => write!(f, "SKP V{:X}", x),
            Sknp(x) => write!(f, "SKNP V{:X}", x),
            LdVxDt(x) => write!(f, "LD V{:X}, DT", x),
            LdVxK(x) => write!(f, "LD V{:X}, K", x),
            LdDtVx(x) => write!(f, "LD DT, V{:X}", x),
            LdStVx(x) => write!(f, "LD ST, V{:X}", x),
            AddI(x) => write!(f, "ADD I, V{:X}", x),
            LdF(x) => write!(f, "LD F, V{:X}", x),
            LdB(x) => write!(f, "LD B, V{:X}", x),
            LdIVx(x) => write!(f, "LD [I], V{:X}", x),
            LdVxI(x) => write!(f, "LD V{:X}, [I]", x),
        }
    }
}
