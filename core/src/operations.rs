//! One pure function per instruction. Each takes the current state and the
//! operands decoded from the opcode and returns the next state.
//!
//! Every handler moves the program counter itself: +2 past an ordinary
//! instruction, +4 when a skip is taken, or to an absolute address for jumps,
//! calls and returns.
use std::ops::Range;

use crate::constants::{
    DISPLAY_HEIGHT, DISPLAY_WIDTH, FONT_START, GLYPH_SIZE, MEMORY_SIZE, STACK_DEPTH,
};
use crate::error::Fault;
use crate::state::{Mode, State};

/// Address mask for the 12 significant bits of I and PC.
const ADDRESS_MASK: u16 = 0x0FFF;

/// Bounds-checks `len` bytes of memory starting at I.
/// Any access reaching past the end of memory is a fault.
fn memory_at_i(state: &State, len: u16) -> Result<Range<usize>, Fault> {
    let start = state.i as usize;
    let end = start + len as usize;
    if end > MEMORY_SIZE {
        return Err(Fault::MemoryOutOfRange {
            pc: state.pc,
            addr: state.i,
            len,
        });
    }
    Ok(start..end)
}

/// if condition then pc += 4 else pc += 2
fn skip_if(state: &State, condition: bool) -> State {
    let pc = if condition {
        state.pc + 0x4
    } else {
        state.pc + 0x2
    };
    State { pc, ..*state }
}

fn is_pressed(state: &State, key: u8) -> bool {
    state.keypad.get(key as usize).copied().unwrap_or(false)
}

/// clear
pub fn clr(state: &State) -> State {
    State {
        pc: state.pc + 0x2,
        frame_buffer: [[false; DISPLAY_WIDTH]; DISPLAY_HEIGHT],
        draw_flag: true,
        ..*state
    }
}

/// PC = STACK.pop()
pub fn rts(state: &State) -> Result<State, Fault> {
    if state.sp == 0 {
        return Err(Fault::StackUnderflow { pc: state.pc });
    }
    let sp = state.sp - 0x1;
    Ok(State {
        pc: state.stack[sp as usize],
        sp,
        ..*state
    })
}

/// PC = addr
pub fn jump(state: &State, addr: u16) -> State {
    State {
        pc: addr,
        ..*state
    }
}

/// STACK.push(PC + 2); PC = addr
pub fn call(state: &State, addr: u16) -> Result<State, Fault> {
    if state.sp as usize == STACK_DEPTH {
        return Err(Fault::StackOverflow { pc: state.pc });
    }
    let mut stack = state.stack;
    stack[state.sp as usize] = state.pc + 0x2;
    Ok(State {
        pc: addr,
        sp: state.sp + 0x1,
        stack,
        ..*state
    })
}

/// if Vx == nn then skip
pub fn ske(state: &State, x: usize, nn: u8) -> State {
    skip_if(state, state.v[x] == nn)
}

/// if Vx != nn then skip
pub fn skne(state: &State, x: usize, nn: u8) -> State {
    skip_if(state, state.v[x] != nn)
}

/// if Vx == Vy then skip
pub fn skre(state: &State, x: usize, y: usize) -> State {
    skip_if(state, state.v[x] == state.v[y])
}

/// Vx = nn
pub fn load(state: &State, x: usize, nn: u8) -> State {
    let mut v = state.v;
    v[x] = nn;
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// Vx += nn
/// Overflow wraps and VF is left alone
pub fn add(state: &State, x: usize, nn: u8) -> State {
    let mut v = state.v;
    v[x] = v[x].wrapping_add(nn);
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// Vx = Vy
pub fn mv(state: &State, x: usize, y: usize) -> State {
    let mut v = state.v;
    v[x] = v[y];
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// Vx |= Vy
pub fn or(state: &State, x: usize, y: usize) -> State {
    let mut v = state.v;
    v[x] |= v[y];
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// Vx &= Vy
pub fn and(state: &State, x: usize, y: usize) -> State {
    let mut v = state.v;
    v[x] &= v[y];
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// Vx ^= Vy
pub fn xor(state: &State, x: usize, y: usize) -> State {
    let mut v = state.v;
    v[x] ^= v[y];
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// Vx += Vy; VF = carry
pub fn add_carry(state: &State, x: usize, y: usize) -> State {
    let (res, carry) = state.v[x].overflowing_add(state.v[y]);
    let mut v = state.v;
    v[x] = res;
    v[0xF] = u8::from(carry);
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// Vx -= Vy; VF = !borrow
pub fn sub(state: &State, x: usize, y: usize) -> State {
    let (res, borrow) = state.v[x].overflowing_sub(state.v[y]);
    let mut v = state.v;
    v[x] = res;
    v[0xF] = u8::from(!borrow);
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// Vx >>= 1; VF = shifted out bit
pub fn shr(state: &State, x: usize) -> State {
    let mut v = state.v;
    let lsb = v[x] & 0x1;
    v[x] >>= 1;
    v[0xF] = lsb;
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// Vx = Vy - Vx; VF = !borrow
pub fn subn(state: &State, x: usize, y: usize) -> State {
    let (res, borrow) = state.v[y].overflowing_sub(state.v[x]);
    let mut v = state.v;
    v[x] = res;
    v[0xF] = u8::from(!borrow);
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// Vx <<= 1; VF = shifted out bit
pub fn shl(state: &State, x: usize) -> State {
    let mut v = state.v;
    let msb = v[x] >> 7;
    v[x] <<= 1;
    v[0xF] = msb;
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// if Vx != Vy then skip
pub fn skrne(state: &State, x: usize, y: usize) -> State {
    skip_if(state, state.v[x] != state.v[y])
}

/// I = addr
pub fn loadi(state: &State, addr: u16) -> State {
    State {
        pc: state.pc + 0x2,
        i: addr,
        ..*state
    }
}

/// PC = V0 + addr, wrapping within memory
pub fn jumpi(state: &State, addr: u16) -> State {
    State {
        pc: (u16::from(state.v[0x0]) + addr) & ADDRESS_MASK,
        ..*state
    }
}

/// Vx = random_byte & nn
pub fn rand(state: &State, x: usize, nn: u8, random_byte: u8) -> State {
    let mut v = state.v;
    v[x] = random_byte & nn;
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// draw_sprite(x=Vx y=Vy size=n)
/// XORs the sprite in memory I..I+n onto the FrameBuffer at (Vx, Vy), wrapping
/// around both edges. VF is set if any lit pixel is erased.
pub fn draw(state: &State, x: usize, y: usize, n: u8) -> Result<State, Fault> {
    let sprite = &state.memory[memory_at_i(state, u16::from(n))?];
    let mut frame_buffer = state.frame_buffer;
    let mut collision = false;

    for (row, byte) in sprite.iter().enumerate() {
        let py = (state.v[y] as usize + row) % DISPLAY_HEIGHT;
        for bit in 0..8 {
            if byte & (0x80 >> bit) == 0 {
                continue;
            }
            let px = (state.v[x] as usize + bit) % DISPLAY_WIDTH;
            let pixel = &mut frame_buffer[py][px];
            collision |= *pixel;
            *pixel = !*pixel;
        }
    }

    let mut v = state.v;
    v[0xF] = u8::from(collision);
    Ok(State {
        pc: state.pc + 0x2,
        draw_flag: true,
        v,
        frame_buffer,
        ..*state
    })
}

/// if key Vx is pressed then skip
pub fn skpr(state: &State, x: usize) -> State {
    skip_if(state, is_pressed(state, state.v[x]))
}

/// if key Vx is not pressed then skip
pub fn skup(state: &State, x: usize) -> State {
    skip_if(state, !is_pressed(state, state.v[x]))
}

/// Vx = DT
pub fn moved(state: &State, x: usize) -> State {
    let mut v = state.v;
    v[x] = state.delay_timer;
    State {
        pc: state.pc + 0x2,
        v,
        ..*state
    }
}

/// await keypress for Vx
/// The PC stays put; it moves on once the key arrives.
pub fn keyd(state: &State, x: usize) -> State {
    State {
        mode: Mode::WaitingForKey { register: x as u8 },
        ..*state
    }
}

/// DT = Vx
pub fn loadd(state: &State, x: usize) -> State {
    State {
        pc: state.pc + 0x2,
        delay_timer: state.v[x],
        ..*state
    }
}

/// ST = Vx
pub fn loads(state: &State, x: usize) -> State {
    State {
        pc: state.pc + 0x2,
        sound_timer: state.v[x],
        ..*state
    }
}

/// I += Vx, wrapping within memory; VF is left alone
pub fn addi(state: &State, x: usize) -> State {
    State {
        pc: state.pc + 0x2,
        i: (state.i + u16::from(state.v[x])) & ADDRESS_MASK,
        ..*state
    }
}

/// I = address of the font glyph for Vx
pub fn ldspr(state: &State, x: usize) -> State {
    State {
        pc: state.pc + 0x2,
        i: FONT_START + u16::from(state.v[x]) * GLYPH_SIZE,
        ..*state
    }
}

/// mem[I..I+3] = bcd(Vx)
pub fn bcd(state: &State, x: usize) -> Result<State, Fault> {
    let value = state.v[x];
    let digits = [value / 100, value / 10 % 10, value % 10];
    let mut memory = state.memory;
    memory[memory_at_i(state, 3)?].copy_from_slice(&digits);
    Ok(State {
        pc: state.pc + 0x2,
        memory,
        ..*state
    })
}

/// mem[I..=I+x] = V0..=Vx
pub fn stor(state: &State, x: usize) -> Result<State, Fault> {
    let mut memory = state.memory;
    memory[memory_at_i(state, x as u16 + 1)?].copy_from_slice(&state.v[..=x]);
    Ok(State {
        pc: state.pc + 0x2,
        memory,
        ..*state
    })
}

/// V0..=Vx = mem[I..=I+x]
pub fn read(state: &State, x: usize) -> Result<State, Fault> {
    let mut v = state.v;
    v[..=x].copy_from_slice(&state.memory[memory_at_i(state, x as u16 + 1)?]);
    Ok(State {
        pc: state.pc + 0x2,
        v,
        ..*state
    })
}
