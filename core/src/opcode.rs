/// # Opcodes
///
/// Chip-8 opcodes are 16 bits each, fetched big-endian from two bytes of memory.
/// The leading nibble selects a family of instructions. Families 0x0, 0x8, 0xE
/// and 0xF share that nibble between several instructions and are told apart by
/// the trailing nibble or byte.
///
/// The remaining nibbles carry operands at fixed positions:
/// - `[_nnn]` a 12-bit address
/// - `[__nn]` an 8-bit constant assigned to and/or compared with Vx
/// - `[___n]` a 4-bit constant (sprite height)
/// - `[_x__]` the register Vx, or the upper bound of the range V0..=Vx
/// - `[__y_]` the register Vy
pub trait Opcode {
    /// The Opcode's component nibbles, most significant first.
    fn nibbles(&self) -> (u8, u8, u8, u8);

    /// The leading nibble.
    /// `[f___]`
    fn family(&self) -> u8;

    /// Index of the register named by the second nibble.
    /// `[_x__]`
    fn x(&self) -> usize;

    /// Index of the register named by the third nibble.
    /// `[__y_]`
    fn y(&self) -> usize;

    /// `[___n]`
    fn n(&self) -> u8;

    /// `[__nn]`
    fn nn(&self) -> u8;

    /// `[_nnn]`
    fn nnn(&self) -> u16;
}

impl Opcode for u16 {
    fn nibbles(&self) -> (u8, u8, u8, u8) {
        (
            self.family(),
            self.x() as u8,
            self.y() as u8,
            self.n(),
        )
    }

    fn family(&self) -> u8 {
        ((self & 0xF000) >> 12) as u8
    }

    fn x(&self) -> usize {
        ((self & 0x0F00) >> 8) as usize
    }

    fn y(&self) -> usize {
        ((self & 0x00F0) >> 4) as usize
    }

    fn n(&self) -> u8 {
        (self & 0x000F) as u8
    }

    fn nn(&self) -> u8 {
        (self & 0x00FF) as u8
    }

    fn nnn(&self) -> u16 {
        self & 0x0FFF
    }
}
