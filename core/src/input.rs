use crate::state::Keypad;

/// A source of keypad snapshots, consulted by the CPU before each instruction.
///
/// Hosts that push key state through `Chip8::set_keypad` or
/// `Chip8::key_press` don't need one and can use `Detached`.
pub trait Input {
    /// Returns the current pressed status of keys 0..F, or `None` when nothing
    /// changed since the last poll.
    fn poll(&mut self) -> Option<Keypad>;
}

/// No injected source; the keypad only changes through the `Chip8` methods.
#[derive(Copy, Clone, Debug, Default)]
pub struct Detached;

impl Input for Detached {
    fn poll(&mut self) -> Option<Keypad> {
        None
    }
}

impl<F> Input for F
where
    F: FnMut() -> Option<Keypad>,
{
    fn poll(&mut self) -> Option<Keypad> {
        self()
    }
}
