use num_enum::{IntoPrimitive, TryFromPrimitive, UnsafeFromPrimitive};
use static_assertions::const_assert;

use crate::nibble_ints::{U4, U8Nibble};

/// The number of keys on the hexadecimal keypad.
pub const KEY_COUNT: usize = 16;

/// A key as recognized by the CHIP-8 processor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    TryFromPrimitive,
    IntoPrimitive,
    UnsafeFromPrimitive,
)]
#[repr(u8)]
pub enum Key {
    K0,
    K1,
    K2,
    K3,
    K4,
    K5,
    K6,
    K7,
    K8,
    K9,
    KA,
    KB,
    KC,
    KD,
    KE,
    KF,
}

const_assert!(KEY_COUNT == U4::MAX.into_u8() as usize + 1);

impl From<Key> for U4 {
    fn from(key: Key) -> Self {
        // The discriminant fits in the low nibble,
        // Key has exactly U4::MAX + 1 variants.
        U4::from_u8(key as u8, U8Nibble::Lo)
    }
}

impl From<U4> for Key {
    fn from(val: U4) -> Self {
        // SAFETY: Key has exactly U4::MAX + 1 variants.
        unsafe { Key::from_unchecked(val.into_u8()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    NotPressed,
}

impl Default for KeyState {
    fn default() -> Self {
        Self::NotPressed
    }
}

/// Pressed-state snapshot of the 16-key hexadecimal keypad.
///
/// The host owns the mapping from physical input to the 16 digits and mutates
/// this map through key events. Instructions only read it, except for the
/// wait-for-key latch, which releases every key after reading one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keypad {
    key_states: [KeyState; KEY_COUNT],
}

impl Keypad {
    /// Get the state of a key.
    pub const fn get(&self, key: Key) -> KeyState {
        self.key_states[key as u8 as usize]
    }

    /// Set the state of a key.
    pub fn set(&mut self, key: Key, state: KeyState) {
        self.key_states[key as u8 as usize] = state;
    }

    /// Whether a key is currently held down.
    pub fn is_down(&self, key: Key) -> bool {
        self.get(key) == KeyState::Pressed
    }

    /// The lowest-numbered key that is currently held down, if any.
    pub fn first_pressed(&self) -> Option<Key> {
        self.key_states
            .iter()
            .position(|&state| state == KeyState::Pressed)
            // SAFETY: position indexes the 16-entry state array.
            .map(|i| unsafe { Key::from_unchecked(i as u8) })
    }

    /// Mark every key as released.
    pub fn release_all(&mut self) {
        self.key_states = [KeyState::NotPressed; KEY_COUNT];
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Self {
            key_states: [KeyState::NotPressed; KEY_COUNT],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_pressed_prefers_the_lowest_key() {
        let mut keypad = Keypad::default();
        assert_eq!(keypad.first_pressed(), None);

        keypad.set(Key::KB, KeyState::Pressed);
        keypad.set(Key::K4, KeyState::Pressed);

        assert_eq!(keypad.first_pressed(), Some(Key::K4));
    }

    #[test]
    fn release_all_clears_every_key() {
        let mut keypad = Keypad::default();
        keypad.set(Key::K0, KeyState::Pressed);
        keypad.set(Key::KF, KeyState::Pressed);

        keypad.release_all();

        assert_eq!(keypad, Keypad::default());
    }
}
