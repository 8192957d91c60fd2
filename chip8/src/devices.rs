//! Keyboard input.
use crate::constants::KEY_COUNT;

/// One of the 16 keys of the COSMAC VIP hexadecimal keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(try_from = "u8"))]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    pub const ALL: [KeyCode; KEY_COUNT as usize] = [
        Self::Key0,
        Self::Key1,
        Self::Key2,
        Self::Key3,
        Self::Key4,
        Self::Key5,
        Self::Key6,
        Self::Key7,
        Self::Key8,
        Self::Key9,
        Self::KeyA,
        Self::KeyB,
        Self::KeyC,
        Self::KeyD,
        Self::KeyE,
        Self::KeyF,
    ];

    #[inline(always)]
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(key_id as usize).copied().ok_or(InvalidKeyCode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

/// Layout of the hexadecimal keypad on the left side of a QWERTY keyboard.
///
/// ```text
/// 1 2 3 4      1 2 3 C
/// q w e r  ->  4 5 6 D
/// a s d f      7 8 9 E
/// z x c v      A 0 B F
/// ```
#[rustfmt::skip]
const DEFAULT_BINDINGS: [(char, KeyCode); KEY_COUNT as usize] = [
    ('1', KeyCode::Key1), ('2', KeyCode::Key2), ('3', KeyCode::Key3), ('4', KeyCode::KeyC),
    ('q', KeyCode::Key4), ('w', KeyCode::Key5), ('e', KeyCode::Key6), ('r', KeyCode::KeyD),
    ('a', KeyCode::Key7), ('s', KeyCode::Key8), ('d', KeyCode::Key9), ('f', KeyCode::KeyE),
    ('z', KeyCode::KeyA), ('x', KeyCode::Key0), ('c', KeyCode::KeyB), ('v', KeyCode::KeyF),
];

/// Mapping of host keyboard characters to Chip8 keys.
///
/// Characters are matched case-insensitively, so holding shift doesn't
/// change which key is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    bindings: Vec<(char, KeyCode)>,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            bindings: DEFAULT_BINDINGS.to_vec(),
        }
    }
}

impl KeyMap {
    /// Key map with no bindings.
    pub fn empty() -> Self {
        Self { bindings: vec![] }
    }

    /// Bind a host character to a key, replacing any existing binding of that character.
    pub fn bind(&mut self, host: char, key: KeyCode) {
        let host = host.to_ascii_lowercase();
        match self.bindings.iter_mut().find(|(c, _)| *c == host) {
            Some(existing) => existing.1 = key,
            None => self.bindings.push((host, key)),
        }
    }

    /// Given a host character, find the Chip8 key it's bound to.
    pub fn map(&self, host: char) -> Option<KeyCode> {
        let host = host.to_ascii_lowercase();
        self.bindings
            .iter()
            .find(|(c, _)| *c == host)
            .map(|(_, key)| *key)
    }

    /// Map every character of a string, skipping the unbound ones.
    pub fn map_str<'a>(&'a self, host: &'a str) -> impl Iterator<Item = KeyCode> + 'a {
        host.chars().filter_map(move |c| self.map(c))
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, KeyCode)> + '_ {
        self.bindings.iter().copied()
    }
}
