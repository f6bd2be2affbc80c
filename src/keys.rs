//! Per-key light state table

use crate::color::Color;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of keys on the keypad
pub const KEY_COUNT: usize = 12;

/// Validated key index (0-11)
///
/// Raw indices from hardware or the host are untrusted; converting them
/// into a `KeyIndex` is the only bounds check the rest of the crate needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "usize")]
pub struct KeyIndex(usize);

impl KeyIndex {
    /// Validate a zero-based index
    pub fn new(index: usize) -> Option<Self> {
        (index < KEY_COUNT).then_some(Self(index))
    }

    /// Validate a possibly negative index reported by a transport
    pub fn from_raw(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(Self::new)
    }

    /// Validate a one-based host label (1-12)
    pub fn from_label(label: usize) -> Option<Self> {
        label.checked_sub(1).and_then(Self::new)
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// One-based label used at the accessory boundary
    pub fn label(self) -> usize {
        self.0 + 1
    }

    /// All keys in index order
    pub fn all() -> impl Iterator<Item = KeyIndex> {
        (0..KEY_COUNT).map(KeyIndex)
    }
}

impl From<KeyIndex> for usize {
    fn from(key: KeyIndex) -> Self {
        key.0
    }
}

impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Desired backlight state of one key
///
/// `color` survives `on = false`, so switching back on restores it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KeyState {
    pub on: bool,
    pub color: Color,
}

/// Fixed-size table of key states
#[derive(Debug, Clone, PartialEq)]
pub struct KeyTable {
    keys: [KeyState; KEY_COUNT],
}

impl KeyTable {
    /// All keys off with the default color
    pub fn new() -> Self {
        Self {
            keys: [KeyState::default(); KEY_COUNT],
        }
    }

    pub fn get(&self, key: KeyIndex) -> &KeyState {
        &self.keys[key.0]
    }

    pub fn get_mut(&mut self, key: KeyIndex) -> &mut KeyState {
        &mut self.keys[key.0]
    }

    /// Raw access by position
    ///
    /// # Panics
    ///
    /// Panics if `index >= KEY_COUNT`.
    pub fn at(&self, index: usize) -> &KeyState {
        assert!(index < KEY_COUNT, "key index {} out of range", index);
        &self.keys[index]
    }

    /// Iterate `(KeyIndex, &KeyState)` in index order
    pub fn iter(&self) -> impl Iterator<Item = (KeyIndex, &KeyState)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, state)| (KeyIndex(i), state))
    }

    /// Copy of the whole table
    pub fn snapshot(&self) -> [KeyState; KEY_COUNT] {
        self.keys
    }
}

impl Default for KeyTable {
    fn default() -> Self {
        Self::new()
    }
}
