//! Key report decoding
//!
//! The deck reports one byte per key, but in the order of its button matrix
//! rather than the visual grid. Each row of five keys arrives as its own block
//! and every block lists the row right-to-left, so raw byte 1 is the top-right
//! key. Decoding walks each block in its wiring direction to rebuild the
//! 1-based, left-to-right, top-to-bottom numbering.

use std::fmt;

use super::error::FramingError;
use super::protocol::{INPUT_REPORT_LEN, KEY_COUNT};
use crate::core::config::TriggerMode;
use crate::core::events::KeyEvent;

/// One wiring block of the input report
#[derive(Debug, Clone, Copy)]
struct KeyBlock {
    /// Report offset of the block's first byte
    offset: usize,
    /// Number of keys in the block
    len: usize,
    /// Logical index of the block's leftmost key
    first_key: u8,
    /// Block lists its keys right-to-left
    reversed: bool,
}

impl KeyBlock {
    /// Report offset holding the state of the `i`-th key (left to right) of this block
    fn offset_of(&self, i: usize) -> usize {
        if self.reversed {
            self.offset + self.len - 1 - i
        } else {
            self.offset + i
        }
    }
}

const KEY_BLOCKS: [KeyBlock; 3] = [
    KeyBlock {
        offset: 1,
        len: 5,
        first_key: 1,
        reversed: true,
    },
    KeyBlock {
        offset: 6,
        len: 5,
        first_key: 6,
        reversed: true,
    },
    KeyBlock {
        offset: 11,
        len: 5,
        first_key: 11,
        reversed: true,
    },
];

/// Byte value marking a pressed key
const PRESSED: u8 = 0x01;

/// Ordered set of pressed keys (1-based logical indices, ascending)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeySet(Vec<u8>);

impl KeySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a set from arbitrary key indices, dropping duplicates and keys off the deck
    pub fn from_keys(keys: &[u8]) -> Self {
        let mut keys: Vec<u8> = keys
            .iter()
            .copied()
            .filter(|k| (1..=KEY_COUNT).contains(k))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        Self(keys)
    }

    /// Get the keys as an ascending slice
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Iterate keys in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().copied()
    }

    /// Check whether `key` is pressed
    pub fn contains(&self, key: u8) -> bool {
        self.0.binary_search(&key).is_ok()
    }

    /// Number of pressed keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether no key is pressed
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys in `self` that are not in `other`
    pub fn difference(&self, other: &KeySet) -> KeySet {
        KeySet(self.iter().filter(|k| !other.contains(*k)).collect())
    }
}

impl fmt::Display for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", key)?;
        }
        write!(f, "]")
    }
}

/// Decode an input report into the set of pressed keys
pub fn decode_keys(report: &[u8]) -> Result<KeySet, FramingError> {
    if report.len() < INPUT_REPORT_LEN {
        return Err(FramingError::ShortReport {
            expected: INPUT_REPORT_LEN,
            actual: report.len(),
        });
    }

    let mut keys = Vec::with_capacity(KEY_COUNT as usize);
    for block in &KEY_BLOCKS {
        for i in 0..block.len {
            if report[block.offset_of(i)] == PRESSED {
                keys.push(block.first_key + i as u8);
            }
        }
    }
    Ok(KeySet(keys))
}

/// Report offset that carries the state of a logical key
pub fn report_offset(key: u8) -> Option<usize> {
    KEY_BLOCKS.iter().find_map(|block| {
        let i = key.checked_sub(block.first_key)? as usize;
        (i < block.len).then(|| block.offset_of(i))
    })
}

/// Turns successive decoded reports into key events according to a trigger mode
#[derive(Debug, Clone)]
pub struct KeyTracker {
    mode: TriggerMode,
    previous: KeySet,
}

impl KeyTracker {
    pub fn new(mode: TriggerMode) -> Self {
        Self {
            mode,
            previous: KeySet::new(),
        }
    }

    /// Feed the keys of the latest report, returning the event to publish, if any
    pub fn update(&mut self, held: KeySet) -> Option<KeyEvent> {
        let event = match self.mode {
            TriggerMode::Press => {
                let pressed = held.difference(&self.previous);
                (!pressed.is_empty()).then(|| KeyEvent::new(pressed, held.clone()))
            }
            TriggerMode::Change => {
                (held != self.previous).then(|| KeyEvent::new(held.clone(), held.clone()))
            }
            TriggerMode::Level => Some(KeyEvent::new(held.clone(), held.clone())),
        };
        self.previous = held;
        event
    }
}
