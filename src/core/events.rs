//! Key event definitions

use crate::hid::KeySet;

/// Key-change notification published by the key poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    /// Keys this notification is about (newly pressed keys in press mode,
    /// the full pressed set otherwise)
    pub keys: KeySet,
    /// Every key held down in the report that raised the event
    pub held: KeySet,
}

impl KeyEvent {
    pub fn new(keys: KeySet, held: KeySet) -> Self {
        Self { keys, held }
    }
}
