//! Stream Deck HID driver
//!
//! Talks to the original 15-key Elgato Stream Deck over raw HID.
//!
//! # Features
//! - Discovers the deck by its manufacturer and product strings
//! - Decodes key reports on a background thread and publishes key events
//! - Paints solid colors or image files onto individual keys
//! - Scriptable mock transport for testing without hardware

pub mod core;
pub mod hid;

pub use crate::core::config::{Config, DeckConfig, TriggerMode};
pub use crate::core::events::KeyEvent;
pub use hid::{IconPixelBuffer, KeySet, StreamDeck};
