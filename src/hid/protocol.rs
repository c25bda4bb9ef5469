//! Wire constants for the 15-key Stream Deck
//!
//! Protocol as observed on the device:
//! - Input report: 1 report-type byte followed by one byte per key (1 = pressed)
//! - Output packet: 8218 bytes, 16-byte page header followed by pixel data
//! - One 72x72 icon is split across two pages
//! - Header byte 2 = page number, byte 4 = final-page flag, byte 5 = key

/// Default manufacturer descriptor string
pub const MANUFACTURER: &str = "Elgato Systems";

/// Default product descriptor string
pub const PRODUCT: &str = "Stream Deck";

/// Number of keys on the deck
pub const KEY_COUNT: u8 = 15;

/// Keys per row
pub const KEYS_PER_ROW: u8 = 5;

/// Minimum length of a decodable input report (marker + one byte per key)
pub const INPUT_REPORT_LEN: usize = 1 + KEY_COUNT as usize;

/// Buffer size handed to the transport for one read
pub const READ_BUFFER_SIZE: usize = 17;

/// Fixed size of every outbound packet
pub const PACKET_SIZE: usize = 8218;

/// Length of the page header
pub const HEADER_LEN: usize = 16;

/// Page header template; bytes 2, 4 and 5 are set per page
pub const PAGE_HEADER: [u8; HEADER_LEN] = [
    0x02, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Header offset of the page number
pub const PAGE_NUMBER_OFFSET: usize = 2;

/// Header offset of the final-page flag
pub const FINAL_PAGE_OFFSET: usize = 4;

/// Header offset of the key selector
pub const KEY_OFFSET: usize = 5;

/// Icon edge length in pixels
pub const ICON_SIZE: u32 = 72;

/// Bytes per pixel (24-bit BGR)
pub const BYTES_PER_PIXEL: usize = 3;

/// Pixels carried by the first page
pub const FIRST_PAGE_PIXELS: usize = 2583;

/// Pixels carried by the second page
pub const SECOND_PAGE_PIXELS: usize = 2601;

/// Pixel bytes carried by the first page
pub const FIRST_PAGE_BYTES: usize = FIRST_PAGE_PIXELS * BYTES_PER_PIXEL;

/// Pixel bytes carried by the second page
pub const SECOND_PAGE_BYTES: usize = SECOND_PAGE_PIXELS * BYTES_PER_PIXEL;

/// Pixel bytes in one full icon
pub const ICON_BYTES: usize = FIRST_PAGE_BYTES + SECOND_PAGE_BYTES;

/// Outbound page of an icon write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Page {
    First = 0x01,
    Second = 0x02,
}

impl Page {
    /// Convert page to its header byte
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }

    /// Parse page from its header byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Page::First),
            0x02 => Some(Page::Second),
            _ => None,
        }
    }

    /// Whether this page completes the icon
    pub fn is_final(&self) -> bool {
        matches!(self, Page::Second)
    }

    /// Pixel bytes this page carries
    pub fn capacity(&self) -> usize {
        match self {
            Page::First => FIRST_PAGE_BYTES,
            Page::Second => SECOND_PAGE_BYTES,
        }
    }
}

/// Check that a 1-based key index addresses a key on the deck
pub fn is_valid_key(key: u8) -> bool {
    (1..=KEY_COUNT).contains(&key)
}
