//! Icon page packetizer
//!
//! One icon does not fit into a single output report, so it is sent as two
//! fixed-size pages. Both pages share the header template; the page number,
//! final-page flag and key selector are patched in per page.

use super::icon::IconPixelBuffer;
use super::protocol::{
    Page, FINAL_PAGE_OFFSET, FIRST_PAGE_BYTES, HEADER_LEN, KEY_OFFSET, PACKET_SIZE,
    PAGE_HEADER, PAGE_NUMBER_OFFSET,
};

/// A fixed-size outbound packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    /// Raw packet data, always `PACKET_SIZE` bytes
    data: Vec<u8>,
}

impl OutboundPacket {
    /// Create a page with its header filled in and a zeroed payload
    pub fn with_header(page: Page, key: u8) -> Self {
        let mut data = vec![0u8; PACKET_SIZE];
        data[..HEADER_LEN].copy_from_slice(&PAGE_HEADER);
        data[PAGE_NUMBER_OFFSET] = page.as_byte();
        data[FINAL_PAGE_OFFSET] = u8::from(page.is_final());
        data[KEY_OFFSET] = key;
        Self { data }
    }

    /// Page this packet carries
    pub fn page(&self) -> Option<Page> {
        Page::from_byte(self.data[PAGE_NUMBER_OFFSET])
    }

    /// Key selector byte
    pub fn key(&self) -> u8 {
        self.data[KEY_OFFSET]
    }

    pub fn is_final(&self) -> bool {
        self.data[FINAL_PAGE_OFFSET] == 0x01
    }

    pub fn header(&self) -> &[u8] {
        &self.data[..HEADER_LEN]
    }

    /// Get the payload slice (everything after the header)
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_LEN..]
    }

    /// Copy pixel bytes into the payload, truncating to the page capacity
    fn set_pixels(&mut self, pixels: &[u8], capacity: usize) {
        let len = pixels.len().min(capacity);
        self.data[HEADER_LEN..HEADER_LEN + len].copy_from_slice(&pixels[..len]);
    }

    /// Get raw packet data for sending
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Split an icon into its two pages addressed at `key`
pub fn build_pages(pixels: &IconPixelBuffer, key: u8) -> (OutboundPacket, OutboundPacket) {
    let bytes = pixels.as_bytes();
    let split = bytes.len().min(FIRST_PAGE_BYTES);

    let mut first = OutboundPacket::with_header(Page::First, key);
    first.set_pixels(&bytes[..split], Page::First.capacity());

    let mut second = OutboundPacket::with_header(Page::Second, key);
    second.set_pixels(&bytes[split..], Page::Second.capacity());

    (first, second)
}
