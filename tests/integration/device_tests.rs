//! Discovery and icon write tests

use std::sync::Arc;
use std::thread;

use image::{Rgb, RgbImage};
use stream_deck_hid::hid::mock::{MockEndpoint, MockTransport};
use stream_deck_hid::hid::protocol::{FIRST_PAGE_BYTES, HEADER_LEN, PACKET_SIZE, SECOND_PAGE_BYTES};
use stream_deck_hid::hid::WriteError;
use stream_deck_hid::{IconPixelBuffer, StreamDeck};

use crate::{deck_transport, fast_config, open_deck};

/// Full expected page for a solid color, built independently of the packetizer
fn expected_solid_page(page: u8, key: u8, bgr: [u8; 3], pixel_bytes: usize) -> Vec<u8> {
    let mut expected = vec![0x02, 0x01, page, 0x00, u8::from(page == 2), key];
    expected.resize(HEADER_LEN, 0x00);
    expected.extend(bgr.iter().copied().cycle().take(pixel_bytes));
    expected.resize(PACKET_SIZE, 0x00);
    expected
}

#[test]
fn test_discover_selects_matching_endpoint() {
    let (deck, _) = open_deck();
    assert_eq!(deck.endpoint().path, "deck");
    assert_eq!(deck.endpoint().vendor_id, 0x0FD9);
}

#[test]
fn test_discover_without_deck() {
    let transport = MockTransport::new()
        .with_endpoint(MockEndpoint::new("kbd", Some("Logitech"), Some("USB Keyboard")))
        .with_endpoint(MockEndpoint::new("mini", Some("Elgato Systems"), Some("Stream Deck Mini")));
    assert!(StreamDeck::discover(&transport, &fast_config()).is_none());
}

#[test]
fn test_write_color_byte_exact() {
    let (deck, handle) = open_deck();
    deck.write_color(0x10, 0x20, 0x30, 11).unwrap();

    let writes = handle.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(
        writes[0],
        expected_solid_page(1, 11, [0x30, 0x20, 0x10], FIRST_PAGE_BYTES)
    );
    assert_eq!(
        writes[1],
        expected_solid_page(2, 11, [0x30, 0x20, 0x10], SECOND_PAGE_BYTES)
    );
}

#[test]
fn test_write_color_matches_write_image() {
    let (deck, handle) = open_deck();
    deck.write_color(200, 100, 50, 6).unwrap();
    deck.write_image(6, &IconPixelBuffer::solid(200, 100, 50)).unwrap();

    let writes = handle.writes();
    assert_eq!(writes.len(), 4);
    assert_eq!(writes[0], writes[2]);
    assert_eq!(writes[1], writes[3]);
}

#[test]
fn test_headers_independent_of_color() {
    let (deck, handle) = open_deck();
    deck.write_color(255, 0, 0, 5).unwrap();
    deck.clear_key(5).unwrap();

    let writes = handle.writes();
    assert_eq!(writes[0][..HEADER_LEN], writes[2][..HEADER_LEN]);
    assert_eq!(writes[1][..HEADER_LEN], writes[3][..HEADER_LEN]);
    assert_ne!(writes[0], writes[2]);
}

#[test]
fn test_second_page_failure_reported() {
    let (deck, handle) = open_deck();
    deck.start_listening().unwrap();
    handle.fail_write(1);

    let err = deck.write_color(1, 2, 3, 2).unwrap_err();
    assert!(matches!(err, WriteError::PageFailed { page: 2, .. }));
    assert_eq!(handle.writes().len(), 1);

    // listening survives a failed write
    assert!(deck.is_listening());
    deck.write_color(1, 2, 3, 2).unwrap();
    deck.dispose().unwrap();
}

#[test]
fn test_write_image_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("red.png");
    RgbImage::from_pixel(24, 24, Rgb([255, 0, 0])).save(&path).unwrap();

    let (deck, handle) = open_deck();
    deck.write_image_file(2, &path).unwrap();

    let writes = handle.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0][5], 2);
    assert_eq!(&writes[0][HEADER_LEN..HEADER_LEN + 3], &[0x00, 0x00, 0xFF]);
    assert_eq!(
        &writes[1][HEADER_LEN + SECOND_PAGE_BYTES - 3..HEADER_LEN + SECOND_PAGE_BYTES],
        &[0x00, 0x00, 0xFF]
    );
}

#[test]
fn test_write_missing_image_file() {
    let dir = tempfile::tempdir().unwrap();
    let (deck, handle) = open_deck();

    let err = deck
        .write_image_file(1, &dir.path().join("missing.png"))
        .unwrap_err();
    assert!(matches!(err, WriteError::Icon(_)));
    assert!(handle.writes().is_empty());
}

#[test]
fn test_oversized_icon_rejected() {
    let err = IconPixelBuffer::from_bytes(vec![0; 15553]).unwrap_err();
    assert!(matches!(
        err,
        WriteError::IconTooLarge {
            actual: 15553,
            max: 15552
        }
    ));
}

#[test]
fn test_concurrent_writes_keep_pages_together() {
    let transport = deck_transport();
    let handle = transport.handle("deck").unwrap();
    let deck = Arc::new(StreamDeck::discover(&transport, &fast_config()).unwrap());

    let writers: Vec<_> = (1..=4u8)
        .map(|key| {
            let deck = Arc::clone(&deck);
            thread::spawn(move || {
                for _ in 0..10 {
                    deck.write_color(key, key, key, key).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let writes = handle.writes();
    assert_eq!(writes.len(), 80);
    for pair in writes.chunks(2) {
        assert_eq!(pair[0][2], 0x01);
        assert_eq!(pair[1][2], 0x02);
        assert_eq!(pair[0][5], pair[1][5]);
    }
}

#[test]
fn test_drop_closes_handle() {
    let (deck, handle) = open_deck();
    deck.start_listening().unwrap();
    drop(deck);
    assert!(handle.is_closed());
    assert_eq!(handle.close_count(), 1);
}
