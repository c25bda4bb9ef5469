//! Integration tests against the scripted mock transport

mod device_tests;
mod poller_tests;

use std::thread;
use std::time::{Duration, Instant};

use stream_deck_hid::hid::mock::{MockEndpoint, MockHandle, MockTransport};
use stream_deck_hid::{DeckConfig, StreamDeck};

/// Transport exposing an unrelated keyboard and one deck at path "deck"
pub fn deck_transport() -> MockTransport {
    MockTransport::new()
        .with_endpoint(MockEndpoint::new(
            "keyboard",
            Some("Logitech"),
            Some("USB Keyboard"),
        ))
        .with_endpoint(MockEndpoint::new(
            "deck",
            Some("Elgato Systems"),
            Some("Stream Deck"),
        ))
}

/// Config with short timings so tests finish quickly
pub fn fast_config() -> DeckConfig {
    DeckConfig {
        read_timeout_ms: 10,
        read_error_backoff_ms: 1,
        ..DeckConfig::default()
    }
}

pub fn open_deck() -> (StreamDeck<MockHandle>, MockHandle) {
    let transport = deck_transport();
    let handle = transport.handle("deck").unwrap();
    let deck = StreamDeck::discover(&transport, &fast_config()).unwrap();
    (deck, handle)
}

/// Poll `condition` until it holds or a few seconds pass
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}
