//! Key listening lifecycle tests

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use stream_deck_hid::hid::{LifecycleError, WriteError};
use stream_deck_hid::{DeckConfig, KeyEvent, StreamDeck, TriggerMode};

use crate::{deck_transport, fast_config, open_deck, wait_until};

/// Callback recording every event it receives
fn recorder() -> (Arc<Mutex<Vec<KeyEvent>>>, impl Fn(&KeyEvent) + Send + Sync + 'static) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    (events, move |event: &KeyEvent| sink.lock().push(event.clone()))
}

fn keys_of(events: &[KeyEvent]) -> Vec<Vec<u8>> {
    events.iter().map(|e| e.keys.as_slice().to_vec()).collect()
}

#[test]
fn test_single_press_single_event() {
    let (deck, handle) = open_deck();
    let (events, callback) = recorder();

    handle.push_keys(&[]);
    handle.push_keys(&[3]);
    handle.push_keys(&[]);
    deck.listen(callback).unwrap();

    assert!(wait_until(|| deck.poll_stats().reports == 3));
    deck.stop_listening().unwrap();

    assert_eq!(handle.pending_reads(), 0);
    assert_eq!(keys_of(&events.lock()), vec![vec![3]]);
}

#[test]
fn test_events_in_report_order() {
    let (deck, handle) = open_deck();
    let (_, mut rx) = deck.subscribe_channel();

    for key in [1, 15, 6] {
        handle.push_keys(&[key]);
        handle.push_keys(&[]);
    }
    handle.push_keys(&[2, 9]);
    deck.start_listening().unwrap();

    assert!(wait_until(|| deck.poll_stats().reports == 7));
    deck.dispose().unwrap();

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event.keys.as_slice().to_vec());
    }
    assert_eq!(received, vec![vec![1], vec![15], vec![6], vec![2, 9]]);
}

#[test]
fn test_change_mode_reports_releases() {
    let transport = deck_transport();
    let handle = transport.handle("deck").unwrap();
    let config = DeckConfig {
        trigger: TriggerMode::Change,
        ..fast_config()
    };
    let deck = StreamDeck::discover(&transport, &config).unwrap();
    let (events, callback) = recorder();

    handle.push_keys(&[4]);
    handle.push_keys(&[4]);
    handle.push_keys(&[]);
    deck.listen(callback).unwrap();

    assert!(wait_until(|| deck.poll_stats().reports == 3));
    deck.dispose().unwrap();

    assert_eq!(keys_of(&events.lock()), vec![vec![4], vec![]]);
}

#[test]
fn test_stop_before_start_is_noop() {
    let (deck, _) = open_deck();
    assert!(deck.stop_listening().is_ok());
    assert!(!deck.is_listening());
    deck.start_listening().unwrap();
    assert!(deck.is_listening());
    deck.dispose().unwrap();
}

#[test]
fn test_start_twice_rejected() {
    let (deck, _) = open_deck();
    deck.start_listening().unwrap();
    assert!(matches!(
        deck.start_listening(),
        Err(LifecycleError::AlreadyListening)
    ));
    deck.dispose().unwrap();
}

#[test]
fn test_operations_after_dispose_rejected() {
    let (deck, handle) = open_deck();
    deck.start_listening().unwrap();
    deck.dispose().unwrap();

    assert!(handle.is_closed());
    assert!(matches!(deck.dispose(), Err(LifecycleError::Disposed)));
    assert!(matches!(deck.start_listening(), Err(LifecycleError::Disposed)));
    assert!(matches!(deck.stop_listening(), Err(LifecycleError::Disposed)));
    assert!(matches!(deck.write_color(0, 0, 0, 1), Err(WriteError::Disposed)));
    assert_eq!(handle.close_count(), 1);
}

#[test]
fn test_no_events_after_stop() {
    let (deck, handle) = open_deck();
    let (events, callback) = recorder();
    deck.listen(callback).unwrap();
    deck.stop_listening().unwrap();
    // let the poll thread finish its last read
    thread::sleep(Duration::from_millis(50));

    handle.push_keys(&[8]);
    thread::sleep(Duration::from_millis(50));
    assert!(events.lock().is_empty());

    // the queued report is picked up once listening again
    deck.start_listening().unwrap();
    assert!(wait_until(|| events.lock().len() == 1));
    assert_eq!(keys_of(&events.lock()), vec![vec![8]]);
    deck.dispose().unwrap();
}

#[test]
fn test_no_events_after_dispose() {
    let (deck, handle) = open_deck();
    let (events, callback) = recorder();
    deck.listen(callback).unwrap();
    deck.dispose().unwrap();

    handle.push_keys(&[1]);
    thread::sleep(Duration::from_millis(50));
    assert!(events.lock().is_empty());
    assert_eq!(deck.poll_stats().reports, 0);
}

#[test]
fn test_desync_and_read_errors_do_not_stop_polling() {
    let (deck, handle) = open_deck();
    let (events, callback) = recorder();

    handle.push_report(vec![0x01; 8]);
    handle.push_read_error();
    handle.push_timeout();
    handle.push_keys(&[13]);
    deck.listen(callback).unwrap();

    assert!(wait_until(|| deck.poll_stats().reports == 1));
    let stats = deck.poll_stats();
    assert_eq!(stats.desyncs, 1);
    assert_eq!(stats.read_errors, 1);
    assert!(deck.is_listening());
    assert_eq!(keys_of(&events.lock()), vec![vec![13]]);
    deck.dispose().unwrap();
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let (deck, handle) = open_deck();
    let (events, callback) = recorder();
    let id = deck.subscribe(callback);
    assert!(deck.unsubscribe(id));
    assert!(!deck.unsubscribe(id));

    handle.push_keys(&[5]);
    deck.start_listening().unwrap();
    assert!(wait_until(|| deck.poll_stats().reports == 1));
    deck.dispose().unwrap();
    assert!(events.lock().is_empty());
}

#[test]
fn test_dispose_from_callback() {
    let (deck, handle) = open_deck();
    let deck = Arc::new(deck);
    let weak = Arc::downgrade(&deck);
    deck.subscribe(move |_| {
        if let Some(deck) = weak.upgrade() {
            deck.dispose().unwrap();
        }
    });

    handle.push_keys(&[1]);
    deck.start_listening().unwrap();
    assert!(wait_until(|| handle.is_closed()));
    assert!(matches!(deck.dispose(), Err(LifecycleError::Disposed)));
}

#[test]
fn test_dispose_while_callback_writes() {
    let (deck, handle) = open_deck();
    let deck = Arc::new(deck);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (write_tx, write_rx) = mpsc::channel();

    // light the pressed key, slowly enough for dispose to start meanwhile
    let weak = Arc::downgrade(&deck);
    deck.subscribe(move |event| {
        let _ = entered_tx.send(());
        thread::sleep(Duration::from_millis(200));
        if let Some(deck) = weak.upgrade() {
            let key = event.keys.iter().next().unwrap_or(1);
            let _ = write_tx.send(deck.write_color(255, 0, 0, key));
        }
    });

    handle.push_keys(&[4]);
    deck.start_listening().unwrap();
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let disposer = Arc::clone(&deck);
    thread::spawn(move || {
        let _ = done_tx.send(disposer.dispose());
    });

    let disposed = done_rx
        .recv_timeout(Duration::from_secs(3))
        .expect("dispose blocked behind a writing callback");
    assert!(disposed.is_ok());

    let write = write_rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(matches!(write, Err(WriteError::Disposed)));
    assert!(handle.writes().is_empty());
    assert!(handle.is_closed());
}
