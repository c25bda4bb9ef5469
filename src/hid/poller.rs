//! Background key poller
//!
//! A dedicated thread reads input reports, decodes them and publishes key
//! events to subscribers. Stopping is cooperative: the thread notices the
//! cleared run flag after its current read returns. Delivery is serialized
//! with `stop` and `dispose`, so once either returns no further event of that
//! run reaches a subscriber.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::LifecycleError;
use super::keys::{decode_keys, KeyTracker};
use super::protocol::READ_BUFFER_SIZE;
use super::transport::DeckHandle;
use crate::core::config::{DeckConfig, TriggerMode, MAX_READ_TIMEOUT_MS, MIN_READ_TIMEOUT_MS};
use crate::core::events::KeyEvent;

/// Callback invoked on the poller thread for every key event
pub type KeyCallback = Arc<dyn Fn(&KeyEvent) + Send + Sync>;

/// Identifies a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
enum Sink {
    Callback(KeyCallback),
    Channel(mpsc::UnboundedSender<KeyEvent>),
}

/// Registered key event subscribers
#[derive(Default)]
pub struct Subscribers {
    next_id: AtomicU64,
    sinks: Mutex<Vec<(SubscriptionId, Sink)>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, sink: Sink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sinks.lock().push((id, sink));
        id
    }

    /// Register a callback
    pub fn add_callback<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        self.add(Sink::Callback(Arc::new(callback)))
    }

    /// Register a channel; it is dropped once the receiver goes away
    pub fn add_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<KeyEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.add(Sink::Channel(tx)), rx)
    }

    /// Remove a subscriber, returning whether it was registered
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut sinks = self.sinks.lock();
        let before = sinks.len();
        sinks.retain(|(sink_id, _)| *sink_id != id);
        sinks.len() != before
    }

    pub fn len(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.lock().is_empty()
    }

    /// Deliver an event to every subscriber, returning how many received it
    pub fn publish(&self, event: &KeyEvent) -> usize {
        // Snapshot so callbacks may (un)subscribe without deadlocking
        let sinks = self.sinks.lock().clone();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sink) in sinks {
            match sink {
                Sink::Callback(callback) => {
                    callback(event);
                    delivered += 1;
                }
                Sink::Channel(tx) => {
                    if tx.send(event.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        closed.push(id);
                    }
                }
            }
        }

        if !closed.is_empty() {
            debug!("Dropping {} closed key event channel(s)", closed.len());
            self.sinks.lock().retain(|(id, _)| !closed.contains(id));
        }
        delivered
    }
}

/// Poll loop tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Timeout of each blocking read
    pub read_timeout_ms: i32,
    /// Pause after a failed read
    pub read_error_backoff: Duration,
    pub trigger: TriggerMode,
}

impl From<&DeckConfig> for PollSettings {
    /// Out of range read timeouts are clamped so a read never holds the handle for long
    fn from(config: &DeckConfig) -> Self {
        let read_timeout_ms = config
            .read_timeout_ms
            .clamp(MIN_READ_TIMEOUT_MS, MAX_READ_TIMEOUT_MS);
        if read_timeout_ms != config.read_timeout_ms {
            warn!(
                "read_timeout_ms {} out of range, using {}",
                config.read_timeout_ms, read_timeout_ms
            );
        }
        Self {
            read_timeout_ms,
            read_error_backoff: Duration::from_millis(config.read_error_backoff_ms),
            trigger: config.trigger,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&DeckConfig::default())
    }
}

/// Snapshot of poll loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    /// Reports decoded
    pub reports: u64,
    /// Reports dropped because they were too short
    pub desyncs: u64,
    /// Failed transport reads
    pub read_errors: u64,
}

#[derive(Default)]
struct Counters {
    reports: AtomicU64,
    desyncs: AtomicU64,
    read_errors: AtomicU64,
}

/// Lifecycle phase of the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Listening,
    Stopped,
    Disposed,
}

/// One started poll thread
struct Run {
    active: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl Run {
    fn signal_stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn join(self) {
        // A subscriber restarting or disposing from inside a callback runs on this thread
        if self.thread.thread().id() == thread::current().id() {
            return;
        }
        if self.thread.join().is_err() {
            warn!("Key poller thread panicked");
        }
    }
}

struct PollerState {
    phase: PollPhase,
    run: Option<Run>,
}

impl PollerState {
    fn ensure_startable(&self) -> Result<(), LifecycleError> {
        match self.phase {
            PollPhase::Disposed => Err(LifecycleError::Disposed),
            PollPhase::Listening => Err(LifecycleError::AlreadyListening),
            PollPhase::Idle | PollPhase::Stopped => Ok(()),
        }
    }
}

/// Owns the poll thread of one deck handle
pub struct KeyPoller<H: DeckHandle + 'static> {
    handle: Arc<H>,
    settings: PollSettings,
    subscribers: Arc<Subscribers>,
    counters: Arc<Counters>,
    delivery: Arc<ReentrantMutex<()>>,
    state: Mutex<PollerState>,
}

impl<H: DeckHandle + 'static> KeyPoller<H> {
    pub fn new(handle: Arc<H>, settings: PollSettings) -> Self {
        Self {
            handle,
            settings,
            subscribers: Arc::new(Subscribers::new()),
            counters: Arc::new(Counters::default()),
            delivery: Arc::new(ReentrantMutex::new(())),
            state: Mutex::new(PollerState {
                phase: PollPhase::Idle,
                run: None,
            }),
        }
    }

    pub fn subscribers(&self) -> &Subscribers {
        &self.subscribers
    }

    pub fn phase(&self) -> PollPhase {
        self.state.lock().phase
    }

    pub fn is_listening(&self) -> bool {
        self.phase() == PollPhase::Listening
    }

    pub fn stats(&self) -> PollStats {
        PollStats {
            reports: self.counters.reports.load(Ordering::Relaxed),
            desyncs: self.counters.desyncs.load(Ordering::Relaxed),
            read_errors: self.counters.read_errors.load(Ordering::Relaxed),
        }
    }

    /// Spawn the poll thread
    pub fn start(&self) -> Result<(), LifecycleError> {
        let previous = {
            let mut state = self.state.lock();
            state.ensure_startable()?;
            state.run.take()
        };
        // The previous thread exits after its current read
        if let Some(run) = previous {
            run.join();
        }

        let mut state = self.state.lock();
        state.ensure_startable()?;

        let active = Arc::new(AtomicBool::new(true));
        let worker = PollWorker {
            handle: Arc::clone(&self.handle),
            settings: self.settings,
            subscribers: Arc::clone(&self.subscribers),
            counters: Arc::clone(&self.counters),
            delivery: Arc::clone(&self.delivery),
            active: Arc::clone(&active),
        };
        let thread = thread::Builder::new()
            .name("deck-key-poller".into())
            .spawn(move || worker.run())?;

        state.run = Some(Run { active, thread });
        state.phase = PollPhase::Listening;
        info!("Started listening for key events");
        Ok(())
    }

    /// Ask the poll thread to stop. A no-op unless listening.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.lock();
            match state.phase {
                PollPhase::Disposed => return Err(LifecycleError::Disposed),
                PollPhase::Idle | PollPhase::Stopped => return Ok(()),
                PollPhase::Listening => {}
            }
            if let Some(run) = &state.run {
                run.signal_stop();
            }
            state.phase = PollPhase::Stopped;
        }

        // Wait out a delivery already in progress
        drop(self.delivery.lock());
        info!("Stopped listening for key events");
        Ok(())
    }

    /// Stop polling and close the handle. Terminal.
    pub fn dispose(&self) -> Result<(), LifecycleError> {
        let run = {
            let mut state = self.state.lock();
            if state.phase == PollPhase::Disposed {
                return Err(LifecycleError::Disposed);
            }
            state.phase = PollPhase::Disposed;
            state.run.take()
        };

        if let Some(run) = &run {
            run.signal_stop();
        }
        // Closing makes an in-flight read fail promptly
        self.handle.close();
        drop(self.delivery.lock());

        if let Some(run) = run {
            run.join();
        }
        info!("Key poller disposed");
        Ok(())
    }
}

impl<H: DeckHandle + 'static> Drop for KeyPoller<H> {
    fn drop(&mut self) {
        if self.phase() != PollPhase::Disposed {
            let _ = self.dispose();
        }
    }
}

/// State moved onto the poll thread
struct PollWorker<H: DeckHandle> {
    handle: Arc<H>,
    settings: PollSettings,
    subscribers: Arc<Subscribers>,
    counters: Arc<Counters>,
    delivery: Arc<ReentrantMutex<()>>,
    active: Arc<AtomicBool>,
}

impl<H: DeckHandle> PollWorker<H> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn run(self) {
        debug!("Key poller thread started");
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let mut tracker = KeyTracker::new(self.settings.trigger);

        while self.is_active() {
            match self.handle.read(&mut buf, self.settings.read_timeout_ms) {
                Ok(0) => {} // Timeout, no data
                Ok(len) => self.handle_report(&buf[..len], &mut tracker),
                Err(e) => {
                    if !self.is_active() {
                        break;
                    }
                    self.counters.read_errors.fetch_add(1, Ordering::Relaxed);
                    debug!("Key poll read failed: {}", e);
                    thread::sleep(self.settings.read_error_backoff);
                }
            }
        }
        debug!("Key poller thread stopped");
    }

    fn handle_report(&self, report: &[u8], tracker: &mut KeyTracker) {
        let keys = match decode_keys(report) {
            Ok(keys) => keys,
            Err(e) => {
                let desyncs = self.counters.desyncs.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("Dropping input report: {} ({} desync events)", e, desyncs);
                return;
            }
        };

        if let Some(event) = tracker.update(keys) {
            self.publish(&event);
        }
        self.counters.reports.fetch_add(1, Ordering::Relaxed);
    }

    fn publish(&self, event: &KeyEvent) {
        let _guard = self.delivery.lock();
        if !self.is_active() {
            debug!("Dropping key event {} after stop", event.keys);
            return;
        }
        debug!("Keys {} (held {})", event.keys, event.held);
        self.subscribers.publish(event);
    }
}
