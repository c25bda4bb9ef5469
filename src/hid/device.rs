//! Stream Deck discovery and connection management

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::{LifecycleError, TransportError, WriteError};
use super::icon::{load_and_orient, IconPixelBuffer};
use super::matcher::find_device;
use super::pages::{build_pages, OutboundPacket};
use super::poller::{KeyPoller, PollSettings, PollStats, SubscriptionId};
use super::protocol::{is_valid_key, KEY_COUNT, PACKET_SIZE};
use super::transport::{DeckHandle, EndpointInfo, HidApiHandle, HidApiTransport, Transport};
use crate::core::config::DeckConfig;
use crate::core::events::KeyEvent;

/// An opened Stream Deck
///
/// Key events are read on a background thread started by
/// [`StreamDeck::start_listening`]; writes run on the caller's thread.
pub struct StreamDeck<H: DeckHandle + 'static> {
    handle: Arc<H>,
    endpoint: EndpointInfo,
    poller: KeyPoller<H>,
    /// Keeps the two pages of one icon together
    write_lock: Mutex<()>,
    /// Set under `write_lock` once `dispose` starts
    disposed: AtomicBool,
}

impl StreamDeck<HidApiHandle> {
    /// Find the deck through the system HID library.
    ///
    /// Fails only if the library cannot initialize; a missing deck is `Ok(None)`.
    pub fn discover_hid(config: &DeckConfig) -> Result<Option<Self>, TransportError> {
        let transport = HidApiTransport::new()?;
        Ok(Self::discover(&transport, config))
    }
}

impl<H: DeckHandle + 'static> StreamDeck<H> {
    /// Find and open the first deck whose descriptors match `config`
    pub fn discover<T>(transport: &T, config: &DeckConfig) -> Option<Self>
    where
        T: Transport<Handle = H>,
    {
        let (endpoint, handle) = find_device(transport, &config.manufacturer, &config.product)?;
        Some(Self::from_handle(endpoint, handle, config))
    }

    /// Wrap an already opened handle
    pub fn from_handle(endpoint: EndpointInfo, handle: H, config: &DeckConfig) -> Self {
        let handle = Arc::new(handle);
        let poller = KeyPoller::new(Arc::clone(&handle), PollSettings::from(config));
        Self {
            handle,
            endpoint,
            poller,
            write_lock: Mutex::new(()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &EndpointInfo {
        &self.endpoint
    }

    /// Register a callback, invoked on the poller thread
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        self.poller.subscribers().add_callback(callback)
    }

    /// Register a channel receiving every key event
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<KeyEvent>) {
        self.poller.subscribers().add_channel()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.poller.subscribers().remove(id)
    }

    pub fn start_listening(&self) -> Result<(), LifecycleError> {
        self.poller.start()
    }

    /// Subscribe `on_keys` and start listening
    pub fn listen<F>(&self, on_keys: F) -> Result<SubscriptionId, LifecycleError>
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        let id = self.subscribe(on_keys);
        if let Err(e) = self.start_listening() {
            self.unsubscribe(id);
            return Err(e);
        }
        Ok(id)
    }

    /// Stop delivering key events. Listening can be started again.
    pub fn stop_listening(&self) -> Result<(), LifecycleError> {
        self.poller.stop()
    }

    pub fn is_listening(&self) -> bool {
        self.poller.is_listening()
    }

    pub fn poll_stats(&self) -> PollStats {
        self.poller.stats()
    }

    /// Paint `pixels` onto `key` (1-based)
    pub fn write_image(&self, key: u8, pixels: &IconPixelBuffer) -> Result<(), WriteError> {
        if !is_valid_key(key) {
            return Err(WriteError::InvalidKey {
                key,
                max: KEY_COUNT,
            });
        }

        let (first, second) = build_pages(pixels, key);

        let _guard = self.write_lock.lock();
        if self.disposed.load(Ordering::SeqCst) {
            return Err(WriteError::Disposed);
        }
        self.send_page(&first)?;
        self.send_page(&second)?;

        debug!("Wrote icon to key {}", key);
        Ok(())
    }

    /// Paint `key` a single color
    pub fn write_color(&self, r: u8, g: u8, b: u8, key: u8) -> Result<(), WriteError> {
        self.write_image(key, &IconPixelBuffer::solid(r, g, b))
    }

    /// Load an image file and paint it onto `key`
    pub fn write_image_file(&self, key: u8, path: &Path) -> Result<(), WriteError> {
        let pixels = load_and_orient(path)?;
        self.write_image(key, &pixels)
    }

    /// Paint `key` black
    pub fn clear_key(&self, key: u8) -> Result<(), WriteError> {
        self.write_color(0, 0, 0, key)
    }

    fn send_page(&self, packet: &OutboundPacket) -> Result<(), WriteError> {
        let page = packet.page().map_or(0, |p| p.as_byte());
        let written = self
            .handle
            .write(packet.as_bytes())
            .map_err(|source| WriteError::PageFailed { page, source })?;

        if written != PACKET_SIZE {
            warn!("Short write on page {}: {} bytes", page, written);
            return Err(WriteError::ShortWrite {
                page,
                written,
                expected: PACKET_SIZE,
            });
        }
        Ok(())
    }

    /// Stop listening and release the device. Terminal.
    pub fn dispose(&self) -> Result<(), LifecycleError> {
        {
            // Let a write in progress finish its second page
            let _guard = self.write_lock.lock();
            if self.disposed.swap(true, Ordering::SeqCst) {
                return Err(LifecycleError::Disposed);
            }
        }

        // A callback may be blocked on the write lock while holding up delivery,
        // so the poller is disposed without it
        self.poller.dispose()?;
        info!("Disconnected from {}", self.endpoint.path);
        Ok(())
    }
}
