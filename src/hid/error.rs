//! Error types for the deck protocol layer

use thiserror::Error;

/// Errors raised by the HID transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HID error: {0}")]
    Hid(String),

    #[error("Device handle is closed")]
    Closed,

    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("Invalid endpoint path: {0}")]
    InvalidPath(String),
}

impl From<hidapi::HidError> for TransportError {
    fn from(e: hidapi::HidError) -> Self {
        TransportError::Hid(e.to_string())
    }
}

/// An input report that cannot be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("Short input report: expected at least {expected} bytes, got {actual}")]
    ShortReport { expected: usize, actual: usize },
}

/// Misuse of the listening lifecycle
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Already listening for key events")]
    AlreadyListening,

    #[error("Device has been disposed")]
    Disposed,

    #[error("Failed to spawn key poller thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Failure to paint a key
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Key {key} is out of range 1..={max}")]
    InvalidKey { key: u8, max: u8 },

    #[error("Icon buffer too large: {actual} bytes, at most {max}")]
    IconTooLarge { actual: usize, max: usize },

    #[error("Failed to write page {page}: {source}")]
    PageFailed {
        page: u8,
        #[source]
        source: TransportError,
    },

    #[error("Short write on page {page}: {written} of {expected} bytes")]
    ShortWrite {
        page: u8,
        written: usize,
        expected: usize,
    },

    #[error("Failed to load icon: {0}")]
    Icon(#[from] IconError),

    #[error("Device has been disposed")]
    Disposed,
}

/// Failure to turn an image into an icon buffer
#[derive(Error, Debug)]
pub enum IconError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
