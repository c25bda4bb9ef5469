//! HID transport seam
//!
//! [`Transport`] enumerates and opens endpoints, [`DeckHandle`] is one open
//! session. The production implementation sits on `hidapi`; tests use
//! [`crate::hid::mock`].

use std::ffi::CString;

use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use tracing::debug;

use super::error::TransportError;

/// An enumerated HID endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Platform device path, used to open the endpoint
    pub path: String,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
}

/// Descriptor string kinds read during matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Manufacturer,
    Product,
}

/// Enumerates and opens HID endpoints
pub trait Transport: Send + Sync {
    type Handle: DeckHandle + 'static;

    /// List all HID endpoints currently exposed by the host
    fn enumerate(&self) -> Result<Vec<EndpointInfo>, TransportError>;

    /// Read a descriptor string; `None` if the endpoint does not report one
    fn read_descriptor(
        &self,
        endpoint: &EndpointInfo,
        kind: DescriptorKind,
    ) -> Result<Option<String>, TransportError>;

    /// Open an endpoint
    fn open(&self, endpoint: &EndpointInfo) -> Result<Self::Handle, TransportError>;
}

/// An open session with one device
///
/// Reads and writes may be issued from different threads.
pub trait DeckHandle: Send + Sync {
    /// Read one input report, waiting at most `timeout_ms` milliseconds.
    ///
    /// Returns the number of bytes read; 0 means the timeout elapsed.
    fn read(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError>;

    /// Write one output report, returning the number of bytes written
    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Release the device. Later reads and writes fail with [`TransportError::Closed`].
    fn close(&self);
}

/// `hidapi` backed transport
pub struct HidApiTransport {
    api: Mutex<HidApi>,
}

impl HidApiTransport {
    /// Initialize the HID library
    pub fn new() -> Result<Self, TransportError> {
        let api = HidApi::new()?;
        Ok(Self {
            api: Mutex::new(api),
        })
    }
}

impl Transport for HidApiTransport {
    type Handle = HidApiHandle;

    fn enumerate(&self) -> Result<Vec<EndpointInfo>, TransportError> {
        let mut api = self.api.lock();
        api.refresh_devices()?;

        Ok(api
            .device_list()
            .map(|d| EndpointInfo {
                path: d.path().to_string_lossy().into_owned(),
                vendor_id: d.vendor_id(),
                product_id: d.product_id(),
            })
            .collect())
    }

    fn read_descriptor(
        &self,
        endpoint: &EndpointInfo,
        kind: DescriptorKind,
    ) -> Result<Option<String>, TransportError> {
        let api = self.api.lock();
        let info = api
            .device_list()
            .find(|d| d.path().to_string_lossy() == endpoint.path)
            .ok_or_else(|| TransportError::EndpointNotFound(endpoint.path.clone()))?;

        let value = match kind {
            DescriptorKind::Manufacturer => info.manufacturer_string(),
            DescriptorKind::Product => info.product_string(),
        };
        Ok(value.map(str::to_owned))
    }

    fn open(&self, endpoint: &EndpointInfo) -> Result<HidApiHandle, TransportError> {
        let path = CString::new(endpoint.path.as_str())
            .map_err(|_| TransportError::InvalidPath(endpoint.path.clone()))?;
        let device = self.api.lock().open_path(&path)?;
        debug!("Opened HID endpoint {}", endpoint.path);
        Ok(HidApiHandle::new(device))
    }
}

/// Open `hidapi` device
///
/// `HidDevice` is not `Sync`, so reads and writes take turns on the mutex.
/// The poll loop reads with a short timeout so writers are not held off for long.
pub struct HidApiHandle {
    device: Mutex<Option<HidDevice>>,
}

impl HidApiHandle {
    pub fn new(device: HidDevice) -> Self {
        Self {
            device: Mutex::new(Some(device)),
        }
    }
}

impl DeckHandle for HidApiHandle {
    fn read(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        let guard = self.device.lock();
        let device = guard.as_ref().ok_or(TransportError::Closed)?;
        Ok(device.read_timeout(buf, timeout_ms)?)
    }

    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let guard = self.device.lock();
        let device = guard.as_ref().ok_or(TransportError::Closed)?;
        Ok(device.write(data)?)
    }

    fn close(&self) {
        if self.device.lock().take().is_some() {
            debug!("HID device closed");
        }
    }
}
