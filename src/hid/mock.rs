//! Scripted transport for testing without hardware
//!
//! [`MockHandle`] replays queued reads and records every write. Handles are
//! cheap clones of shared state, so a test keeps one clone to script the device
//! while the deck owns another.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use super::error::TransportError;
use super::keys::report_offset;
use super::protocol::INPUT_REPORT_LEN;
use super::transport::{DeckHandle, DescriptorKind, EndpointInfo, Transport};

/// One scripted read result
#[derive(Debug, Clone)]
enum ReadStep {
    Report(Vec<u8>),
    Timeout,
    Error,
}

#[derive(Default)]
struct HandleState {
    reads: VecDeque<ReadStep>,
    writes: Vec<Vec<u8>>,
    /// Zero-based write indices that fail
    failing_writes: Vec<usize>,
    write_attempts: usize,
    closed: bool,
    close_count: usize,
}

#[derive(Default)]
struct Shared {
    state: Mutex<HandleState>,
    readable: Condvar,
}

/// Scripted device handle
#[derive(Clone, Default)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw input report
    pub fn push_report(&self, report: Vec<u8>) {
        self.push(ReadStep::Report(report));
    }

    /// Queue a well-formed report with the given logical keys pressed
    pub fn push_keys(&self, keys: &[u8]) {
        let mut report = vec![0u8; INPUT_REPORT_LEN];
        report[0] = 0x01;
        for offset in keys.iter().filter_map(|&k| report_offset(k)) {
            report[offset] = 0x01;
        }
        self.push_report(report);
    }

    /// Queue a read that times out without data
    pub fn push_timeout(&self) {
        self.push(ReadStep::Timeout);
    }

    /// Queue a failing read
    pub fn push_read_error(&self) {
        self.push(ReadStep::Error);
    }

    fn push(&self, step: ReadStep) {
        self.shared.state.lock().reads.push_back(step);
        self.shared.readable.notify_all();
    }

    /// Make the `index`-th write (zero-based, counting every attempt) fail
    pub fn fail_write(&self, index: usize) {
        self.shared.state.lock().failing_writes.push(index);
    }

    /// Successful writes so far
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().writes.clone()
    }

    /// Scripted reads not yet consumed
    pub fn pending_reads(&self) -> usize {
        self.shared.state.lock().reads.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn close_count(&self) -> usize {
        self.shared.state.lock().close_count
    }
}

impl DeckHandle for MockHandle {
    fn read(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        let mut state = self.shared.state.lock();
        if state.reads.is_empty() && !state.closed {
            let timeout = Duration::from_millis(timeout_ms.max(0) as u64);
            self.shared.readable.wait_for(&mut state, timeout);
        }
        if state.closed {
            return Err(TransportError::Closed);
        }

        match state.reads.pop_front() {
            Some(ReadStep::Report(report)) => {
                let len = report.len().min(buf.len());
                buf[..len].copy_from_slice(&report[..len]);
                Ok(len)
            }
            Some(ReadStep::Timeout) | None => Ok(0),
            Some(ReadStep::Error) => Err(TransportError::Hid("scripted read failure".into())),
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        let attempt = state.write_attempts;
        state.write_attempts += 1;
        if state.failing_writes.contains(&attempt) {
            return Err(TransportError::Hid("scripted write failure".into()));
        }
        state.writes.push(data.to_vec());
        Ok(data.len())
    }

    fn close(&self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        state.close_count += 1;
        self.shared.readable.notify_all();
    }
}

/// A scripted endpoint with its descriptor strings
#[derive(Clone)]
pub struct MockEndpoint {
    pub info: EndpointInfo,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub handle: MockHandle,
}

impl MockEndpoint {
    pub fn new(path: &str, manufacturer: Option<&str>, product: Option<&str>) -> Self {
        Self {
            info: EndpointInfo {
                path: path.to_string(),
                vendor_id: 0x0FD9,
                product_id: 0x0060,
            },
            manufacturer: manufacturer.map(str::to_owned),
            product: product.map(str::to_owned),
            handle: MockHandle::new(),
        }
    }
}

/// Scripted transport exposing a fixed list of endpoints
#[derive(Clone, Default)]
pub struct MockTransport {
    endpoints: Vec<MockEndpoint>,
    /// Paths whose descriptor reads fail
    broken_descriptors: Vec<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: MockEndpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Make descriptor reads for `path` fail
    pub fn with_broken_descriptors(mut self, path: &str) -> Self {
        self.broken_descriptors.push(path.to_string());
        self
    }

    /// Handle that opening `path` hands out
    pub fn handle(&self, path: &str) -> Option<MockHandle> {
        self.find(path).map(|e| e.handle.clone())
    }

    fn find(&self, path: &str) -> Option<&MockEndpoint> {
        self.endpoints.iter().find(|e| e.info.path == path)
    }
}

impl Transport for MockTransport {
    type Handle = MockHandle;

    fn enumerate(&self) -> Result<Vec<EndpointInfo>, TransportError> {
        Ok(self.endpoints.iter().map(|e| e.info.clone()).collect())
    }

    fn read_descriptor(
        &self,
        endpoint: &EndpointInfo,
        kind: DescriptorKind,
    ) -> Result<Option<String>, TransportError> {
        if self.broken_descriptors.contains(&endpoint.path) {
            return Err(TransportError::Hid("scripted descriptor failure".into()));
        }
        let found = self
            .find(&endpoint.path)
            .ok_or_else(|| TransportError::EndpointNotFound(endpoint.path.clone()))?;
        Ok(match kind {
            DescriptorKind::Manufacturer => found.manufacturer.clone(),
            DescriptorKind::Product => found.product.clone(),
        })
    }

    fn open(&self, endpoint: &EndpointInfo) -> Result<MockHandle, TransportError> {
        self.find(&endpoint.path)
            .map(|e| e.handle.clone())
            .ok_or_else(|| TransportError::EndpointNotFound(endpoint.path.clone()))
    }
}
