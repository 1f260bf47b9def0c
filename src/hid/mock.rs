//! Simulated keyboard transport for running without hardware

use super::device::{DeviceDescriptor, DeviceHandle, DeviceTransport, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// One observable interaction with the simulated device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Open,
    Write(Vec<u8>),
    Close,
}

/// Shared, ordered record of every call made against mock handles
#[derive(Debug, Clone, Default)]
pub struct MockJournal(Arc<Mutex<Vec<MockCall>>>);

impl MockJournal {
    fn record(&self, call: MockCall) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.0.lock().clone()
    }

    pub fn writes(&self) -> usize {
        self.0.lock().iter().filter(|c| matches!(c, MockCall::Write(_))).count()
    }

    pub fn closes(&self) -> usize {
        self.0.lock().iter().filter(|c| **c == MockCall::Close).count()
    }
}

/// Transport serving a scripted set of devices
#[derive(Debug, Default)]
pub struct MockTransport {
    devices: Vec<DeviceDescriptor>,
    journal: MockJournal,
    fail_write_at: Option<usize>,
    fail_enumeration: bool,
}

impl MockTransport {
    /// Transport with no attached devices
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a simulated keyboard
    pub fn with_keyboard(mut self, vendor_id: u16, product_id: u16) -> Self {
        let index = self.devices.len();
        self.devices.push(DeviceDescriptor {
            path: format!("mock://hidraw{}", index),
            vendor_id,
            product_id,
            serial_number: Some(format!("MOCK{:04}", index)),
            manufacturer: Some("hidhub".to_string()),
            product: Some("Simulated Keyboard".to_string()),
            interface_number: 0,
            usage_page: 0x01,
            usage: 0x06,
        });
        self
    }

    /// Make the `n`th write (1-based) on any opened handle fail
    pub fn fail_write_at(mut self, n: usize) -> Self {
        self.fail_write_at = Some(n);
        self
    }

    pub fn fail_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    pub fn journal(&self) -> MockJournal {
        self.journal.clone()
    }
}

impl DeviceTransport for MockTransport {
    type Handle = MockHandle;

    fn enumerate(
        &mut self,
        vendor: Option<u16>,
        product: Option<u16>,
    ) -> Result<Vec<DeviceDescriptor>, TransportError> {
        if self.fail_enumeration {
            return Err(TransportError::Other("enumeration unavailable".to_string()));
        }
        Ok(self
            .devices
            .iter()
            .filter(|d| d.matches(vendor, product))
            .cloned()
            .collect())
    }

    fn open_first(
        &mut self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<MockHandle, TransportError> {
        let descriptor = self
            .devices
            .iter()
            .find(|d| d.vendor_id == vendor_id && d.product_id == product_id)
            .cloned()
            .ok_or(TransportError::NotFound {
                vendor_id,
                product_id,
            })?;

        self.journal.record(MockCall::Open);
        Ok(MockHandle {
            descriptor,
            journal: self.journal.clone(),
            writes: 0,
            fail_write_at: self.fail_write_at,
        })
    }
}

/// Handle to a simulated keyboard
#[derive(Debug)]
pub struct MockHandle {
    descriptor: DeviceDescriptor,
    journal: MockJournal,
    writes: usize,
    fail_write_at: Option<usize>,
}

impl DeviceHandle for MockHandle {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.writes += 1;
        if self.fail_write_at == Some(self.writes) {
            debug!("Simulated write failure on write {}", self.writes);
            return Err(TransportError::Other("device disconnected".to_string()));
        }
        self.journal.record(MockCall::Write(bytes.to_vec()));
        Ok(bytes.len())
    }

    fn info(&self) -> Result<DeviceDescriptor, TransportError> {
        Ok(self.descriptor.clone())
    }

    fn close(self) {
        self.journal.record(MockCall::Close);
    }
}
