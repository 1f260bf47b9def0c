//! HID device discovery and connection handles

use hidapi::{DeviceInfo, HidApi, HidDevice, HidError};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced by the HID/USB stack
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no HID device matching {vendor_id:04x}:{product_id:04x}")]
    NotFound { vendor_id: u16, product_id: u16 },

    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error(transparent)]
    Hid(#[from] HidError),

    #[error("{0}")]
    Other(String),
}

/// Static description of an attached HID interface
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceDescriptor {
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub interface_number: i32,
    pub usage_page: u16,
    pub usage: u16,
}

impl DeviceDescriptor {
    /// Whether this descriptor passes the optional VID/PID filters (`None` = any)
    pub fn matches(&self, vendor: Option<u16>, product: Option<u16>) -> bool {
        vendor.map_or(true, |v| v == self.vendor_id)
            && product.map_or(true, |p| p == self.product_id)
    }
}

impl From<&DeviceInfo> for DeviceDescriptor {
    fn from(info: &DeviceInfo) -> Self {
        Self {
            path: info.path().to_string_lossy().into_owned(),
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            serial_number: info.serial_number().map(str::to_owned),
            manufacturer: info.manufacturer_string().map(|s| s.trim().to_owned()),
            product: info.product_string().map(|s| s.trim().to_owned()),
            interface_number: info.interface_number(),
            usage_page: info.usage_page(),
            usage: info.usage(),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: ID {:04x}:{:04x} '{}' '{}'",
            self.path,
            self.vendor_id,
            self.product_id,
            self.manufacturer.as_deref().unwrap_or(""),
            self.product.as_deref().unwrap_or("")
        )
    }
}

/// Access to the host's HID stack
pub trait DeviceTransport {
    type Handle: DeviceHandle;

    /// List attached devices, optionally filtered by vendor and product id
    fn enumerate(
        &mut self,
        vendor: Option<u16>,
        product: Option<u16>,
    ) -> Result<Vec<DeviceDescriptor>, TransportError>;

    /// Open the first device matching both ids
    fn open_first(
        &mut self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<Self::Handle, TransportError>;
}

/// One open device connection
pub trait DeviceHandle: Send {
    /// Write one output report; returns the number of bytes accepted
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;

    fn info(&self) -> Result<DeviceDescriptor, TransportError>;

    /// Release the connection
    fn close(self)
    where
        Self: Sized,
    {
    }
}

/// Enumerate attached devices for display.
///
/// Enumeration is informational only: a failure is logged and yields an
/// empty list.
pub fn list_devices<T: DeviceTransport>(
    transport: &mut T,
    vendor: Option<u16>,
    product: Option<u16>,
) -> Vec<DeviceDescriptor> {
    match transport.enumerate(vendor, product) {
        Ok(devices) => devices,
        Err(e) => {
            warn!("Failed to enumerate HID devices: {}", e);
            Vec::new()
        }
    }
}

/// Transport backed by the system hidapi library
pub struct HidApiTransport {
    api: HidApi,
}

impl HidApiTransport {
    pub fn new() -> Result<Self, TransportError> {
        let api = HidApi::new()?;

        // Keep other readers off the keyboard while it is captured
        #[cfg(target_os = "macos")]
        {
            api.set_open_exclusive(true);
        }

        Ok(Self { api })
    }

    fn refresh(&mut self) {
        if let Err(e) = self.api.refresh_devices() {
            debug!("Failed to refresh device list: {}", e);
        }
    }
}

impl DeviceTransport for HidApiTransport {
    type Handle = HidApiHandle;

    fn enumerate(
        &mut self,
        vendor: Option<u16>,
        product: Option<u16>,
    ) -> Result<Vec<DeviceDescriptor>, TransportError> {
        self.api.refresh_devices()?;
        Ok(self
            .api
            .device_list()
            .map(DeviceDescriptor::from)
            .filter(|d| d.matches(vendor, product))
            .collect())
    }

    fn open_first(
        &mut self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<HidApiHandle, TransportError> {
        self.refresh();

        let info = self
            .api
            .device_list()
            .find(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .ok_or(TransportError::NotFound {
                vendor_id,
                product_id,
            })?;

        let descriptor = DeviceDescriptor::from(info);
        let device = info.open_device(&self.api)?;

        info!("Opened device: {}", descriptor);
        Ok(HidApiHandle { device, descriptor })
    }
}

/// Open hidapi device plus the descriptor it was opened from
pub struct HidApiHandle {
    device: HidDevice,
    descriptor: DeviceDescriptor,
}

impl DeviceHandle for HidApiHandle {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let written = self.device.write(bytes)?;
        debug!("Wrote {} bytes to HID device", written);
        Ok(written)
    }

    fn info(&self) -> Result<DeviceDescriptor, TransportError> {
        let info = self.device.get_device_info()?;
        Ok(DeviceDescriptor::from(&info))
    }

    fn close(self) {
        // hidapi closes the handle when HidDevice drops
        info!("Closed device: {}", self.descriptor.path);
    }
}
