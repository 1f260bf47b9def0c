//! HID module - transport to the captured keyboard and its output reports

mod device;
#[cfg(any(test, feature = "mock-hid"))]
pub mod mock;
pub mod report;

pub use device::{
    list_devices, DeviceDescriptor, DeviceHandle, DeviceTransport, HidApiHandle, HidApiTransport,
    TransportError,
};
pub use report::{Led, OutputReport, LED_REPORT_SIZE};
