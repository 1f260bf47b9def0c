//! Boot-keyboard LED output report
//!
//! Layout sent through hidapi:
//! - Byte 0: report id (0x00, keyboards with a single report)
//! - Byte 1: LED bitmap (bit 0 Num Lock .. bit 4 Kana)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output report size in bytes, report id included
pub const LED_REPORT_SIZE: usize = 2;

/// Report id used by devices that declare a single report
pub const DEFAULT_REPORT_ID: u8 = 0x00;

/// Keyboard indicator LEDs, values are their bit in the LED bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Led {
    NumLock = 0x01,
    #[default]
    CapsLock = 0x02,
    ScrollLock = 0x04,
    Compose = 0x08,
    Kana = 0x10,
}

impl Led {
    pub fn bit(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Led {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Led::NumLock => "num_lock",
            Led::CapsLock => "caps_lock",
            Led::ScrollLock => "scroll_lock",
            Led::Compose => "compose",
            Led::Kana => "kana",
        };
        f.write_str(name)
    }
}

/// A fixed-size LED output report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputReport {
    data: [u8; LED_REPORT_SIZE],
}

impl Default for OutputReport {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputReport {
    /// All LEDs off
    pub fn new() -> Self {
        Self {
            data: [DEFAULT_REPORT_ID, 0],
        }
    }

    /// Report with exactly the given LEDs lit
    pub fn leds(lit: &[Led]) -> Self {
        let mut report = Self::new();
        for led in lit {
            report.set(*led, true);
        }
        report
    }

    /// Report with only `led` set to `on`
    pub fn toggle(led: Led, on: bool) -> Self {
        let mut report = Self::new();
        report.set(led, on);
        report
    }

    pub fn set(&mut self, led: Led, on: bool) {
        if on {
            self.data[1] |= led.bit();
        } else {
            self.data[1] &= !led.bit();
        }
    }

    pub fn is_lit(&self, led: Led) -> bool {
        self.data[1] & led.bit() != 0
    }

    pub fn report_id(&self) -> u8 {
        self.data[0]
    }

    pub fn led_bits(&self) -> u8 {
        self.data[1]
    }

    /// Raw bytes for the transport
    pub fn as_bytes(&self) -> &[u8; LED_REPORT_SIZE] {
        &self.data
    }
}
