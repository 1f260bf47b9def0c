//! Capture session - lifetime of one open keyboard plus its heartbeat
//!
//! State machine: `Idle -> Opening -> Active -> Closing -> Closed`, with
//! `Opening -> Closed` when the open fails. The handle and heartbeat are
//! owned together by [`ActiveDevice`], which always tears down in the same
//! order: stop heartbeat, join heartbeat thread, close handle.

use super::error::{OpenError, SessionError, WriteError};
use super::events::{SessionEvent, SessionEventSender};
use super::heartbeat::Heartbeat;
use crate::hid::{
    DeviceDescriptor, DeviceHandle, DeviceTransport, Led, OutputReport, TransportError,
};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Longest a capture pause goes without checking the shutdown flag
pub const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Opening,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    /// Whether `self -> next` is an edge of the session state machine
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Opening)
                | (Idle, Closed)
                | (Opening, Active)
                | (Opening, Closed)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Opening => "opening",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What the capture loop forwards and for how long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePlan {
    /// Pause between consecutive reports
    pub report_interval: Duration,
    /// Stop after this many reports; 0 runs until cancelled
    pub max_reports: u64,
    /// Indicator toggled by each report
    pub led: Led,
}

impl Default for CapturePlan {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_millis(500),
            max_reports: 0,
            led: Led::CapsLock,
        }
    }
}

/// Open handle and the heartbeat running alongside it
struct ActiveDevice<H: DeviceHandle> {
    handle: Option<H>,
    heartbeat: Option<Heartbeat>,
    events: Option<SessionEventSender>,
}

impl<H: DeviceHandle> ActiveDevice<H> {
    fn new(handle: H, events: Option<SessionEventSender>) -> Self {
        Self {
            handle: Some(handle),
            heartbeat: None,
            events,
        }
    }

    /// Stop and join the heartbeat, then close the handle
    fn release(&mut self) {
        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
        if let Some(handle) = self.handle.take() {
            handle.close();
            if let Some(ref tx) = self.events {
                tx.send(SessionEvent::HandleReleased);
            }
            debug!("Device handle released");
        }
    }
}

impl<H: DeviceHandle> Drop for ActiveDevice<H> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Session over one keyboard identified by vendor/product id
pub struct CaptureSession<T: DeviceTransport> {
    transport: T,
    vendor_id: u16,
    product_id: u16,
    state: SessionState,
    device: Option<ActiveDevice<T::Handle>>,
    events: Option<SessionEventSender>,
    reports_written: u64,
}

impl<T: DeviceTransport> CaptureSession<T> {
    /// Create an idle session. Both ids are expected to be validated non-zero.
    pub fn new(transport: T, vendor_id: u16, product_id: u16) -> Self {
        Self {
            transport,
            vendor_id,
            product_id,
            state: SessionState::Idle,
            device: None,
            events: None,
            reports_written: 0,
        }
    }

    /// Publish lifecycle events to `events`
    pub fn with_events(mut self, events: SessionEventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    pub fn reports_written(&self) -> u64 {
        self.reports_written
    }

    pub fn heartbeat_running(&self) -> bool {
        self.device
            .as_ref()
            .and_then(|d| d.heartbeat.as_ref())
            .is_some_and(Heartbeat::is_running)
    }

    /// Heartbeat ticks left before its next firing, `None` without a heartbeat
    pub fn heartbeat_remaining(&self) -> Option<u32> {
        self.device
            .as_ref()
            .and_then(|d| d.heartbeat.as_ref())
            .map(Heartbeat::remaining)
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid session transition {} -> {}",
            self.state,
            next
        );
        debug!("Session {} -> {}", self.state, next);
        self.state = next;
        if let Some(ref tx) = self.events {
            tx.send(SessionEvent::StateChanged(next));
        }
    }

    /// Open the first attached device matching the session's ids.
    ///
    /// On failure the session ends `Closed` without ever becoming active.
    pub fn open(&mut self) -> Result<(), OpenError> {
        if self.state != SessionState::Idle {
            return Err(OpenError::InvalidState(self.state));
        }

        self.transition(SessionState::Opening);
        match self.transport.open_first(self.vendor_id, self.product_id) {
            Ok(handle) => {
                self.device = Some(ActiveDevice::new(handle, self.events.clone()));
                self.transition(SessionState::Active);
                info!(
                    "Capturing device {:04x}:{:04x}",
                    self.vendor_id, self.product_id
                );
                Ok(())
            }
            Err(e) => {
                self.transition(SessionState::Closed);
                Err(match e {
                    TransportError::NotFound {
                        vendor_id,
                        product_id,
                    } => OpenError::NotFound {
                        vendor_id,
                        product_id,
                    },
                    source => OpenError::Transport {
                        vendor_id: self.vendor_id,
                        product_id: self.product_id,
                        source,
                    },
                })
            }
        }
    }

    /// Descriptor of the open device; query failures are logged and yield `None`
    pub fn device_info(&self) -> Option<DeviceDescriptor> {
        let handle = self.device.as_ref()?.handle.as_ref()?;
        match handle.info() {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("Failed to query device info: {}", e);
                None
            }
        }
    }

    /// Launch the heartbeat next to the capture work.
    ///
    /// `on_fire` runs once every `reload` periods until the session closes.
    pub fn start_heartbeat<F>(
        &mut self,
        period: Duration,
        reload: NonZeroU32,
        on_fire: F,
    ) -> Result<(), SessionError>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        if self.state != SessionState::Active {
            return Err(SessionError::NotActive(self.state));
        }
        let events = self.events.clone();
        let device = self
            .device
            .as_mut()
            .ok_or(SessionError::NotActive(self.state))?;
        if device.heartbeat.is_some() {
            return Err(SessionError::HeartbeatRunning);
        }

        let heartbeat = Heartbeat::start(period, reload, on_fire, events)
            .map_err(SessionError::HeartbeatSpawn)?;
        device.heartbeat = Some(heartbeat);
        Ok(())
    }

    /// Forward one output report.
    ///
    /// Any failure, including a short write, moves the session to `Closing`.
    /// The heartbeat keeps running until [`close`](Self::close).
    pub fn write(&mut self, report: &OutputReport) -> Result<(), WriteError> {
        if self.state != SessionState::Active {
            return Err(WriteError::NotActive(self.state));
        }

        let bytes = report.as_bytes();
        let result = match self.device.as_mut().and_then(|d| d.handle.as_mut()) {
            Some(handle) => handle.write(bytes).and_then(|written| {
                if written < bytes.len() {
                    Err(TransportError::ShortWrite {
                        written,
                        expected: bytes.len(),
                    })
                } else {
                    Ok(())
                }
            }),
            None => return Err(WriteError::NotActive(self.state)),
        };

        match result {
            Ok(()) => {
                self.reports_written += 1;
                debug!("Report {} written: {:02x?}", self.reports_written, bytes);
                if let Some(ref tx) = self.events {
                    tx.send(SessionEvent::ReportWritten {
                        seq: self.reports_written,
                    });
                }
                Ok(())
            }
            Err(e) => {
                error!("Write to device failed: {}", e);
                self.transition(SessionState::Closing);
                Err(e.into())
            }
        }
    }

    /// Forward reports per `plan` until done, cancelled via `shutdown`, or a
    /// write fails. Leaves the session `Closing`; returns reports written.
    pub fn run_capture(
        &mut self,
        plan: &CapturePlan,
        shutdown: &AtomicBool,
    ) -> Result<u64, WriteError> {
        if self.state != SessionState::Active {
            return Err(WriteError::NotActive(self.state));
        }

        info!(
            "Forwarding {} reports every {:?}",
            plan.led, plan.report_interval
        );

        let mut written: u64 = 0;
        let mut lit = false;
        let outcome = loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Capture cancelled after {} reports", written);
                break Ok(written);
            }

            lit = !lit;
            if let Err(e) = self.write(&OutputReport::toggle(plan.led, lit)) {
                break Err(e);
            }
            written += 1;

            if plan.max_reports > 0 && written >= plan.max_reports {
                info!("Capture finished after {} reports", written);
                break Ok(written);
            }
            pause(plan.report_interval, shutdown);
        };

        if self.state == SessionState::Active {
            self.transition(SessionState::Closing);
        }
        outcome
    }

    /// Tear the session down. Idempotent; a closed session is left untouched.
    pub fn close(&mut self) {
        match self.state {
            SessionState::Closed => {}
            SessionState::Idle | SessionState::Opening => self.transition(SessionState::Closed),
            SessionState::Active | SessionState::Closing => {
                if self.state == SessionState::Active {
                    self.transition(SessionState::Closing);
                }
                if let Some(mut device) = self.device.take() {
                    device.release();
                }
                self.transition(SessionState::Closed);
                info!("Session closed after {} reports", self.reports_written);
            }
        }
    }
}

impl<T: DeviceTransport> Drop for CaptureSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sleep for `duration`, waking early once `shutdown` is raised
fn pause(duration: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + duration;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(SHUTDOWN_POLL));
    }
}
