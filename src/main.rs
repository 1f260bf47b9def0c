//! hidhub - Entry Point
//!
//! Layers command-line flags over the config file, then either lists
//! attached HID devices or runs one capture session until it completes,
//! Ctrl-C is pressed, or the device fails.

use clap::{Args, Parser, Subcommand};
use hidhub::hid::{list_devices, DeviceTransport};
use hidhub::{
    parse_usb_id, CaptureSession, Config, ConfigError, HubError, OpenError, SessionEvent,
    SessionEventSender, SessionSettings,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "hidhub",
    version,
    about = "Capture a USB HID keyboard and forward its reports",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    // Run flags, used when no subcommand is given
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Capture the keyboard and forward reports (default)
    Run(RunArgs),
    /// List attached HID devices
    List(ListArgs),
}

#[derive(Args, Debug, Default, PartialEq)]
struct RunArgs {
    /// Vendor id of the keyboard to forward (e.g. 0x046d)
    #[arg(long, value_parser = parse_usb_id)]
    vendor_id: Option<u16>,

    /// Product id of the keyboard to forward (e.g. 0xc31c)
    #[arg(long, value_parser = parse_usb_id)]
    product_id: Option<u16>,

    /// Heartbeat ticks between liveness announcements (0 disables)
    #[arg(long)]
    heartbeat: Option<u32>,

    /// Heartbeat tick period in milliseconds
    #[arg(long)]
    period_ms: Option<u64>,

    /// Pause between forwarded reports in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Stop after this many reports (0 = until Ctrl-C)
    #[arg(long)]
    count: Option<u64>,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(vendor_id) = self.vendor_id {
            config.device.vendor_id = vendor_id;
        }
        if let Some(product_id) = self.product_id {
            config.device.product_id = product_id;
        }
        if let Some(reload) = self.heartbeat {
            config.heartbeat.reload = reload;
        }
        if let Some(period_ms) = self.period_ms {
            config.heartbeat.period_ms = period_ms;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.capture.report_interval_ms = interval_ms;
        }
        if let Some(count) = self.count {
            config.capture.max_reports = count;
        }
    }
}

#[derive(Args, Debug, PartialEq)]
struct ListArgs {
    /// Only list devices with this vendor id
    #[arg(long, value_parser = parse_usb_id)]
    vendor_id: Option<u16>,

    /// Only list devices with this product id
    #[arg(long, value_parser = parse_usb_id)]
    product_id: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let Cli {
        config,
        verbose,
        run: run_args,
        command,
    } = Cli::parse();

    // Initialize logging
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match command.unwrap_or(Commands::Run(run_args)) {
        Commands::List(args) => list(args),
        Commands::Run(args) => match run(config.as_deref(), args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{}", e);
                ExitCode::from(e.exit_code())
            }
        },
    }
}

/// Print one line per attached HID device
fn list(args: ListArgs) -> ExitCode {
    match new_transport(args.vendor_id, args.product_id) {
        Ok(mut transport) => {
            let devices = list_devices(&mut transport, args.vendor_id, args.product_id);
            for device in &devices {
                println!("{}", device);
            }
            info!("{} HID device(s) found", devices.len());
        }
        Err(e) => warn!("HID devices unavailable: {}", e),
    }
    ExitCode::SUCCESS
}

async fn run(config_path: Option<&Path>, args: RunArgs) -> Result<(), HubError> {
    let mut config = match config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .map_err(ConfigError::Load)?;
    args.apply(&mut config);
    let settings = config.session_settings()?;

    let (events, mut event_rx) = SessionEventSender::channel();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            log_event(&event);
        }
    });

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            flag.store(true, Ordering::Relaxed);
        }
    });

    // Device writes block, keep them off the async workers
    let capture = tokio::task::spawn_blocking(move || run_session(&settings, &shutdown, events));
    match capture.await {
        Ok(result) => result,
        Err(e) => std::panic::resume_unwind(e.into_panic()),
    }
}

/// Open the keyboard, start the heartbeat, and forward until done.
///
/// Every early return drops the session, which closes it in order.
fn run_session(
    settings: &SessionSettings,
    shutdown: &AtomicBool,
    events: SessionEventSender,
) -> Result<(), HubError> {
    let transport = new_transport(Some(settings.vendor_id), Some(settings.product_id))
        .map_err(OpenError::Init)?;
    let mut session = CaptureSession::new(transport, settings.vendor_id, settings.product_id)
        .with_events(events);

    session.open()?;
    if let Some(info) = session.device_info() {
        info!("Device: {}", info);
    }

    if let Some((period, reload)) = settings.heartbeat {
        let mut beats: u64 = 0;
        session.start_heartbeat(period, reload, move || {
            beats += 1;
            info!("Heartbeat {}: alive", beats);
            Ok(())
        })?;
    }

    let result = session.run_capture(&settings.plan, shutdown);
    session.close();

    let written = result?;
    info!("Forwarded {} reports", written);
    Ok(())
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged(state) => debug!("Session state: {}", state),
        SessionEvent::HeartbeatStarted => debug!("Heartbeat started"),
        SessionEvent::HeartbeatFired { count } => debug!("Heartbeat fired ({})", count),
        SessionEvent::HeartbeatStopped => debug!("Heartbeat stopped"),
        SessionEvent::ReportWritten { seq } => debug!("Report {} written", seq),
        SessionEvent::HandleReleased => info!("Device handle released"),
    }
}

#[cfg(not(feature = "mock-hid"))]
fn new_transport(
    _vendor_id: Option<u16>,
    _product_id: Option<u16>,
) -> Result<impl DeviceTransport, hidhub::hid::TransportError> {
    hidhub::hid::HidApiTransport::new()
}

#[cfg(feature = "mock-hid")]
fn new_transport(
    vendor_id: Option<u16>,
    product_id: Option<u16>,
) -> Result<impl DeviceTransport, hidhub::hid::TransportError> {
    info!("Using simulated keyboard");
    Ok(hidhub::hid::mock::MockTransport::new()
        .with_keyboard(vendor_id.unwrap_or(0x046d), product_id.unwrap_or(0xc31c)))
}
