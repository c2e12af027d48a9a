//! Logging setup for an intake host
//!
//! Run with:
//! ```bash
//! cargo run -p core-runtime --example intake_logging
//! cargo run -p core-runtime --example intake_logging -- json "core_intake=trace"
//! ```

use bridge_traits::time::LogLevel;
use core_runtime::events::{CoreEvent, EventBus, EventSeverity, PrecheckEvent, UploadEvent};
use core_runtime::logging::{
    init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use std::env;
use tracing::{debug, info, instrument, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };

    let mut config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Debug)
        .with_pii_redaction(true);

    if let Some(filter) = args.get(2) {
        config = config.with_filter(filter.clone());
    }

    init_logging(config)?;
    info!(format = ?format, "Logging initialized");

    let bus = EventBus::new(64);
    let mut events = bus.subscribe();

    simulate_precheck(&bus)?;
    simulate_run(&bus, "/home/hr/inbox/张三-前端工程师.pdf")?;

    while let Ok(event) = events.try_recv() {
        log_event(&event);
    }

    Ok(())
}

#[instrument(skip(bus))]
fn simulate_precheck(bus: &EventBus) -> anyhow::Result<()> {
    bus.emit(CoreEvent::Precheck(PrecheckEvent::Started { total: 2 }))?;
    bus.emit(CoreEvent::Precheck(PrecheckEvent::Completed {
        checked: 2,
        duplicates: 1,
        unnamed: 0,
        lookup_failures: 0,
    }))?;
    Ok(())
}

#[instrument(skip(bus, path), fields(file = %strip_path(path)))]
fn simulate_run(bus: &EventBus, path: &str) -> anyhow::Result<()> {
    let phone = "13800138000";
    debug!(
        phone = %redact_if_sensitive("phone", phone),
        api_key = %redact_if_sensitive("api_key", "sk-live-123"),
        "Candidate contact parsed"
    );

    bus.emit(CoreEvent::Upload(UploadEvent::RunCompleted {
        run_id: "demo-run".to_string(),
        total: 1,
        succeeded: 1,
        failed: 0,
        skipped: 0,
    }))?;
    Ok(())
}

fn log_event(event: &CoreEvent) {
    match event.severity() {
        EventSeverity::Warning | EventSeverity::Error => {
            warn!(event = %event.description(), "Event received")
        }
        _ => info!(event = %event.description(), "Event received"),
    }
}
