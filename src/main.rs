/*!
 * irqd - Emulation Host
 *
 * Runs an event core with one emulated module and a demo client that
 * prints every event it reads. Useful for exercising the core without
 * hardware.
 *
 * Environment:
 * - IRQ_QUEUE_CAPACITY, IRQ_CLIENTS_MAX, IRQ_DEFAULT_TIMEOUT_DS: core sizing
 * - IRQ_EMU_SOURCES: sources on the emulated module (default 8)
 */

use anyhow::{Context, Result};
use irq_event_core::{
    init_tracing, ControlRequest, CoreConfig, EmulatedInterrupt, EventCore, EventError, ModuleSpec,
    SubscriptionMode, Timeout,
};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = CoreConfig::from_env().context("invalid core configuration")?;
    let core = EventCore::new(config).context("event core failed to start")?;

    let sources = std::env::var("IRQ_EMU_SOURCES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8);
    let module = core.install_module(ModuleSpec::new("emu0", sources).emulated(0b1))?;

    let client = core.open(std::process::id(), Some(module))?;
    core.control(
        client,
        ControlRequest::Connect {
            module: None,
            source: 0,
            mode: SubscriptionMode::Queued,
        },
    )?;
    core.control(
        client,
        ControlRequest::Connect {
            module: None,
            source: 1,
            mode: SubscriptionMode::Cumulative,
        },
    )?;
    info!(%module, %client, "emulation host ready, press Ctrl+C to exit");

    // Bursts on source 1 fold into cumulative events
    let burst_core = core.clone();
    let burst = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            for _ in 0..3 {
                let irq = EmulatedInterrupt::new(0b10);
                if let Err(err) = burst_core.emulate(module, irq) {
                    warn!(error = %err, "emulated burst rejected");
                    return;
                }
            }
        }
    });

    let reader_core = core.clone();
    let reader = tokio::spawn(async move {
        loop {
            match reader_core
                .read_async(client, Some(Timeout::from_millis(1000)))
                .await
            {
                Ok(read) => info!(
                    connection = %read.event.connection,
                    time = %read.event.time,
                    occurrences = read.event.occurrences,
                    missed = read.missed,
                    "event"
                ),
                Err(EventError::TimedOut) => info!("no event within 1s"),
                Err(err) if err.is_recoverable() => warn!(error = %err, "read interrupted"),
                Err(err) => {
                    info!(error = %err, "reader stopping");
                    break;
                }
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("shutting down");

    burst.abort();
    core.shutdown();
    let _ = reader.await;

    let stats = serde_json::to_string(&core.stats())?;
    info!(stats = %stats, "final statistics");
    Ok(())
}
