//! rtscope demo - Main Entry Point
//!
//! Runs the acquisition pipeline against two generated signals (a sine and a
//! ramp), triggers on the sine's rising zero crossing and logs pipeline
//! statistics once per second.
//!
//! Usage: `rtscope [config.toml] [seconds]`

use anyhow::Context;
use rtscope::config::{default_config_path, ScopeConfig};
use rtscope::{AtomicSource, Scope, SourceRegistry, TriggerConfig, TriggerDirection, ValueKind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SINE_HZ: f64 = 50.0;
const RAMP_PERIOD: Duration = Duration::from_millis(200);

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from).or_else(default_config_path);
    let run_for = match args.next() {
        Some(secs) => Duration::from_secs(secs.parse().context("Invalid run time")?),
        None => Duration::from_secs(3),
    };

    let config = match &config_path {
        Some(path) => ScopeConfig::load_or_default(path),
        None => ScopeConfig::default(),
    };

    // Initialize logging
    let file_layer = config.log_dir.as_ref().map(|dir| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(tracing_appender::rolling::daily(dir, "rtscope.log"))
    });
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,rtscope=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    tracing::info!("Starting rtscope demo ({:?})", run_for);
    if let Some(path) = &config_path {
        tracing::debug!("Config path: {}", path.display());
    }

    // Signal sources, driven by a generator thread
    let sources = Arc::new(SourceRegistry::new());
    let sine = Arc::new(AtomicSource::new("Sine", 0, 1));
    let ramp = Arc::new(AtomicSource::new("Ramp", 0, 1));
    let sine_id = sources.register(sine.clone());
    let ramp_id = sources.register(ramp.clone());

    let running = Arc::new(AtomicBool::new(true));
    let generator = {
        let running = running.clone();
        let period = config.period();
        std::thread::Builder::new()
            .name("rtscope-gen".to_string())
            .spawn(move || {
                let start = Instant::now();
                while running.load(Ordering::SeqCst) {
                    let t = start.elapsed().as_secs_f64();
                    sine.set(
                        ValueKind::Output,
                        0,
                        (2.0 * std::f64::consts::PI * SINE_HZ * t).sin(),
                    );
                    let phase = (t / RAMP_PERIOD.as_secs_f64()).fract();
                    ramp.set(ValueKind::Output, 0, 2.0 * phase - 1.0);
                    std::thread::sleep(period / 2);
                }
            })
            .context("Failed to spawn generator thread")?
    };

    let mut scope = Scope::new(config, sources.clone())?;
    let sine_channel = scope.add_channel(sine_id, ValueKind::Output, 0)?;
    scope.add_channel(ramp_id, ValueKind::Output, 0)?;

    let mut trigger = TriggerConfig::on(sine_channel, TriggerDirection::Rising, 0.0);
    trigger.holdoff = Duration::from_millis(100);
    scope.set_trigger(trigger)?;

    let start = Instant::now();
    let mut last_report = Instant::now();
    while start.elapsed() < run_for {
        std::thread::sleep(scope.config().drain_interval());
        scope.poll();

        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            let stats = scope.stats();
            tracing::info!(
                "periods {} written {} dropped {} drained {} triggers {} (accepted {})",
                stats.periods,
                stats.frames_written,
                stats.frames_dropped,
                stats.frames_drained,
                stats.trigger_events,
                scope.trigger_gate().accepted()
            );
            for trace in scope.channels() {
                if let Some((lo, hi)) = trace.waveform.value_range() {
                    tracing::debug!("{}: [{:.3}, {:.3}]", trace.label, lo, hi);
                }
            }
        }
    }

    // Tear the ramp down the way a host would when a block is deleted
    sources.unregister(ramp_id);
    scope.source_removed(ramp_id)?;

    let profile = scope.profile("demo");
    tracing::info!(
        "Final profile: {} channel(s), trigger {}",
        profile.channels.len(),
        profile.trigger.direction
    );

    tracing::info!("Shutting down...");
    scope.shutdown();
    running.store(false, Ordering::SeqCst);
    if generator.join().is_err() {
        tracing::error!("Generator thread panicked");
    }

    Ok(())
}
