//! Run a composition.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use clap::{Args, ValueEnum};
use sluice_config::{Settings, TelemetryMode};
use sluice_core::{CompositionIdentifier, PortValue};
use sluice_runtime::{ControlError, LifecycleState, Runner, TelemetrySubscription};

use super::common::{load, parse_value, source_label};
use crate::report::{format_record, format_stats};

/// How often blocking loops check for Ctrl+C.
const POLL: Duration = Duration::from_millis(50);

/// Telemetry stream selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum TelemetryArg {
    /// Executions and port activity, without values
    Events,
    /// Everything, with value summaries
    All,
    /// Nothing
    None,
}

impl From<TelemetryArg> for TelemetryMode {
    fn from(arg: TelemetryArg) -> Self {
        match arg {
            TelemetryArg::Events => TelemetryMode::Events,
            TelemetryArg::All => TelemetryMode::All,
            TelemetryArg::None => TelemetryMode::None,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    /// Factory composition name, user composition name, or file path
    composition: String,

    /// Trigger port to fire, as `Node:port` (repeatable)
    #[arg(short, long = "fire", value_name = "ID")]
    fire: Vec<String>,

    /// Value the fired triggers carry (JSON, or bare text)
    #[arg(long, value_parser = parse_value)]
    value: Option<PortValue>,

    /// Number of rounds of firings
    #[arg(short = 'n', long, default_value = "1")]
    count: u32,

    /// Delay between rounds of firings in milliseconds
    #[arg(long, default_value = "0")]
    interval_ms: u64,

    /// Keep running this long after the last firing, then stop
    #[arg(long, value_name = "MS")]
    duration_ms: Option<u64>,

    /// Telemetry stream to print (defaults to the settings file)
    #[arg(long, value_enum)]
    telemetry: Option<TelemetryArg>,

    /// Composition whose telemetry is printed, e.g. `Top/Sub`
    #[arg(long, value_name = "PATH")]
    scope: Option<CompositionIdentifier>,

    /// Also print every update of this port in the scoped composition
    #[arg(long, value_name = "ID")]
    watch: Option<String>,

    /// Start paused; trigger nodes stay idle and firings are rejected
    #[arg(long)]
    paused: bool,

    /// Settings file (defaults to the user settings file)
    #[arg(long)]
    settings: Option<PathBuf>,
}

pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::load_or_default()?,
    };
    let mut config = settings.runtime.clone();
    if args.paused {
        config.start_paused = true;
    }
    let mode = args
        .telemetry
        .map_or(settings.telemetry.mode, TelemetryMode::from);
    let scope = args
        .scope
        .clone()
        .unwrap_or_else(|| settings.telemetry.scope.clone());

    let loaded = load(&args.composition)?;
    let schedule = loaded.file.compile(&loaded.registry)?;
    let published: Vec<String> = schedule
        .published_outputs()
        .iter()
        .map(|p| p.name().to_string())
        .collect();

    println!(
        "Running {} ({})",
        loaded.file.name,
        source_label(&loaded.source)
    );
    let runner = Runner::build(schedule, Arc::new(loaded.registry), config)?;

    let mut subscriptions = Vec::new();
    match mode {
        TelemetryMode::Events => subscriptions.push(runner.subscribe_to_event_telemetry(&scope)),
        TelemetryMode::All => subscriptions.push(runner.subscribe_to_all_telemetry(&scope)),
        TelemetryMode::None => {}
    }
    if let Some(port) = &args.watch {
        subscriptions.push(runner.subscribe_to_port_telemetry(&scope, port));
    }
    let done = Arc::new(AtomicBool::new(false));
    let printers: Vec<_> = subscriptions
        .into_iter()
        .map(|sub| spawn_printer(sub, Arc::clone(&done)))
        .collect::<Result<_, _>>()?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    runner.launch()?;
    let outcome = drive(&runner, &args, &running);
    runner.stop();

    done.store(true, Ordering::SeqCst);
    for printer in printers {
        let _ = printer.join();
    }

    println!();
    for name in &published {
        let value = runner.published_output_value(name)?;
        println!("  {name} = {value}");
    }
    println!("{}", format_stats(&runner.stats()));

    outcome?;
    if runner.state() == LifecycleState::Failed {
        anyhow::bail!("composition '{}' failed", loaded.file.name);
    }
    Ok(())
}

/// Fires the requested triggers, then waits for the run to end.
fn drive(runner: &Runner, args: &RunArgs, running: &AtomicBool) -> anyhow::Result<()> {
    'rounds: for round in 0..args.count {
        if !running.load(Ordering::SeqCst) || runner.state().is_terminal() {
            break;
        }
        if round > 0 && args.interval_ms > 0 {
            thread::sleep(Duration::from_millis(args.interval_ms));
        }
        for id in &args.fire {
            let result = match &args.value {
                Some(value) => runner.fire_trigger_port_event_with_value(id, value.clone()),
                None => runner.fire_trigger_port_event(id),
            };
            match result {
                Ok(admission) if admission.is_dropped() => {
                    tracing::info!("{id}: dropped (trigger busy)");
                }
                Ok(_) => {}
                Err(ControlError::Paused) => {
                    tracing::warn!("{id}: rejected, composition is paused");
                }
                Err(ControlError::Failed | ControlError::Stopped) => break 'rounds,
                Err(e) => return Err(e.into()),
            }
        }
    }

    if let Some(ms) = args.duration_ms {
        let deadline = Instant::now() + Duration::from_millis(ms);
        while running.load(Ordering::SeqCst)
            && !runner.state().is_terminal()
            && Instant::now() < deadline
        {
            thread::sleep(POLL);
        }
    } else if !args.fire.is_empty() {
        while running.load(Ordering::SeqCst)
            && !runner.instance().wait_idle(POLL)
            && !runner.state().is_terminal()
        {}
    } else {
        println!("Press Ctrl+C to stop...");
        while running.load(Ordering::SeqCst) && !runner.state().is_terminal() {
            thread::sleep(POLL);
        }
    }
    Ok(())
}

fn spawn_printer(
    subscription: TelemetrySubscription,
    done: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sluice-telemetry".to_string())
        .spawn(move || {
            loop {
                if let Some(record) = subscription.recv_timeout(POLL) {
                    println!("{}", format_record(&record));
                } else if done.load(Ordering::SeqCst) {
                    for record in subscription.drain() {
                        println!("{}", format_record(&record));
                    }
                    break;
                }
            }
        })
}
