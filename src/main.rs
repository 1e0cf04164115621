use anyhow::Context;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use userflow::kernel::memory::{MemoryGauge, MemoryProbe, ResidentMemory};
use userflow::kernel::time::TICK_MS;
use userflow::{EngineConfig, FlowRegistry, Telemetry, UserflowLayer};

const DEMO_TICKS: u64 = 240;
const TRANSMIT_EVERY_MS: u64 = 500;

fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading config {path}"))?;
            EngineConfig::from_json_str(&raw).with_context(|| format!("parsing config {path}"))
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Stand-in for the external batch sender: one JSON line per record.
fn transmit(telemetry: &Telemetry) {
    for record in telemetry.get_userflow_transmission_list() {
        match serde_json::to_string(&record) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!("Failed to encode record {}: {}", record.name, e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    let include_log_text = config.include_log_text;

    // Host memory figure; a real host would report its heap here
    let gauge = MemoryGauge::new();
    let registry = FlowRegistry::new(config)
        .with_memory(MemoryProbe::new(Box::new(gauge.clone()), Box::new(ResidentMemory::new())));
    let telemetry = Telemetry::new(registry);

    // Initialize logging/tracing; host warnings and errors land in open flows
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(UserflowLayer::new(telemetry.clone()))
        .init();
    tracing::info!("Userflow demo host booting...");

    telemetry.init(include_log_text);
    telemetry.session_start();

    let mut cadence = tokio::time::interval(Duration::from_millis(TICK_MS));
    cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut transmitter = tokio::time::interval(Duration::from_millis(TRANSMIT_EVERY_MS));
    transmitter.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut tick: u64 = 0;
    loop {
        tokio::select! {
            _ = cadence.tick() => {
                tick += 1;
                script(&telemetry, &gauge, tick);
                telemetry.static_update();
                if tick >= DEMO_TICKS {
                    break;
                }
            }
            _ = transmitter.tick() => transmit(&telemetry),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, ending session");
                break;
            }
        }
    }

    telemetry.session_end();
    transmit(&telemetry);
    tracing::info!("Userflow demo host stopped.");
    Ok(())
}

/// Scripted host activity keyed on the tick number.
fn script(telemetry: &Telemetry, gauge: &MemoryGauge, tick: u64) {
    gauge.report_mb(180.0 + (tick % 20) as f64);

    match tick {
        1 => {
            telemetry.flow_start("load_lobby", None);
            telemetry.log_step("fetch profile", "load_lobby");
        }
        20 => telemetry.log_step("build lobby", "load_lobby"),
        40 => {
            telemetry.log_step("lobby visible", "load_lobby");
            telemetry.finished_initial_loading();
        }
        45 => {
            telemetry.flow_end("load_lobby", true, "ok");
        }
        60 => {
            telemetry.flow_start("complete_purchase", Some(1.0));
            let mut fields = BTreeMap::new();
            fields.insert("sku".to_string(), "gem_pack_small".to_string());
            fields.insert("store".to_string(), "demo".to_string());
            telemetry.add_extra_fields_to_flow("complete_purchase", &fields);
        }
        90 => tracing::warn!("Receipt validation slow"),
        120 => telemetry.note_pause_occurred(),
        150 => {
            telemetry.flow_end("complete_purchase", true, "purchased");
        }
        180 => telemetry.flow_start("open_inbox", None),
        _ => {}
    }
}
