//! Detector daemon
//!
//! Waits for ledger change notifications and runs the five fraud pattern
//! passes on each one.
//!
//! Usage: `detector [--config <path>]` (default `conf/mo.conf`)

use fraudmon::config::{config_path_from_args, ConfigStore, DetectorConfig, DETECTOR_CONFIG_FILE};
use fraudmon::delay::SimulatedLoad;
use fraudmon::detector_core::{
    builtin_rules, listen_for_notifications, spawn_pattern_workers, DetectorContext,
    PassSummaryWriter,
};
use fraudmon::ipc::{GateBank, NamedSemaphore, NotificationReceiver};
use fraudmon::ledger::LedgerReader;
use fraudmon::logging::{init_logging, AuditLog};
use fraudmon::shutdown::{self, CleanupPlan};
use std::sync::Arc;

fn print_usage() {
    println!("Usage: detector [--config <path>]");
    println!();
    println!("Runs the fraud pattern passes whenever the ledger changes.");
    println!();
    println!("Options:");
    println!("  --config <path>  Configuration file (default: {})", DETECTOR_CONFIG_FILE);
    println!("  -h, --help       Show this help");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let config_path = config_path_from_args(&args, DETECTOR_CONFIG_FILE);
    let store = ConfigStore::load(&config_path)?;
    init_logging(&store);

    let config = DetectorConfig::from_store(&store);
    let audit = Arc::new(AuditLog::from_store(&store));
    let rules = builtin_rules();

    log::info!("🚀 Starting Detector");
    log::info!("   ├─ Config: {}", config_path.display());
    log::info!("   ├─ Ledger: {}", config.layout.ledger_path().display());
    log::info!("   ├─ Backend: {}", config.backend.as_str());
    log::info!("   ├─ Semaphore: {}", config.semaphore_name);
    log::info!("   ├─ Pipe: {}", config.pipe_path.display());
    log::info!(
        "   ├─ Results: {}",
        config.layout.result_path(1).display()
    );
    log::info!(
        "   ├─ Simulated load: {}-{}s",
        config.sleep_min_secs,
        config.sleep_max_secs
    );
    log::info!("   └─ Patterns: {}", rules.len());

    audit.record("Detector started");

    let semaphore = Arc::new(NamedSemaphore::open(&config.semaphore_name)?);

    let summary = match &config.pass_summary_path {
        Some(path) => Some(Arc::new(PassSummaryWriter::new(path)?)),
        None => None,
    };

    shutdown::install(CleanupPlan {
        role: "detector",
        semaphore_name: config.semaphore_name.clone(),
        ledger: None,
    })?;

    let ctx = Arc::new(DetectorContext {
        semaphore,
        reader: LedgerReader::new(&config.backend, &config.layout.ledger_path()),
        layout: config.layout.clone(),
        audit: Arc::clone(&audit),
        load: SimulatedLoad::new(config.sleep_min_secs, config.sleep_max_secs),
        summary,
    });

    let receiver = NotificationReceiver::open(&config.pipe_path)?;

    let gates = GateBank::with_gates(rules.len());
    let _workers = spawn_pattern_workers(rules, &gates, ctx)?;
    log::info!("✅ Detector running - waiting for ledger updates...");

    listen_for_notifications(receiver, &gates, &audit)?;
    Ok(())
}
