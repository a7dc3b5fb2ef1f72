//! Ingestor daemon
//!
//! Watches every branch inbox and consolidates new files into the ledger.
//!
//! Usage: `ingestor [--config <path>]` (default `conf/fp.conf`)

use fraudmon::config::{config_path_from_args, BackendType, ConfigStore, IngestorConfig, INGESTOR_CONFIG_FILE};
use fraudmon::delay::SimulatedLoad;
use fraudmon::ingest_core::{spawn_watchers, BranchLayout, IngestContext};
use fraudmon::ipc::{NamedSemaphore, NotificationSender};
use fraudmon::ledger::LedgerStore;
use fraudmon::logging::{init_logging, AuditLog};
use fraudmon::shutdown::{self, CleanupPlan};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn print_usage() {
    println!("Usage: ingestor [--config <path>]");
    println!();
    println!("Consolidates branch transaction files into the shared ledger.");
    println!();
    println!("Options:");
    println!("  --config <path>  Configuration file (default: {})", INGESTOR_CONFIG_FILE);
    println!("  -h, --help       Show this help");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let config_path = config_path_from_args(&args, INGESTOR_CONFIG_FILE);
    let store = ConfigStore::load(&config_path)?;
    init_logging(&store);

    let config = IngestorConfig::from_store(&store);
    let audit = Arc::new(AuditLog::from_store(&store));

    log::info!("🚀 Starting Ingestor");
    log::info!("   ├─ Config: {}", config_path.display());
    log::info!("   ├─ Data root: {}", config.layout.data_root.display());
    log::info!("   ├─ Branches: {}", config.branch_count);
    log::info!("   ├─ Ledger: {}", config.layout.ledger_path().display());
    match &config.backend {
        BackendType::File => log::info!("   ├─ Backend: file"),
        BackendType::Arena(arena) => log::info!(
            "   ├─ Backend: shared memory {} ({} bytes)",
            arena.name,
            arena.capacity
        ),
    }
    log::info!("   ├─ Semaphore: {}", config.semaphore_name);
    log::info!(
        "   ├─ Notifications: {} ({})",
        if config.notifications_enabled { "on" } else { "off" },
        config.pipe_path.display()
    );
    log::info!(
        "   ├─ Simulated load: {}-{}s",
        config.sleep_min_secs,
        config.sleep_max_secs
    );
    log::info!("   └─ Poll interval: {}ms", config.poll_interval_ms);

    audit.record("Ingestor started");

    let semaphore = Arc::new(NamedSemaphore::open(&config.semaphore_name)?);
    let ledger = Arc::new(Mutex::new(LedgerStore::open(
        &config.backend,
        &config.layout.ledger_path(),
    )?));

    shutdown::install(CleanupPlan {
        role: "ingestor",
        semaphore_name: config.semaphore_name.clone(),
        ledger: Some(Arc::clone(&ledger)),
    })?;

    let notifier = if config.notifications_enabled {
        Some(NotificationSender::open(&config.pipe_path)?)
    } else {
        None
    };

    let ctx = Arc::new(IngestContext {
        semaphore,
        ledger,
        notifier,
        audit,
        load: SimulatedLoad::new(config.sleep_min_secs, config.sleep_max_secs),
        poll_interval: Duration::from_millis(config.poll_interval_ms),
    });

    let handles = spawn_watchers(BranchLayout::all(&config.layout, config.branch_count), ctx)?;

    log::info!("✅ Ingestor running - watching branch inboxes...");

    for handle in handles {
        if handle.join().is_err() {
            log::error!("❌ A branch watcher panicked");
        }
    }

    Ok(())
}
