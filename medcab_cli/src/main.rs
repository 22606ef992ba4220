use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use medcab_core::cabinet::sort_by_medicine_name;
use medcab_core::schedule::format_times;
use medcab_core::snapshot::DataLock;
use medcab_core::*;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "medcab")]
#[command(about = "Medicine cabinet and dose schedule manager", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Role the command runs as
    #[arg(long, global = true, value_enum, default_value_t = RoleArg::Patient)]
    role: RoleArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Patient,
    Pharmacist,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Patient => Role::Patient,
            RoleArg::Pharmacist => Role::Pharmacist,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and an empty (or demo) store
    Init {
        /// Seed the default formulary and a demo patient
        #[arg(long)]
        demo: bool,
    },

    /// Show dose times for a frequency
    Schedule {
        /// Doses per day (0 = as needed, 1-4)
        #[arg(long)]
        frequency: u8,

        /// Reference instant (RFC 3339); omit for the static grid
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Classify a regimen as as-needed or scheduled
    Classify {
        #[arg(long)]
        frequency: u8,

        #[arg(long)]
        dosage: Option<String>,
    },

    /// Show a patient's medicine cabinet
    Cabinet {
        #[arg(long)]
        patient: String,
    },

    /// Take one dose from a cabinet entry
    Take {
        #[arg(long)]
        patient: String,

        /// Canonical order item id of the cabinet entry
        #[arg(long)]
        item: Uuid,
    },

    /// Deduct scheduled doses for the current dose window
    Tick {
        /// Run as if at this instant (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// List a patient's scheduled medicines and next dose times
    Due {
        #[arg(long)]
        patient: String,
    },

    /// Medicines a patient will run out of soon
    Refills {
        #[arg(long)]
        patient: String,

        /// Look-ahead window in days
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_DAYS))]
        days: Option<i64>,
    },

    /// Browse in-stock medicines or list low stock
    Inventory {
        #[arg(long, default_value = "")]
        search: String,

        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Only medicines at or below their reorder threshold
        #[arg(long)]
        low: bool,
    },

    /// Place a manual order
    Order {
        #[arg(long)]
        patient: String,

        /// Medicine to order, as ID or ID:QTY (repeatable)
        #[arg(long = "medicine", required = true, value_parser = parse_order_line)]
        medicines: Vec<OrderLine>,
    },

    /// Show recent dose events
    History {
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(0..=MAX_DAYS))]
        days: i64,
    },

    /// Roll up dose WAL to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

/// Longest look-back or look-ahead accepted on the command line
const MAX_DAYS: i64 = 3650;

fn parse_order_line(s: &str) -> std::result::Result<OrderLine, String> {
    s.parse::<OrderLine>().map_err(|e| e.to_string())
}

/// File locations under the data directory
struct Paths {
    store: PathBuf,
    wal_dir: PathBuf,
    wal: PathBuf,
    csv: PathBuf,
}

impl Paths {
    fn new(data_dir: &Path) -> Self {
        let wal_dir = data_dir.join("wal");
        Self {
            store: data_dir.join("store.json"),
            wal: wal_dir.join("dose_events.wal"),
            csv: data_dir.join("dose_history.csv"),
            wal_dir,
        }
    }
}

fn main() -> Result<()> {
    medcab_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let paths = Paths::new(&data_dir);
    let role = Role::from(cli.role);

    match cli.command {
        Commands::Init { demo } => cmd_init(&data_dir, &paths, demo, role),
        Commands::Schedule { frequency, at } => cmd_schedule(frequency, at, &config),
        Commands::Classify { frequency, dosage } => {
            cmd_classify(frequency, dosage.as_deref());
            Ok(())
        }
        Commands::Cabinet { patient } => cmd_cabinet(&paths, &patient, role, &config),
        Commands::Take { patient, item } => cmd_take(&paths, &patient, item, role),
        Commands::Tick { at } => cmd_tick(&paths, at, role, &config),
        Commands::Due { patient } => cmd_due(&paths, &patient, role, &config),
        Commands::Refills { patient, days } => cmd_refills(&paths, &patient, days, role, &config),
        Commands::Inventory { search, limit, low } => {
            cmd_inventory(&paths, &search, limit, low, role, &config)
        }
        Commands::Order { patient, medicines } => cmd_order(&paths, &patient, &medicines, role),
        Commands::History { days } => cmd_history(&paths, days, role),
        Commands::Rollup { cleanup } => cmd_rollup(&paths, cleanup, role),
    }
}

fn cmd_init(data_dir: &Path, paths: &Paths, demo: bool, role: Role) -> Result<()> {
    authorize(role, Capability::ManageInventory)?;
    std::fs::create_dir_all(&paths.wal_dir)?;

    if paths.store.exists() {
        println!("Store already exists at {}", paths.store.display());
        return Ok(());
    }

    let store = if demo {
        seed_demo_store(Utc::now())
    } else {
        PharmacyStore::default()
    };
    store.save(&paths.store)?;

    println!("✓ Initialized store in {}", data_dir.display());
    if demo {
        println!(
            "  {} medicines, demo patient '{}'",
            store.medicines.len(),
            medcab_core::catalog::DEMO_PATIENT_ID
        );
    }
    Ok(())
}

fn cmd_schedule(frequency: u8, at: Option<DateTime<Utc>>, config: &Config) -> Result<()> {
    let zone = config.zone()?;
    let times = next_dose_times_in(frequency, at, &zone);

    if times.is_empty() {
        println!("No fixed dose times (as needed)");
    } else {
        println!("{}", format_times(&times).join(" "));
    }
    Ok(())
}

fn cmd_classify(frequency: u8, dosage: Option<&str>) {
    match classify(frequency, dosage) {
        Regimen::AsNeeded => println!("as-needed: take manually, one dose at a time"),
        Regimen::Scheduled => println!("scheduled: auto-deducted at dose times"),
    }
}

fn cmd_cabinet(paths: &Paths, patient: &str, role: Role, config: &Config) -> Result<()> {
    authorize(role, Capability::ViewCabinet)?;
    let zone = config.zone()?;
    let store = PharmacyStore::load(&paths.store)?;

    let mut entries = build_cabinet(store.patient_items(patient), &store.order_statuses());
    sort_by_medicine_name(&mut entries);

    if entries.is_empty() {
        println!("Cabinet is empty");
        return Ok(());
    }

    let now = Utc::now();
    for entry in &entries {
        let dosage = entry.dosage_text.as_deref().unwrap_or("-");
        println!(
            "{:<24} qty {:>4}  {:<28} [{}]",
            entry.medicine.name, entry.quantity, dosage, entry.latest_item_id
        );
        match entry.regimen {
            Regimen::AsNeeded => println!("  → as needed (use `take` after each dose)"),
            Regimen::Scheduled => println!(
                "  → next: {} ({}, auto-deducted)",
                format_times(&entry.next_dose_times(Some(now), &zone)).join(", "),
                config.schedule.zone_label
            ),
        }
    }
    Ok(())
}

fn cmd_take(paths: &Paths, patient: &str, item: Uuid, role: Role) -> Result<()> {
    authorize(role, Capability::ConsumeDose)?;

    let journal = DoseJournal::new(&paths.wal);
    let events = PharmacyStore::record_doses(&paths.store, &journal, |store| {
        consume_dose(store, patient, item, Utc::now()).map(|event| vec![event])
    })?;

    for event in &events {
        println!("✓ Dose of {} recorded", event.medicine_name);
        println!("  Remaining: {}", event.remaining);
    }
    Ok(())
}

fn cmd_tick(paths: &Paths, at: Option<DateTime<Utc>>, role: Role, config: &Config) -> Result<()> {
    authorize(role, Capability::RunScheduler)?;
    let zone = config.zone()?;
    let now = at.unwrap_or_else(Utc::now);

    let journal = DoseJournal::new(&paths.wal);
    let events = PharmacyStore::record_doses(&paths.store, &journal, |store| {
        Ok(run_scheduled_decrement(store, now, &zone))
    })?;

    println!("✓ Scheduled deduction: {} items decremented", events.len());
    for event in &events {
        println!("  → {} ({} left)", event.medicine_name, event.remaining);
    }
    Ok(())
}

fn cmd_due(paths: &Paths, patient: &str, role: Role, config: &Config) -> Result<()> {
    authorize(role, Capability::ViewCabinet)?;
    let zone = config.zone()?;
    let store = PharmacyStore::load(&paths.store)?;

    let due = due_doses(&store, patient, Utc::now(), &zone);
    println!(
        "Local hour: {:02} ({})",
        due.local_hour, config.schedule.zone_label
    );
    for dose in &due.items {
        println!(
            "  {:<24} qty {:>4}  next: {}",
            dose.medicine_name,
            dose.qty,
            format_times(&dose.next_times).join(", ")
        );
    }
    Ok(())
}

fn cmd_refills(
    paths: &Paths,
    patient: &str,
    days: Option<i64>,
    role: Role,
    config: &Config,
) -> Result<()> {
    authorize(role, Capability::ViewCabinet)?;
    let store = PharmacyStore::load(&paths.store)?;
    let days_ahead = days.unwrap_or(config.refill.days_ahead);

    let candidates = refill_candidates(
        &store,
        patient,
        Utc::now(),
        days_ahead,
        config.refill.default_days_supply,
    )?;

    if candidates.is_empty() {
        println!("No medicines running out in the next {} days", days_ahead);
        return Ok(());
    }

    println!("Medicines running low:");
    for c in &candidates {
        println!(
            "  • {}: runs out in {} day(s) ({})",
            c.medicine_name, c.days_left, c.runout_date
        );
    }
    Ok(())
}

fn cmd_inventory(
    paths: &Paths,
    search: &str,
    limit: usize,
    low: bool,
    role: Role,
    config: &Config,
) -> Result<()> {
    let store = PharmacyStore::load(&paths.store)?;

    let medicines = if low {
        authorize(role, Capability::ManageInventory)?;
        low_stock(&store, config.inventory.default_reorder_threshold)
    } else {
        available_medicines(&store, search, limit)
    };

    for m in medicines {
        let rx = if m.prescription_required { " (Rx)" } else { "" };
        println!(
            "{:<20} {:<24} {} {:>5} in stock{}",
            m.id,
            m.name,
            m.strength.as_deref().unwrap_or(""),
            m.stock,
            rx
        );
    }
    Ok(())
}

fn cmd_order(paths: &Paths, patient: &str, lines: &[OrderLine], role: Role) -> Result<()> {
    authorize(role, Capability::PlaceOrder)?;

    let receipt = PharmacyStore::update(&paths.store, |store| {
        place_manual_order(store, patient, lines, Utc::now())
    })?;

    println!("✓ Order {} fulfilled", receipt.order_id);
    for line in &receipt.items_ordered {
        println!("  → {} x{}", line.medicine_name, line.qty);
    }
    for warning in &receipt.warnings {
        println!("  ! {}", warning);
    }
    Ok(())
}

fn cmd_history(paths: &Paths, days: i64, role: Role) -> Result<()> {
    authorize(role, Capability::ViewCabinet)?;
    let events = load_recent_events(&paths.wal, &paths.csv, days)?;

    if events.is_empty() {
        println!("No dose events in the last {} days", days);
        return Ok(());
    }

    for event in &events {
        println!(
            "{}  {:<9} {:<24} {} left",
            event.at.to_rfc3339(),
            event.kind,
            event.medicine_name,
            event.remaining
        );
    }
    Ok(())
}

fn cmd_rollup(paths: &Paths, cleanup: bool, role: Role) -> Result<()> {
    authorize(role, Capability::RunScheduler)?;
    let _lock = DataLock::acquire(&paths.store)?;

    if !paths.wal.exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count = medcab_core::csv_rollup::wal_to_csv_and_archive(&paths.wal, &paths.csv)?;

    println!("✓ Rolled up {} dose events to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    if cleanup {
        let cleaned = medcab_core::csv_rollup::cleanup_processed_wals(&paths.wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}
