use chrono::{NaiveDateTime, NaiveTime, Timelike};
use clap::{Parser, Subcommand};
use dosier_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dosier")]
#[command(about = "Medication dose tracking and reminders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the wall clock ("YYYY-MM-DD HH:MM"), for testing
    #[arg(long, global = true, hide = true)]
    now: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the urgent view: medications with doses needing attention (default)
    Status,

    /// Mark a dose as taken
    Take {
        /// Medication id from the roster
        medication: String,

        /// Slot to take ("HH:MM"); defaults to the nearest actionable dose
        #[arg(long)]
        slot: Option<String>,
    },

    /// Postpone a dose 10 minutes (3 times at most)
    Postpone {
        /// Medication id from the roster
        medication: String,

        /// Slot to postpone ("HH:MM")
        #[arg(long)]
        slot: String,
    },

    /// Show the wake-alarm plan for a medication
    Alarms {
        /// Medication id from the roster
        medication: String,
    },

    /// Show recent dose history and adherence
    History {
        /// Days to look back
        #[arg(long)]
        days: Option<i64>,
    },

    /// Roll up the dose log into the CSV archive
    Rollup {
        /// Clean up processed log files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

struct Paths {
    roster: PathBuf,
    log: PathBuf,
    csv: PathBuf,
    log_dir: PathBuf,
}

fn data_paths(data_dir: &PathBuf) -> Paths {
    let log_dir = data_dir.join("log");
    Paths {
        roster: data_dir.join("medications.toml"),
        log: log_dir.join("doses.log"),
        csv: data_dir.join("doses.csv"),
        log_dir,
    }
}

fn main() -> Result<()> {
    dosier_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    std::fs::create_dir_all(&data_dir)?;
    tracing::debug!("Using data directory {:?}", data_dir);

    let now = match cli.now.as_deref() {
        Some(s) => parse_now(s)?,
        None => SystemClock.now(),
    };

    match cli.command {
        Some(Commands::Status) | None => cmd_status(&data_dir, now, &config),
        Some(Commands::Take { medication, slot }) => {
            let slot = slot.as_deref().map(parse_slot).transpose()?;
            cmd_take(&data_dir, &medication, slot, now)
        }
        Some(Commands::Postpone { medication, slot }) => {
            cmd_postpone(&data_dir, &medication, parse_slot(&slot)?, now)
        }
        Some(Commands::Alarms { medication }) => cmd_alarms(&data_dir, &medication, now),
        Some(Commands::History { days }) => {
            cmd_history(&data_dir, days.unwrap_or(config.history.window_days), now)
        }
        Some(Commands::Rollup { cleanup }) => cmd_rollup(&data_dir, cleanup),
    }
}

fn parse_now(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| Error::Config(format!("Invalid --now value '{}': {}", s, e)))
}

fn parse_slot(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| Error::Config(format!("Invalid slot '{}': {}", s, e)))
}

/// Load the store and materialize today's schedules for active medications.
///
/// During the day-boundary recheck window (the hour after the 00:01–01:00
/// midnight grace) the missed-dose sweep runs too, and swept doses are
/// registered as omitted in the history log. Running the sweep on every
/// invocation would instead cut short the one-hour take window of doses
/// passed minutes ago.
fn load_and_initialize(
    paths: &Paths,
    now: NaiveDateTime,
) -> Result<(FileStore, DoseTracker)> {
    let mut store = FileStore::open(&paths.roster, &paths.log)?;
    let tracker = DoseTracker::new();

    for med in store.active_medications()? {
        if med.has_schedule() {
            if let Err(e) = tracker.initialize_todays_schedule(&med, now) {
                eprintln!("warning: skipping schedule for '{}': {}", med.id, e);
            }
        }
    }

    if now.time().hour() == 1 {
        let swept = tracker.sweep_missed_doses(now);
        for dose in &swept {
            if let Some(med) = store.medication(&dose.medication_id)? {
                record_omitted_dose(&mut store, &med, dose, now)?;
            }
        }
    }

    Ok((store, tracker))
}

fn cmd_status(data_dir: &PathBuf, now: NaiveDateTime, config: &Config) -> Result<()> {
    let paths = data_paths(data_dir);
    let (store, tracker) = load_and_initialize(&paths, now)?;

    let medications: Vec<_> = store.medications().to_vec();
    let visible = visible_medications(&medications, &tracker, now);

    if visible.is_empty() {
        println!("Nothing needs attention right now.");
    } else {
        println!("Medications needing attention ({}):", now.format("%H:%M"));
        println!();
        for med in &visible {
            println!("  {} - {}", med.id, med.name);
            for dose in tracker.dose_states(&med.id, now) {
                let marker = match dose.status {
                    DoseStatus::Pending => " ",
                    DoseStatus::YellowAlert => "!",
                    DoseStatus::RedAlert => "!!",
                    DoseStatus::Delayed => "!!!",
                    DoseStatus::Omitted => "x",
                    DoseStatus::Taken => "✓",
                };
                let postponed = if dose.postponements > 0 {
                    format!(" (postponed {}x)", dose.postponements)
                } else {
                    String::new()
                };
                println!(
                    "    [{:>3}] {} at {}{}",
                    marker,
                    dose.slot.format("%H:%M"),
                    dose.scheduled_at.format("%H:%M"),
                    postponed
                );
            }
        }
    }

    let alerts = check_stock(&medications, config.stock.alert_lead_days);
    if !alerts.is_empty() {
        println!();
        println!("Stock alerts:");
        for alert in alerts {
            match alert.days_left {
                Some(days) => println!(
                    "  {} - {:?}, about {} day(s) left",
                    alert.medication_name, alert.level, days
                ),
                None => println!("  {} - {:?}", alert.medication_name, alert.level),
            }
        }
    }

    Ok(())
}

fn cmd_take(
    data_dir: &PathBuf,
    medication: &str,
    slot: Option<NaiveTime>,
    now: NaiveDateTime,
) -> Result<()> {
    let paths = data_paths(data_dir);
    let (mut store, tracker) = load_and_initialize(&paths, now)?;

    let Some(mut med) = store.medication(medication)? else {
        eprintln!("No medication '{}' in the roster.", medication);
        return Err(Error::Store(format!("unknown medication '{}'", medication)));
    };

    match record_taken_dose(&tracker, &mut store, &mut med, slot, now) {
        Ok(outcome) => {
            println!(
                "✓ {} taken ({} slot), {} left in stock",
                med.name,
                outcome.slot.format("%H:%M"),
                outcome.stock_left
            );
            if outcome.all_taken_today {
                println!("  All of today's doses are done.");
            }
            if outcome.treatment_completed {
                println!("  Stock depleted: medication paused. Time to restock.");
            }

            if let Some(stored) = store.medication_mut(&med.id) {
                *stored = med;
            }
            store.persist_roster()?;
            Ok(())
        }
        Err(Error::Validation(reason)) => {
            eprintln!("Cannot take this dose: {}", reason);
            Err(Error::Validation(reason))
        }
        Err(e) => Err(e),
    }
}

fn cmd_postpone(
    data_dir: &PathBuf,
    medication: &str,
    slot: NaiveTime,
    now: NaiveDateTime,
) -> Result<()> {
    let paths = data_paths(data_dir);
    let (_store, tracker) = load_and_initialize(&paths, now)?;

    match tracker.postpone(medication, slot, now) {
        Ok(remaining) => {
            println!(
                "Dose postponed 10 minutes. {} postponement(s) left.",
                remaining
            );
            Ok(())
        }
        Err(Error::Validation(ValidationError::MaxPostponements)) => {
            eprintln!("Cannot postpone again: maximum reached, dose is now omitted.");
            Err(ValidationError::MaxPostponements.into())
        }
        Err(Error::Validation(reason)) => {
            eprintln!("Cannot postpone: {}", reason);
            Err(Error::Validation(reason))
        }
        Err(e) => Err(e),
    }
}

/// Timer service that records the plan instead of arming OS alarms
#[derive(Default)]
struct PlannedTimers {
    planned: Vec<(AlarmId, NaiveDateTime)>,
}

impl TimerService for PlannedTimers {
    fn schedule(
        &mut self,
        identity: AlarmId,
        at: NaiveDateTime,
    ) -> std::result::Result<(), TimerError> {
        self.planned.push((identity, at));
        Ok(())
    }

    fn cancel(&mut self, identity: AlarmId) {
        self.planned.retain(|(id, _)| *id != identity);
    }
}

fn cmd_alarms(data_dir: &PathBuf, medication: &str, now: NaiveDateTime) -> Result<()> {
    let paths = data_paths(data_dir);
    let store = FileStore::open(&paths.roster, &paths.log)?;

    let Some(med) = store.medication(medication)? else {
        eprintln!("No medication '{}' in the roster.", medication);
        return Err(Error::Store(format!("unknown medication '{}'", medication)));
    };

    let mut timers = PlannedTimers::default();
    let outcome = arm_alarms(&mut timers, &med, now)?;

    if outcome.armed == 0 {
        println!("No alarms to arm for '{}'.", med.name);
        return Ok(());
    }

    // Re-derive the yellow identities so the plan can label each entry
    let mut yellow_ids = std::collections::HashSet::new();
    for slot in 0..med.daily_dose_count {
        for day in 0..dosier_core::alarms::LOOKAHEAD_DAYS {
            yellow_ids.insert(alarm_identity(&med.id, slot, day, AlertKind::Yellow));
        }
    }

    timers.planned.sort_by_key(|(_, at)| *at);
    println!(
        "Alarm plan for {} ({} alarm(s) over the lookahead window):",
        med.name, outcome.armed
    );
    for (id, at) in &timers.planned {
        let kind = if yellow_ids.contains(id) { "yellow" } else { "red" };
        println!("  {}  {:<6} (id {})", at.format("%Y-%m-%d %H:%M"), kind, id);
    }
    if outcome.truncated {
        println!("  ... truncated by the platform alarm ceiling");
    }

    Ok(())
}

fn cmd_history(data_dir: &PathBuf, days: i64, now: NaiveDateTime) -> Result<()> {
    let paths = data_paths(data_dir);
    let records = load_recent_records(&paths.log, &paths.csv, days, now)?;

    if records.is_empty() {
        println!("No dose history in the last {} day(s).", days);
        return Ok(());
    }

    println!("Last {} day(s):", days);
    for record in &records {
        let status = match record.status {
            RecordStatus::Taken => "taken",
            RecordStatus::Omitted => "omitted",
        };
        println!(
            "  {}  {:<20} {} (scheduled {})",
            record.taken_at.format("%Y-%m-%d %H:%M"),
            record.medication_name,
            status,
            record.scheduled_at.format("%H:%M"),
        );
    }

    let summary = adherence(&records);
    if let Some(pct) = summary.percentage() {
        println!();
        println!(
            "Adherence: {:.0}% ({} taken, {} omitted)",
            pct, summary.taken, summary.omitted
        );
    }

    Ok(())
}

fn cmd_rollup(data_dir: &PathBuf, cleanup: bool) -> Result<()> {
    let paths = data_paths(data_dir);

    if !paths.log.exists() {
        println!("No dose log found - nothing to roll up.");
        return Ok(());
    }

    let count = dosier_core::csv_rollup::log_to_csv_and_archive(&paths.log, &paths.csv)?;

    println!("✓ Rolled up {} dose record(s) to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    if cleanup {
        let cleaned = dosier_core::csv_rollup::cleanup_processed_logs(&paths.log_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed log file(s)", cleaned);
        }
    }

    Ok(())
}
