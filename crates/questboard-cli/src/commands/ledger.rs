use chrono::NaiveDate;
use clap::Subcommand;
use questboard_core::error::Result;
use questboard_core::ledger::DAILY_RITUAL;
use questboard_core::{Config, Database, StreakLedger};
use serde::Serialize;

#[derive(Subcommand)]
pub enum LedgerAction {
    /// Show one ledger (zeros if never completed)
    Show {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = DAILY_RITUAL)]
        ledger: String,
    },
    /// List every ledger a user has completed at least once
    List {
        #[arg(long)]
        user: String,
    },
    /// Record a completion directly, bypassing the gesture
    Record {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = DAILY_RITUAL)]
        ledger: String,
        /// Completion date (YYYY-MM-DD). Defaults to today in the configured offset.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Idempotency key; replaying it returns the first result
        #[arg(long)]
        key: Option<String>,
    },
}

#[derive(Serialize)]
struct LedgerReport {
    #[serde(flatten)]
    ledger: StreakLedger,
    /// Streak as of today: zero once a day has been missed.
    live_streak: u32,
    completed_today: bool,
}

impl LedgerReport {
    fn new(ledger: StreakLedger, today: NaiveDate) -> Self {
        Self {
            live_streak: ledger.state.live_streak(today),
            completed_today: ledger.completed_on(today),
            ledger,
        }
    }
}

pub fn run(action: LedgerAction) -> Result<()> {
    let config = Config::load()?;
    let today = config.day_boundary().today();
    let mut db = Database::open()?;

    match action {
        LedgerAction::Show { user, ledger } => {
            let ledger = db.ledger_or_default(&user, &ledger)?;
            let report = LedgerReport::new(ledger, today);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        LedgerAction::List { user } => {
            let reports: Vec<LedgerReport> = db
                .ledgers_for_user(&user)?
                .into_iter()
                .map(|ledger| LedgerReport::new(ledger, today))
                .collect();
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        LedgerAction::Record {
            user,
            ledger,
            date,
            key,
        } => {
            let day = date.unwrap_or(today);
            let update = match key {
                Some(key) => db.record_completion_once(&key, &user, &ledger, day)?,
                None => db.record_completion(&user, &ledger, day)?,
            };
            println!("{}", serde_json::to_string_pretty(&update)?);
        }
    }
    Ok(())
}
