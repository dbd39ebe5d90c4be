use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use questboard_core::error::Result;
use questboard_core::gesture::{
    ControlState, GesturePreset, HoldControl, MonotonicClock, Rejection, Transition,
};
use questboard_core::ledger::DAILY_RITUAL;
use questboard_core::{CommitDispatcher, Config, Database, LedgerCommitChannel, ReleaseReason};
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Args)]
pub struct HoldArgs {
    /// Gesture preset (purchase, ritual)
    preset: GesturePreset,
    /// User whose ledger the confirmed hold advances
    #[arg(long)]
    user: String,
    /// Ledger key. Defaults to "daily_ritual" for rituals and "purchase" for purchases
    #[arg(long)]
    ledger: Option<String>,
    /// Release the press after this many milliseconds
    #[arg(long)]
    release_after: Option<u64>,
    /// Sampling rate of the interaction loop
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Override the configured hold duration (milliseconds)
    #[arg(long)]
    duration: Option<u64>,
}

fn default_ledger(preset: GesturePreset) -> &'static str {
    match preset {
        GesturePreset::Ritual => DAILY_RITUAL,
        GesturePreset::Purchase => "purchase",
    }
}

pub fn run(args: HoldArgs) -> Result<()> {
    let config = Config::load()?;
    let mut gesture = config.gesture(args.preset);
    if let Some(ms) = args.duration {
        gesture.required_duration_ms = ms;
    }
    gesture.validate()?;

    let ledger_key = args
        .ledger
        .unwrap_or_else(|| default_ledger(args.preset).to_string());
    let boundary = config.day_boundary();
    let db = Database::open()?;

    // A ritual can be completed once per day; purchases are always eligible.
    let already_done = args.preset == GesturePreset::Ritual
        && db
            .ledger(&args.user, &ledger_key)?
            .is_some_and(|ledger| ledger.completed_on(boundary.today()));

    let channel = Arc::new(LedgerCommitChannel::new(
        db,
        args.user.as_str(),
        ledger_key.as_str(),
        boundary,
    ));
    let mut control = HoldControl::new(gesture, MonotonicClock::new());
    control.set_disabled(already_done);
    control.set_payload(serde_json::json!({
        "preset": args.preset,
        "user": args.user,
        "ledger": ledger_key,
    }));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut dispatcher = CommitDispatcher::new(channel.clone(), config.retry_policy());
    let mut out = std::io::stdout().lock();

    runtime.block_on(drive(
        &mut control,
        &mut dispatcher,
        args.release_after.map(Duration::from_millis),
        args.fps,
        &mut out,
    ))?;

    let summary = serde_json::json!({
        "type": "Summary",
        "view": control.view(),
        "ledger": channel.snapshot()?,
    });
    writeln!(out, "{}", serde_json::to_string(&summary)?)?;
    Ok(())
}

/// Interaction loop: sample every frame, release when asked, and apply
/// commit outcomes as they arrive. Ends once the session is settled.
async fn drive(
    control: &mut HoldControl<MonotonicClock>,
    dispatcher: &mut CommitDispatcher,
    release_after: Option<Duration>,
    fps: u32,
    out: &mut impl Write,
) -> Result<()> {
    let frame = Duration::from_secs_f64(1.0 / f64::from(fps.clamp(1, 1_000)));
    let mut ticker = tokio::time::interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let started = Instant::now();
    let begin = control.begin();
    if begin.rejected == Some(Rejection::Disabled) {
        let rejected = serde_json::json!({ "type": "Rejected", "reason": "disabled" });
        writeln!(out, "{}", serde_json::to_string(&rejected)?)?;
        return Ok(());
    }
    emit(begin, dispatcher, out)?;

    let mut released = release_after.is_none();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !released && release_after.is_some_and(|after| started.elapsed() >= after) {
                    released = true;
                    emit(control.release(ReleaseReason::PointerUp), dispatcher, out)?;
                }
                emit(control.sample(), dispatcher, out)?;
                if matches!(control.state(), ControlState::Idle) {
                    break;
                }
            }
            Some(outcome) = dispatcher.next_outcome() => {
                emit(control.resolve_commit(outcome), dispatcher, out)?;
                break;
            }
        }
    }
    Ok(())
}

fn emit(
    transition: Transition,
    dispatcher: &CommitDispatcher,
    out: &mut impl Write,
) -> Result<()> {
    if let Some(request) = transition.commit {
        dispatcher.dispatch(request);
    }
    for event in &transition.events {
        writeln!(out, "{}", serde_json::to_string(event)?)?;
    }
    Ok(())
}
