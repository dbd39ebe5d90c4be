use clap::Args;
use questboard_core::error::Result;
use questboard_core::gesture::{classify, classify_cancelling, GesturePreset};
use questboard_core::Config;

#[derive(Args)]
pub struct PhaseArgs {
    /// Gesture preset whose thresholds to use (purchase, ritual)
    preset: GesturePreset,
    /// Progress in [0, 1]; out-of-range values are clamped
    #[arg(allow_negative_numbers = true)]
    progress: f64,
    /// Classify as a decaying (released) hold, which never reports confirmed
    #[arg(long)]
    cancelling: bool,
}

pub fn run(args: PhaseArgs) -> Result<()> {
    let config = Config::load()?;
    let thresholds = config.gesture(args.preset).thresholds;
    let phase = if args.cancelling {
        classify_cancelling(args.progress, &thresholds)
    } else {
        classify(args.progress, &thresholds)
    };

    let report = serde_json::json!({
        "preset": args.preset,
        "progress": args.progress,
        "phase": phase,
        "thresholds": thresholds,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
