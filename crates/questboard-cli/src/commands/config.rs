use clap::Subcommand;
use questboard_core::error::{CoreError, Result};
use questboard_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the whole configuration as JSON
    Show,
    /// Get a config value
    Get {
        /// Dot-separated key (e.g. "gestures.purchase.required_duration_ms")
        key: String,
    },
    /// Set a config value
    Set {
        /// Dot-separated key
        key: String,
        /// New value
        value: String,
    },
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(CoreError::Custom(format!("unknown key: {key}"))),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            println!("ok");
        }
        ConfigAction::Reset => {
            Config::default().save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
