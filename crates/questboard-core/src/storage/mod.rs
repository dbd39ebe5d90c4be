mod config;
pub mod database;
pub mod migrations;

pub use config::{CommitConfig, Config, GesturesConfig, LedgerConfig};
pub use database::Database;

use std::path::PathBuf;

/// Returns the data directory.
///
/// `QUESTBOARD_DATA_DIR` wins when set. Otherwise `~/.config/questboard[-dev]/`
/// based on `QUESTBOARD_ENV` (set `QUESTBOARD_ENV=dev` for a development
/// data directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("QUESTBOARD_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env =
                std::env::var("QUESTBOARD_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("questboard-dev")
            } else {
                base_dir.join("questboard")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
