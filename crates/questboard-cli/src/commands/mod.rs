pub mod config;
pub mod hold;
pub mod ledger;
pub mod phase;
