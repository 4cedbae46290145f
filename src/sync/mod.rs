pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod engine;
pub mod ensurer;
pub mod error;
pub mod ledger;
pub mod lister;
pub mod path;
pub mod transfer;
pub mod walker;

pub use error::SyncError;
pub type Result<T> = std::result::Result<T, SyncError>;
