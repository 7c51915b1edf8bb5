pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::HarvestConfig;
pub use error::{CoreError, ExitCode, Result};
pub use models::*;

pub use storage::state::StateStore;
