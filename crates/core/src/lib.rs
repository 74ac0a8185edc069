pub mod config;
pub mod error;
pub mod loyalty;
pub mod storage;

pub use config::AppConfig;
pub use error::{StorefrontError, StorefrontResult};
pub use storage::{LedgerSnapshot, LedgerStore};
