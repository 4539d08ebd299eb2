pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

pub use config::GradingConfig;
pub use error::EngineError;
pub use services::{AssignmentService, GradingService, LogNotifier, Notifier};
pub use store::MemoryStore;
pub use utils::clock::{Clock, FixedClock, SystemClock};
