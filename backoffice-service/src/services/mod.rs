pub mod database;
pub mod gateway;
pub mod metrics;
pub mod numbering;
pub mod reminder;
pub mod storage;
pub mod totals;

pub use database::Database;
pub use gateway::PaymentGateway;
pub use reminder::ReminderService;
pub use storage::{LocalStorage, Storage};
