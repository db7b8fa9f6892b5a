pub mod config;
pub mod duck;
pub mod import;
pub mod process;
pub mod schema;
pub mod views;

pub use config::Config;
pub use duck::Database;
