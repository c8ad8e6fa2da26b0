pub mod app;
pub mod chain;
pub mod config;
pub mod pool;
pub mod provider;
pub mod session;
pub mod swap;

pub use app::{App, AppView};
pub use config::Settings;
