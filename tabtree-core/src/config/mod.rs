//! Configuration management for the sidebar
//!
//! Settings live in `sidebar.toml`; [`ConfigManager`] loads and saves them.

mod manager;
pub mod settings;

pub use manager::ConfigManager;
pub use settings::{LoggingSettings, SidebarSettings};
