/// Database configuration and connection management
pub mod database;

/// Tracing subscriber setup
pub mod logging;

/// Workflow tunables loaded from config.toml
pub mod settings;

pub use database::{create_connection, create_tables, get_database_url};
pub use logging::init_tracing;
pub use settings::{WorkflowSettings, load_default_settings, load_settings};
