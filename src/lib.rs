pub mod accounts;
pub mod config;
pub mod events;
pub mod flows;
pub mod forms;
pub mod media;
pub mod profiles;
pub mod sessions;
pub mod site;
pub mod store;
pub mod web;

// Re-export commonly used types for convenience.
pub use accounts::Account;
pub use config::AppConfig;
pub use profiles::Profile;
pub use site::Site;
pub use store::Database;
