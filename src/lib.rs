pub mod config;
pub mod dispatch;
pub mod logging;
pub mod notifications;
pub mod providers;
pub mod server;
pub mod store;
