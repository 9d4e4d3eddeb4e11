pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod fake_data;
pub mod feed;
pub mod metrics;
pub mod reconcile;
pub mod session;
pub mod sheets;
pub mod source;
pub mod state;
pub mod table;
