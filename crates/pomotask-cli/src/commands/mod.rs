pub mod auth;
pub mod config;
pub mod export;
pub mod history;
pub mod settings;
pub mod stats;
pub mod task;
pub mod timer;
