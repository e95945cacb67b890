pub mod backup;
pub mod config;
pub mod error;
pub mod interactions;
pub mod maintenance;
pub mod outcome;
pub mod platform;
