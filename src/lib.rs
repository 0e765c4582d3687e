pub mod analysis;
pub mod chart;
pub mod chat;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod error;
pub mod file_list;
pub mod format;
pub mod logging;
pub mod models;
pub mod table;
pub mod upload;
