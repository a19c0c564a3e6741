pub mod client;
pub mod commands;
pub mod config;
pub mod output;
pub mod planner;
pub mod registers;
pub mod snapshot;
pub mod state;
