pub mod bootstrap;
pub mod commands;
pub mod focus_cycle;
pub mod focus_runner;
pub mod progress_store;
