pub mod clock;
pub mod config;
pub mod error;
pub mod notifier;
pub mod storage;
pub mod weather_client;
