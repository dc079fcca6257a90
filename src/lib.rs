pub mod adapters;
pub mod config;
pub mod pki;
pub mod setup;
pub mod telemetry;
pub mod tsl;
