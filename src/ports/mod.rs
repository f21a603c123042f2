//! Port traits for the host platform collaborators.

pub mod config_port;
pub mod market_data_port;
pub mod scheduler_port;
pub mod trading_port;
