//! Concrete adapter implementations for ports.

pub mod calendar_scheduler;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod paper_book;
pub mod strategy_runner;
