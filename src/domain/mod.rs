//! Core domain types and logic.

pub mod calendar;
pub mod config_validation;
pub mod error;
pub mod factor;
pub mod hooks;
pub mod indicator;
pub mod ohlcv;
pub mod scoring;
pub mod strategy;
pub mod trend_filter;
