//! Core domain types and simulation logic.

pub mod bar;
pub mod indicator;
pub mod features;
pub mod symbol_data;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod sizing;
pub mod stops;
pub mod selector;
pub mod backtest;
pub mod metrics;
pub mod config;
pub mod config_validation;
pub mod error;
