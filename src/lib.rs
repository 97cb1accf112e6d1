//! Traffic Monitor - follows an HTTP access log and reports section hits and high traffic alerts

pub mod alert;
pub mod classifier;
pub mod config;
pub mod error;
pub mod generator;
pub mod hits;
pub mod metrics;
pub mod monitor;
pub mod report;
pub mod stats;
pub mod tail;
pub mod top;
pub mod window;
