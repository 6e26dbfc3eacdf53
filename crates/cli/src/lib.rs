//! Command-line client for the realtime config stream.

pub mod cli;
pub mod commands;
pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod output;
