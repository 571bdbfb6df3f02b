// src/lib.rs
// Library interface for ev-scan
pub mod cert_parser;
pub mod cli;
pub mod config;
pub mod ct_log;
pub mod error;
pub mod matcher;
pub mod output;
pub mod policy;
pub mod progress;
pub mod run;
pub mod stats;
pub mod types;
