// src/ct_log/mod.rs
pub mod client;
pub mod scanner;
pub mod types;

pub use client::CtLogClient;
pub use scanner::{EntryCallback, LogScanner, ScanSummary, Scanner, ScannerOptions, noop_callback};
pub use types::{RawLogEntry, SignedTreeHead};
