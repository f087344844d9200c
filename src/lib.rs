//! EQUITY BOT: Texas Hold'em equity calculator for Reddit
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod calculator;
pub mod engine;
pub mod platforms;
pub mod storage;
pub mod responder;
pub mod dashboard;
