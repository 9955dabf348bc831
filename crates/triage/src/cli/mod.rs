//! Command handlers for the triage CLI.

pub mod config;
pub mod run;
