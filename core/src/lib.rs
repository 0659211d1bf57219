//! oncall-core: fairness-aware on-call scheduling.
//!
//! The desk keeps a roster of engineers in ordered groups, a frozen
//! rotation per month, monthly preferences and a running deficit per
//! engineer, and turns them into one assignment per on-call day.

pub mod allocation;
pub mod calendar;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod preference;
pub mod report;
pub mod rng;
pub mod roster;
pub mod rotation;
pub mod snapshot;
pub mod store;
pub mod synthetic;
pub mod types;
