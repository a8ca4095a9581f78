//! railctl - a section occupancy and conflict-resolution scheduler for rail
//! traffic control.
//!
//! This library provides the scheduler core: the track graph and occupancy
//! invariant, train movement transitions, conflict detection, the
//! recommendation engine, the audited command applier, and the single-writer
//! worker that ties them together behind an HTTP API.

pub mod audit;
pub mod commands;
pub mod config;
pub mod conflict;
pub mod graph;
pub mod kpi;
pub mod loadgen;
pub mod occupancy;
pub mod recommend;
pub mod server;
pub mod state;
pub mod types;
pub mod worker;
