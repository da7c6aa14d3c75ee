//! Polls a set of machines over SSH, reports which are up, fires
//! notifications when one goes down or comes back, and keeps a small
//! persistent record of work items assigned to each machine.
//!
//! - [`crate::core::check_all`] runs one health check per host and returns results
//!   in configuration order.
//! - [`crate::core::StateTracker`] turns consecutive batches into up/down
//!   transitions and hands them to a [`crate::core::Notify`] implementation.
//! - [`crate::core::DispatchStore`] holds issue-to-host assignments on disk.

pub mod config;
pub mod core;
