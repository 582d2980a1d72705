//! Salary Ledger - audited, row-locked salary updates.

pub mod audit;
pub mod config;
pub mod ledger;
