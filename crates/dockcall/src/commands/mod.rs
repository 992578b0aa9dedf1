//! Command implementations
//!
//! This module contains implementations for all CLI subcommands.

pub mod check;
pub mod render;
pub mod run;
