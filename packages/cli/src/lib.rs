//! Vigenza CLI - load a batch of acts and amendment clauses and query it.
//!
//! - [`cli`]: argument parsing and the subcommands
//! - [`error`]: error type and Result alias

pub mod cli;
pub mod error;
