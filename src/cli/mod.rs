//! Command-line interface components
//!
//! This module contains CLI-specific code for the DNI Fetcher application:
//! argument parsing, config initialisation and the run handler.

pub mod args;
pub mod commands;

pub use args::{Cli, GlobalArgs, RunArgs};
pub use commands::{handle_init_config, handle_run};
