//! # CLI Module
//!
//! Command-line front end of the `brrtguard` binary.
//!
//! ## Commands
//!
//! ### `check`
//!
//! Load a configuration file and build its filter chain, reporting the first
//! configuration error:
//!
//! ```bash
//! brrtguard check --config guard.yaml
//! ```
//!
//! ### `simulate`
//!
//! Run one synthetic request through the configured chain and print the
//! response status, headers and body:
//!
//! ```bash
//! brrtguard simulate --config guard.yaml \
//!     --method OPTIONS --path /api/users \
//!     --origin https://app.example.com \
//!     --header "Access-Control-Request-Method: POST"
//! ```
//!
//! When `--config` is omitted, `BRRTG_CONFIG` is used. `--log-preset dev` or
//! `--log-preset prod` replaces the `BRRTG_LOG_*` settings for one run.

mod commands;


pub use commands::{execute, run_cli, Cli, Commands, LogPreset};
