//! Retrohost command-line frontend
//!
//! Parses the command line, sets up logging and settings, and drives a
//! [`retrohost_core::Host`] from a headless outer loop.

pub mod cli;
pub mod headless;
pub mod logging;
