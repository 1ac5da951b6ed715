//! Sphinx Make
//!
//! Drives `sphinx-build` for the project's HTML documentation: a typed build
//! configuration is turned into the tool's argument list and the tool is run
//! once, reporting completion when it succeeds.

pub mod config;
pub mod error;
pub mod invoker;

pub use config::{BuildConfig, ConfigOverrides, PaperSize};
pub use error::BuildError;
pub use invoker::{build_args, clean, run_default_build, CommandLine};
