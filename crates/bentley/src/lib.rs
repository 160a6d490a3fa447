//! ## Features
//!
//! - Standard logging levels (info, warn, error, verbose, success)
//! - Multi-line message support with consistent prefixes
//! - Stage banners for long-running generation work
//! - `tracing` subscriber setup for library diagnostics
//! - All output to stderr, so stdout stays clean for generated text
//!
//! ## Usage
//!
//! Logging functions: `info()`, `warn()`, `error()`, `verbose()`, `success()`
//!
//! Progress: `stage()` prints a short banner naming the step being run.

use colored::*;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set. Otherwise only warnings are shown, or debug output
/// for the redacta crates when `verbose` is true. Calling this twice is harmless.
pub fn init_tracing(verbose: bool) {
  let fallback = if verbose { "warn,redacta=debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_target(false)
    .try_init();
}

/// Core logging function that handles the actual output
pub fn log(message: &str) {
  for line in message.lines() {
    eprintln!("{line}");
  }
}

/// Format a colored prefix for log messages
fn format_prefix(color: Color, prefix: &str) -> String {
  format!("[{}]{:<width$}", prefix.color(color).bold(), "", width = 7 - prefix.len() - 2)
}

fn log_prefixed(color: Color, prefix: &str, message: &str) {
  let prefix = format_prefix(color, prefix);
  for line in message.lines() {
    log(&format!("{prefix} {line}"));
  }
}

/// Create a banner line of the specified length and character
pub fn banner_line(length: usize, char: char) -> String {
  char.to_string().repeat(length)
}

pub fn verbose(message: &str) {
  log_prefixed(Color::Cyan, "verb", message);
}

/// Info level logging - general information
pub fn info(message: &str) {
  log_prefixed(Color::Blue, "info", message);
}

/// Warning level logging - something needs attention
pub fn warn(message: &str) {
  log_prefixed(Color::Yellow, "warn", message);
}

/// Error level logging - something went wrong
pub fn error(message: &str) {
  log_prefixed(Color::Red, "error", message);
}

/// Success level logging - something completed successfully
pub fn success(message: &str) {
  log_prefixed(Color::Green, "sccs", message);
}

/// Announce a pipeline step, e.g. `stage("drafting")`
pub fn stage(name: &str) {
  let line = banner_line(name.len() + 4, '-');
  log(&line.dimmed().to_string());
  log(&format!("  {}", name.cyan().bold()));
  log(&line.dimmed().to_string());
}

/// Macros for coverage-excluded logging - these expand with LCOV_EXCL_LINE at call sites
#[macro_export]
macro_rules! info {
  ($msg:expr) => {
    $crate::info($msg); // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! warn {
  ($msg:expr) => {
    $crate::warn($msg); // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! error {
  ($msg:expr) => {
    $crate::error($msg); // LCOV_EXCL_LINE
  };
}

#[macro_export]
macro_rules! success {
  ($msg:expr) => {
    $crate::success($msg); // LCOV_EXCL_LINE
  };
}
