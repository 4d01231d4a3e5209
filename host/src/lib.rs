//! Benchmark harness that keeps the `dropXDP` filter attached to the
//! loopback interface until SIGINT or SIGTERM, then detaches it.
#![cfg(target_os = "linux")]

pub mod config;
pub mod error;
pub mod iface;
pub mod lifecycle;
pub mod loader;
pub mod signals;

pub use error::{Error, Result};
