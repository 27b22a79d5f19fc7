//! Adapters that run build steps.

pub mod basic;
pub mod shell;

pub use basic::{BasicAdapter, BasicAdapterConfig};
